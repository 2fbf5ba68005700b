//! Cash session reconciliation.

use serde::Serialize;

use crate::money::Guaranies;

/// Cash a register should hold when a session closes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Reconciliation {
	pub opening: Guaranies,
	pub cash_sales: Guaranies,
	pub cash_recharges: Guaranies,
	pub expected: Guaranies,
	pub counted: Guaranies,
	/// Counted minus expected: negative is a shortage, positive a surplus.
	pub difference: Guaranies,
}

/// Compares the counted cash with what the session recorded.
///
/// # Examples
///
/// ```
/// use cantina_core::cash::reconcile;
/// use cantina_core::Guaranies;
///
/// let r = reconcile(Guaranies(100_000), Guaranies(250_000), Guaranies(50_000), Guaranies(395_000));
/// assert_eq!(r.expected, Guaranies(400_000));
/// assert_eq!(r.difference, Guaranies(-5_000));
/// ```
pub fn reconcile(
	opening: Guaranies,
	cash_sales: Guaranies,
	cash_recharges: Guaranies,
	counted: Guaranies,
) -> Reconciliation {
	let expected = opening + cash_sales + cash_recharges;
	Reconciliation {
		opening,
		cash_sales,
		cash_recharges,
		expected,
		counted,
		difference: counted - expected,
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;

	#[rstest]
	#[case(0, 0, 0, 0, 0)]
	#[case(50_000, 10_000, 0, 61_000, 1_000)]
	#[case(50_000, 10_000, 20_000, 80_000, 0)]
	fn test_difference(
		#[case] opening: i64,
		#[case] sales: i64,
		#[case] recharges: i64,
		#[case] counted: i64,
		#[case] difference: i64,
	) {
		let r = reconcile(Guaranies(opening), Guaranies(sales), Guaranies(recharges), Guaranies(counted));
		assert_eq!(r.difference, Guaranies(difference));
	}
}
