//! Monthly lunch billing helpers.

use chrono::NaiveDate;

use crate::enums::AccountState;
use crate::exception::{Error, Result};
use crate::money::Guaranies;

/// Day of the month on which a monthly fee falls due.
pub const MONTHLY_DUE_DAY: u32 = 10;

const MONTH_NAMES: [&str; 12] = [
	"Enero",
	"Febrero",
	"Marzo",
	"Abril",
	"Mayo",
	"Junio",
	"Julio",
	"Agosto",
	"Septiembre",
	"Octubre",
	"Noviembre",
	"Diciembre",
];

/// Spanish name of a month (1-12).
pub fn month_name(month: u32) -> Option<&'static str> {
	MONTH_NAMES.get(month.checked_sub(1)? as usize).copied()
}

/// A calendar month.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct YearMonth {
	pub year: i32,
	pub month: u32,
}

impl YearMonth {
	pub fn new(year: i32, month: u32) -> Result<Self> {
		if !(1..=12).contains(&month) {
			return Err(Error::Validation(format!("Invalid month {}", month)));
		}
		if !(2000..=2100).contains(&year) {
			return Err(Error::Validation(format!("Invalid year {}", year)));
		}
		Ok(Self { year, month })
	}

	/// Parses `YYYY-MM`.
	///
	/// # Examples
	///
	/// ```
	/// use cantina_core::lunch::YearMonth;
	///
	/// let ym = YearMonth::parse("2026-03").unwrap();
	/// assert_eq!(ym.to_string(), "2026-03");
	/// assert_eq!(ym.label(), "Marzo 2026");
	/// assert!(YearMonth::parse("2026-13").is_err());
	/// ```
	pub fn parse(raw: &str) -> Result<Self> {
		let (year, month) = raw
			.trim()
			.split_once('-')
			.ok_or_else(|| Error::Validation(format!("Invalid month '{}', expected YYYY-MM", raw)))?;
		let year = year
			.parse::<i32>()
			.map_err(|_| Error::Validation(format!("Invalid year in '{}'", raw)))?;
		let month = month
			.parse::<u32>()
			.map_err(|_| Error::Validation(format!("Invalid month in '{}'", raw)))?;
		Self::new(year, month)
	}

	pub fn first_day(&self) -> NaiveDate {
		NaiveDate::from_ymd_opt(self.year, self.month, 1).unwrap_or(NaiveDate::MIN)
	}

	/// First day of the following month.
	pub fn next_first_day(&self) -> NaiveDate {
		let (year, month) = if self.month == 12 {
			(self.year + 1, 1)
		} else {
			(self.year, self.month + 1)
		};
		NaiveDate::from_ymd_opt(year, month, 1).unwrap_or(NaiveDate::MAX)
	}

	pub fn due_date(&self) -> NaiveDate {
		NaiveDate::from_ymd_opt(self.year, self.month, MONTHLY_DUE_DAY).unwrap_or(NaiveDate::MIN)
	}

	pub fn contains(&self, date: NaiveDate) -> bool {
		date >= self.first_day() && date < self.next_first_day()
	}

	/// `"Marzo 2026"`.
	pub fn label(&self) -> String {
		format!("{} {}", month_name(self.month).unwrap_or("?"), self.year)
	}
}

impl std::fmt::Display for YearMonth {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{:04}-{:02}", self.year, self.month)
	}
}

/// State of a monthly account given what was charged and paid.
pub fn account_state(total: Guaranies, paid: Guaranies) -> AccountState {
	if paid >= total {
		AccountState::Paid
	} else if paid.is_positive() {
		AccountState::Partial
	} else {
		AccountState::Pending
	}
}

pub fn pending_amount(total: Guaranies, paid: Guaranies) -> Guaranies {
	(total - paid).max(Guaranies::ZERO)
}

/// Components a lunch type includes, in serving order.
pub fn components(main_course: &str, includes_dessert: bool, includes_drink: bool) -> Vec<String> {
	let mut items = vec![main_course.to_string()];
	if includes_dessert {
		items.push("Postre".to_string());
	}
	if includes_drink {
		items.push("Bebida".to_string());
	}
	items
}
