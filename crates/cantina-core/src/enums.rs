//! String-coded enums.
//!
//! States and kinds are persisted as TEXT columns and travel as
//! SCREAMING_SNAKE_CASE strings in JSON. The [`string_enum!`] macro generates
//! the conversions in both directions so every enum parses, prints and
//! (de)serializes the same way.

use crate::exception::Error;

/// Declares a string-coded enum.
///
/// Generates `as_str`, `ALL`, `Display`, `FromStr`, `TryFrom<String>` (used by
/// row decoding) and serde implementations that use the same codes.
#[macro_export]
macro_rules! string_enum {
	(
		$(#[$meta:meta])*
		$vis:vis enum $name:ident {
			$( $(#[$vmeta:meta])* $variant:ident => $code:literal ),+ $(,)?
		}
	) => {
		$(#[$meta])*
		#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
		$vis enum $name {
			$( $(#[$vmeta])* $variant ),+
		}

		impl $name {
			/// Every variant, in declaration order.
			pub const ALL: &'static [$name] = &[$($name::$variant),+];

			/// The persisted code of this variant.
			pub fn as_str(&self) -> &'static str {
				match self {
					$( $name::$variant => $code ),+
				}
			}
		}

		impl ::std::fmt::Display for $name {
			fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
				f.write_str(self.as_str())
			}
		}

		impl ::std::str::FromStr for $name {
			type Err = $crate::exception::Error;

			fn from_str(s: &str) -> ::std::result::Result<Self, Self::Err> {
				match s {
					$( $code => Ok($name::$variant), )+
					other => Err($crate::exception::Error::Validation(format!(
						"Invalid {} '{}'",
						stringify!($name),
						other
					))),
				}
			}
		}

		impl ::std::convert::TryFrom<String> for $name {
			type Error = $crate::exception::Error;

			fn try_from(value: String) -> ::std::result::Result<Self, Self::Error> {
				value.parse()
			}
		}

		impl ::serde::Serialize for $name {
			fn serialize<S: ::serde::Serializer>(&self, serializer: S) -> ::std::result::Result<S::Ok, S::Error> {
				serializer.serialize_str(self.as_str())
			}
		}

		impl<'de> ::serde::Deserialize<'de> for $name {
			fn deserialize<D: ::serde::Deserializer<'de>>(deserializer: D) -> ::std::result::Result<Self, D::Error> {
				let raw = <String as ::serde::Deserialize>::deserialize(deserializer)?;
				raw.parse().map_err(::serde::de::Error::custom)
			}
		}
	};
}

string_enum! {
	/// Lifecycle of a prepaid card.
	pub enum CardState {
		Active => "ACTIVE",
		Blocked => "BLOCKED",
		Expired => "EXPIRED",
	}
}

string_enum! {
	pub enum RechargeState {
		Pending => "PENDING",
		Confirmed => "CONFIRMED",
		Cancelled => "CANCELLED",
		Failed => "FAILED",
	}
}

string_enum! {
	/// Where a balance credit came from.
	pub enum RechargeSource {
		/// Cash handed to a cashier.
		Cash => "CASH",
		/// Online payment started from the parent portal.
		Portal => "PORTAL",
		/// Card payment returned when a sale is voided.
		Refund => "REFUND",
	}
}

string_enum! {
	pub enum SaleKind {
		Cash => "CASH",
		Credit => "CREDIT",
	}
}

string_enum! {
	pub enum PaymentState {
		Pending => "PENDING",
		Partial => "PARTIAL",
		Paid => "PAID",
	}
}

string_enum! {
	pub enum SaleState {
		Processed => "PROCESSED",
		Voided => "VOIDED",
	}
}

string_enum! {
	/// Employee roles, from least to most privileged.
	pub enum Role {
		Cashier => "CASHIER",
		Manager => "MANAGER",
		Administrator => "ADMINISTRATOR",
	}
}

impl Role {
	/// Position in the privilege hierarchy.
	pub fn level(&self) -> u8 {
		match self {
			Role::Cashier => 1,
			Role::Manager => 2,
			Role::Administrator => 3,
		}
	}

	/// Whether this role grants at least the privileges of `required`.
	///
	/// # Examples
	///
	/// ```
	/// use cantina_core::enums::Role;
	///
	/// assert!(Role::Administrator.includes(Role::Manager));
	/// assert!(!Role::Cashier.includes(Role::Manager));
	/// ```
	pub fn includes(&self, required: Role) -> bool {
		self.level() >= required.level()
	}
}

string_enum! {
	pub enum RestrictionKind {
		Celiac => "CELIAC",
		LactoseIntolerance => "LACTOSE_INTOLERANCE",
		PeanutAllergy => "PEANUT_ALLERGY",
		NutAllergy => "NUT_ALLERGY",
		EggAllergy => "EGG_ALLERGY",
		SeafoodAllergy => "SEAFOOD_ALLERGY",
		Vegetarian => "VEGETARIAN",
		Vegan => "VEGAN",
		Diabetes => "DIABETES",
		Hypertension => "HYPERTENSION",
	}
}

string_enum! {
	pub enum PromotionKind {
		PercentageDiscount => "PERCENTAGE_DISCOUNT",
		AmountDiscount => "AMOUNT_DISCOUNT",
		FixedPrice => "FIXED_PRICE",
		BuyNPayM => "BUY_N_PAY_M",
		Combo => "COMBO",
	}
}

string_enum! {
	pub enum PromotionScope {
		Product => "PRODUCT",
		Category => "CATEGORY",
		SaleTotal => "SALE_TOTAL",
		StudentGrade => "STUDENT_GRADE",
	}
}

string_enum! {
	pub enum SubscriptionState {
		Active => "ACTIVE",
		Suspended => "SUSPENDED",
		Cancelled => "CANCELLED",
	}
}

string_enum! {
	pub enum MonthlyPaymentState {
		Pending => "PENDING",
		Paid => "PAID",
		Overdue => "OVERDUE",
	}
}

string_enum! {
	pub enum BillingMode {
		Prepaid => "PREPAID",
		MonthlyCredit => "MONTHLY_CREDIT",
	}
}

string_enum! {
	pub enum AccountState {
		Pending => "PENDING",
		Partial => "PARTIAL",
		Paid => "PAID",
	}
}

string_enum! {
	pub enum LunchPaymentMethod {
		Cash => "CASH",
		Debit => "DEBIT",
		Credit => "CREDIT",
		Transfer => "TRANSFER",
		Other => "OTHER",
	}
}

string_enum! {
	pub enum PaymentMethodKind {
		Cash => "CASH",
		StudentCard => "STUDENT_CARD",
		DebitCard => "DEBIT_CARD",
		CreditCard => "CREDIT_CARD",
		Transfer => "TRANSFER",
		Wallet => "WALLET",
	}
}

string_enum! {
	pub enum CashSessionState {
		Open => "OPEN",
		Closed => "CLOSED",
	}
}

string_enum! {
	pub enum NotificationKind {
		LowBalance => "LOW_BALANCE",
		NegativeBalance => "NEGATIVE_BALANCE",
		DebtSettled => "DEBT_SETTLED",
		RechargeConfirmed => "RECHARGE_CONFIRMED",
		LunchPaymentOverdue => "LUNCH_PAYMENT_OVERDUE",
	}
}

string_enum! {
	pub enum StockMovementKind {
		Entry => "ENTRY",
		Exit => "EXIT",
		Adjustment => "ADJUSTMENT",
	}
}

string_enum! {
	pub enum DocumentState {
		Issued => "ISSUED",
		Voided => "VOIDED",
	}
}

string_enum! {
	/// A customer credit note is applied when it lowered an open debt.
	pub enum CreditNoteState {
		Issued => "ISSUED",
		Applied => "APPLIED",
		Voided => "VOIDED",
	}
}

string_enum! {
	/// Supplier current account entries: purchases charge, payments credit.
	pub enum SupplierMovementKind {
		Charge => "CHARGE",
		Payment => "PAYMENT",
	}
}

/// Parses an optional code, treating an empty string as absent.
pub fn parse_optional<T>(raw: Option<&str>) -> Result<Option<T>, Error>
where
	T: std::str::FromStr<Err = Error>,
{
	match raw {
		None => Ok(None),
		Some(s) if s.trim().is_empty() => Ok(None),
		Some(s) => s.trim().parse().map(Some),
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;

	#[rstest]
	fn test_round_trip_every_role() {
		for role in Role::ALL {
			let parsed: Role = role.as_str().parse().unwrap();
			assert_eq!(&parsed, role);
		}
	}

	#[rstest]
	fn test_unknown_code_is_validation_error() {
		let err = "SUPERUSER".parse::<Role>().unwrap_err();
		assert!(matches!(err, Error::Validation(_)));
		assert_eq!(err.to_string(), "Validation error: Invalid Role 'SUPERUSER'");
	}

	#[rstest]
	#[case(Role::Cashier, Role::Cashier, true)]
	#[case(Role::Cashier, Role::Manager, false)]
	#[case(Role::Manager, Role::Cashier, true)]
	#[case(Role::Manager, Role::Administrator, false)]
	#[case(Role::Administrator, Role::Manager, true)]
	fn test_role_hierarchy(#[case] role: Role, #[case] required: Role, #[case] expected: bool) {
		assert_eq!(role.includes(required), expected);
	}

	#[rstest]
	fn test_serde_uses_codes() {
		let json = serde_json::to_string(&RechargeSource::Portal).unwrap();
		assert_eq!(json, "\"PORTAL\"");
		let kind: PromotionKind = serde_json::from_str("\"BUY_N_PAY_M\"").unwrap();
		assert_eq!(kind, PromotionKind::BuyNPayM);
		assert!(serde_json::from_str::<SaleKind>("\"LAYAWAY\"").is_err());
	}

	#[rstest]
	fn test_parse_optional() {
		assert_eq!(parse_optional::<SaleKind>(None).unwrap(), None);
		assert_eq!(parse_optional::<SaleKind>(Some("  ")).unwrap(), None);
		assert_eq!(parse_optional::<SaleKind>(Some("CREDIT")).unwrap(), Some(SaleKind::Credit));
	}
}
