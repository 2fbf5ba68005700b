//! Promotion payloads.

use cantina_core::enums::{PromotionKind, PromotionScope};
use cantina_core::{Error, Guaranies, Result};
use cantina_db::repositories::promotions::PromotionData;
use chrono::{NaiveDate, NaiveTime};
use serde::Deserialize;
use validator::Validate;

/// Create and update share one payload; an update replaces every field.
#[derive(Debug, Deserialize, Validate)]
pub struct PromotionRequest {
	#[validate(length(min = 1, max = 100, message = "is required"))]
	pub name: String,
	pub description: Option<String>,
	pub kind: PromotionKind,
	pub scope: PromotionScope,
	/// Basis points for percentage discounts, guaraníes otherwise.
	#[validate(range(min = 0))]
	pub value: i64,
	pub buy_quantity: Option<i64>,
	pub pay_quantity: Option<i64>,
	pub valid_from: Option<NaiveDate>,
	pub valid_until: Option<NaiveDate>,
	pub start_time: Option<NaiveTime>,
	pub end_time: Option<NaiveTime>,
	/// ISO weekdays, 1 is Monday. Empty means every day.
	#[serde(default)]
	pub weekdays: Vec<u32>,
	#[validate(range(min = 1))]
	pub max_uses: Option<i64>,
	#[validate(length(min = 1, max = 30))]
	pub code: Option<String>,
	pub minimum_amount: Option<Guaranies>,
	#[validate(range(min = 1))]
	pub minimum_quantity: Option<i64>,
	#[serde(default)]
	pub grades: Vec<String>,
	#[serde(default)]
	pub product_ids: Vec<i64>,
	#[serde(default)]
	pub category_ids: Vec<i64>,
}

impl PromotionRequest {
	/// Checks the rules that span several fields.
	fn check(&self) -> Result<()> {
		let invalid = |message: &str| Err(Error::Validation(message.to_string()));
		if self.kind == PromotionKind::PercentageDiscount && self.value > 10_000 {
			return invalid("A percentage cannot exceed 10000 basis points");
		}
		if self.kind == PromotionKind::BuyNPayM {
			match (self.buy_quantity, self.pay_quantity) {
				(Some(buy), Some(pay)) if buy > pay && pay >= 1 => {}
				_ => return invalid("Buy N pay M needs buy_quantity > pay_quantity >= 1"),
			}
		}
		if self.kind == PromotionKind::Combo && self.product_ids.len() < 2 {
			return invalid("A combo needs at least two products");
		}
		if let (Some(from), Some(until)) = (self.valid_from, self.valid_until)
			&& until < from
		{
			return invalid("valid_until is before valid_from");
		}
		match (self.start_time, self.end_time) {
			(Some(start), Some(end)) if end <= start => return invalid("end_time must be after start_time"),
			(Some(_), None) | (None, Some(_)) => return invalid("start_time and end_time go together"),
			_ => {}
		}
		if self.weekdays.iter().any(|d| !(1..=7).contains(d)) {
			return invalid("Weekdays go from 1 (Monday) to 7 (Sunday)");
		}
		match self.scope {
			PromotionScope::Product if self.product_ids.is_empty() => invalid("Product promotions need product_ids"),
			PromotionScope::Category if self.category_ids.is_empty() => {
				invalid("Category promotions need category_ids")
			}
			PromotionScope::StudentGrade if self.grades.is_empty() => invalid("Grade promotions need grades"),
			_ => Ok(()),
		}
	}

	pub fn into_data(self) -> Result<PromotionData> {
		self.check()?;
		Ok(PromotionData {
			name: self.name.trim().to_string(),
			description: self.description,
			kind: self.kind,
			scope: self.scope,
			value: self.value,
			buy_quantity: self.buy_quantity,
			pay_quantity: self.pay_quantity,
			valid_from: self.valid_from,
			valid_until: self.valid_until,
			start_time: self.start_time,
			end_time: self.end_time,
			weekdays: self.weekdays,
			max_uses: self.max_uses,
			code: self.code.map(|c| c.trim().to_uppercase()),
			minimum_amount: self.minimum_amount,
			minimum_quantity: self.minimum_quantity,
			grades: self.grades.iter().map(|g| g.trim().to_string()).collect(),
			product_ids: self.product_ids,
			category_ids: self.category_ids,
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;
	use serde_json::{Value, json};

	fn request(overrides: Value) -> PromotionRequest {
		let mut body = json!({
			"name": "Martes de snacks",
			"kind": "PERCENTAGE_DISCOUNT",
			"scope": "CATEGORY",
			"value": 1000,
			"category_ids": [1],
		});
		if let (Some(body), Some(overrides)) = (body.as_object_mut(), overrides.as_object()) {
			for (key, value) in overrides {
				body.insert(key.clone(), value.clone());
			}
		}
		serde_json::from_value(body).unwrap()
	}

	#[rstest]
	fn test_valid_promotion() {
		let data = request(json!({"code": " snack10 ", "weekdays": [2]})).into_data().unwrap();
		assert_eq!(data.code.as_deref(), Some("SNACK10"));
		assert_eq!(data.weekdays, vec![2]);
	}

	#[rstest]
	#[case(json!({"value": 10_001}))]
	#[case(json!({"category_ids": []}))]
	#[case(json!({"weekdays": [0]}))]
	#[case(json!({"start_time": "12:00:00"}))]
	#[case(json!({"valid_from": "2026-05-10", "valid_until": "2026-05-01"}))]
	#[case(json!({"kind": "BUY_N_PAY_M", "buy_quantity": 2, "pay_quantity": 2}))]
	#[case(json!({"kind": "COMBO", "scope": "PRODUCT", "product_ids": [4]}))]
	fn test_inconsistent_promotions(#[case] overrides: Value) {
		let error = request(overrides).into_data().unwrap_err();
		assert_eq!(error.status_code(), 400);
	}
}
