//! Promotion engine.
//!
//! A promotion is eligible for a cart when it is active, inside its date,
//! time and weekday windows, has uses left, matches the supplied code (if it
//! has one) and its applicable items reach the minimum amount and quantity.
//! Among eligible promotions the one granting the largest discount wins.

use chrono::{Datelike, NaiveDate, NaiveTime};
use serde::Serialize;

use crate::enums::{PromotionKind, PromotionScope};
use crate::exception::Result;
use crate::money::Guaranies;

/// A promotion as the engine sees it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromotionRule {
	pub id: i64,
	pub name: String,
	pub kind: PromotionKind,
	pub scope: PromotionScope,
	/// Basis points for percentage discounts, guaraníes otherwise.
	pub value: i64,
	/// `N` of buy-N-pay-M.
	pub buy_quantity: Option<i64>,
	/// `M` of buy-N-pay-M.
	pub pay_quantity: Option<i64>,
	pub active: bool,
	pub valid_from: Option<NaiveDate>,
	pub valid_until: Option<NaiveDate>,
	pub start_time: Option<NaiveTime>,
	pub end_time: Option<NaiveTime>,
	/// ISO weekdays (1 = Monday ... 7 = Sunday). Empty means every day.
	pub weekdays: Vec<u32>,
	pub max_uses: Option<i64>,
	pub uses: i64,
	pub code: Option<String>,
	pub minimum_amount: Option<Guaranies>,
	pub minimum_quantity: Option<i64>,
	pub product_ids: Vec<i64>,
	pub category_ids: Vec<i64>,
	pub grades: Vec<String>,
}

/// A cart line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CartLine {
	pub product_id: i64,
	pub category_id: Option<i64>,
	pub quantity: i64,
	pub unit_price: Guaranies,
}

impl CartLine {
	pub fn subtotal(&self) -> Result<Guaranies> {
		self.unit_price.checked_times(self.quantity)
	}
}

/// Sum of the line subtotals. Fails when an amount overflows.
pub fn cart_subtotal<'l, I: IntoIterator<Item = &'l CartLine>>(lines: I) -> Result<Guaranies> {
	lines
		.into_iter()
		.try_fold(Guaranies::ZERO, |total, line| total.checked_add(line.subtotal()?))
}

/// Circumstances of the sale being priced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartContext<'a> {
	pub date: NaiveDate,
	pub time: NaiveTime,
	pub student_grade: Option<&'a str>,
	pub code: Option<&'a str>,
}

/// The discount a promotion grants on a cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AppliedDiscount {
	pub promotion_id: i64,
	pub name: String,
	pub discount: Guaranies,
}

impl PromotionRule {
	/// Checks every filter that does not depend on the cart contents.
	pub fn is_available(&self, ctx: &CartContext<'_>) -> bool {
		if !self.active {
			return false;
		}
		if self.valid_from.is_some_and(|from| ctx.date < from) {
			return false;
		}
		if self.valid_until.is_some_and(|until| ctx.date > until) {
			return false;
		}
		if let (Some(start), Some(end)) = (self.start_time, self.end_time)
			&& (ctx.time < start || ctx.time > end)
		{
			return false;
		}
		let weekday = ctx.date.weekday().number_from_monday();
		if !self.weekdays.is_empty() && !self.weekdays.contains(&weekday) {
			return false;
		}
		if self.max_uses.is_some_and(|max| self.uses >= max) {
			return false;
		}
		match (&self.code, ctx.code) {
			(Some(code), Some(given)) => code.eq_ignore_ascii_case(given.trim()),
			(Some(_), None) => false,
			(None, _) => true,
		}
	}

	/// Lines the promotion applies to.
	pub fn applicable_lines<'l>(&self, lines: &'l [CartLine], ctx: &CartContext<'_>) -> Vec<&'l CartLine> {
		match self.scope {
			PromotionScope::Product => lines
				.iter()
				.filter(|line| self.product_ids.contains(&line.product_id))
				.collect(),
			PromotionScope::Category => lines
				.iter()
				.filter(|line| line.category_id.is_some_and(|id| self.category_ids.contains(&id)))
				.collect(),
			PromotionScope::SaleTotal => lines.iter().collect(),
			PromotionScope::StudentGrade => match ctx.student_grade {
				Some(grade) if self.grades.iter().any(|g| g.eq_ignore_ascii_case(grade)) => {
					lines.iter().collect()
				}
				_ => Vec::new(),
			},
		}
	}

	/// Discount this promotion grants, or `None` when it does not apply.
	pub fn discount_for(&self, lines: &[CartLine], ctx: &CartContext<'_>) -> Option<Guaranies> {
		if !self.is_available(ctx) {
			return None;
		}
		let applicable = self.applicable_lines(lines, ctx);
		if applicable.is_empty() {
			return None;
		}
		let subtotal = cart_subtotal(applicable.iter().copied()).ok()?;
		let quantity = applicable
			.iter()
			.try_fold(0i64, |total, line| total.checked_add(line.quantity))?;
		if self.minimum_amount.is_some_and(|min| subtotal < min) {
			return None;
		}
		if self.minimum_quantity.is_some_and(|min| quantity < min) {
			return None;
		}

		let discount = match self.kind {
			PromotionKind::PercentageDiscount => subtotal.percent_bp(self.value),
			PromotionKind::AmountDiscount => Guaranies(self.value).min(subtotal),
			PromotionKind::FixedPrice => (subtotal - Guaranies(self.value)).max(Guaranies::ZERO),
			PromotionKind::BuyNPayM => {
				let n = self.buy_quantity.unwrap_or(0);
				let m = self.pay_quantity.unwrap_or(0);
				if n <= 0 || m < 0 || m >= n {
					return None;
				}
				let free_units = (quantity / n) * (n - m);
				subtotal.div_round(quantity).checked_times(free_units).ok()?
			}
			PromotionKind::Combo => {
				let complete = self
					.product_ids
					.iter()
					.all(|id| applicable.iter().any(|line| line.product_id == *id));
				if !complete {
					return None;
				}
				(subtotal - Guaranies(self.value)).max(Guaranies::ZERO)
			}
		};

		discount.is_positive().then_some(discount)
	}
}

/// Picks the eligible promotion with the largest discount.
///
/// Ties go to the lowest promotion id.
pub fn best_promotion(
	promotions: &[PromotionRule],
	lines: &[CartLine],
	ctx: &CartContext<'_>,
) -> Option<AppliedDiscount> {
	let cart_total = cart_subtotal(lines).ok()?;
	promotions
		.iter()
		.filter_map(|promotion| {
			promotion.discount_for(lines, ctx).map(|discount| AppliedDiscount {
				promotion_id: promotion.id,
				name: promotion.name.clone(),
				discount: discount.min(cart_total),
			})
		})
		.max_by(|a, b| {
			a.discount
				.cmp(&b.discount)
				.then_with(|| b.promotion_id.cmp(&a.promotion_id))
		})
}

/// Parses a comma separated weekday list such as `"1,2,3"`.
pub fn parse_weekdays(raw: &str) -> Vec<u32> {
	raw.split(',')
		.filter_map(|part| part.trim().parse::<u32>().ok())
		.filter(|day| (1..=7).contains(day))
		.collect()
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::{fixture, rstest};

	fn rule(id: i64, kind: PromotionKind, scope: PromotionScope, value: i64) -> PromotionRule {
		PromotionRule {
			id,
			name: format!("Promo {}", id),
			kind,
			scope,
			value,
			buy_quantity: None,
			pay_quantity: None,
			active: true,
			valid_from: None,
			valid_until: None,
			start_time: None,
			end_time: None,
			weekdays: Vec::new(),
			max_uses: None,
			uses: 0,
			code: None,
			minimum_amount: None,
			minimum_quantity: None,
			product_ids: Vec::new(),
			category_ids: Vec::new(),
			grades: Vec::new(),
		}
	}

	#[fixture]
	fn lines() -> Vec<CartLine> {
		vec![
			CartLine {
				product_id: 1,
				category_id: Some(10),
				quantity: 3,
				unit_price: Guaranies(5_000),
			},
			CartLine {
				product_id: 2,
				category_id: Some(20),
				quantity: 1,
				unit_price: Guaranies(8_000),
			},
		]
	}

	// 2026-03-04 is a Wednesday
	fn ctx<'a>() -> CartContext<'a> {
		CartContext {
			date: NaiveDate::from_ymd_opt(2026, 3, 4).unwrap(),
			time: NaiveTime::from_hms_opt(10, 30, 0).unwrap(),
			student_grade: None,
			code: None,
		}
	}

	#[rstest]
	fn test_percentage_on_total(lines: Vec<CartLine>) {
		let promo = rule(1, PromotionKind::PercentageDiscount, PromotionScope::SaleTotal, 1_000);
		assert_eq!(promo.discount_for(&lines, &ctx()), Some(Guaranies(2_300)));
	}

	#[rstest]
	fn test_amount_capped_by_subtotal(lines: Vec<CartLine>) {
		let mut promo = rule(2, PromotionKind::AmountDiscount, PromotionScope::Product, 20_000);
		promo.product_ids = vec![2];
		assert_eq!(promo.discount_for(&lines, &ctx()), Some(Guaranies(8_000)));
	}

	#[rstest]
	fn test_overflowing_cart_gets_no_discount(mut lines: Vec<CartLine>) {
		assert_eq!(cart_subtotal(&lines).unwrap(), Guaranies(23_000));
		lines[0].quantity = i64::MAX;
		assert!(cart_subtotal(&lines).is_err());

		let promo = rule(1, PromotionKind::PercentageDiscount, PromotionScope::SaleTotal, 1_000);
		assert_eq!(promo.discount_for(&lines, &ctx()), None);
		assert_eq!(best_promotion(&[promo], &lines, &ctx()), None);
	}

	#[rstest]
	fn test_fixed_price_on_category(lines: Vec<CartLine>) {
		let mut promo = rule(3, PromotionKind::FixedPrice, PromotionScope::Category, 12_000);
		promo.category_ids = vec![10];
		assert_eq!(promo.discount_for(&lines, &ctx()), Some(Guaranies(3_000)));
	}

	#[rstest]
	fn test_buy_three_pay_two(lines: Vec<CartLine>) {
		let mut promo = rule(4, PromotionKind::BuyNPayM, PromotionScope::Product, 0);
		promo.product_ids = vec![1];
		promo.buy_quantity = Some(3);
		promo.pay_quantity = Some(2);
		assert_eq!(promo.discount_for(&lines, &ctx()), Some(Guaranies(5_000)));
	}

	#[rstest]
	fn test_combo_requires_every_product(lines: Vec<CartLine>) {
		let mut promo = rule(5, PromotionKind::Combo, PromotionScope::Product, 20_000);
		promo.product_ids = vec![1, 2];
		assert_eq!(promo.discount_for(&lines, &ctx()), Some(Guaranies(3_000)));

		promo.product_ids = vec![1, 2, 3];
		assert_eq!(promo.discount_for(&lines, &ctx()), None);
	}

	#[rstest]
	fn test_filters(lines: Vec<CartLine>) {
		let base = rule(6, PromotionKind::PercentageDiscount, PromotionScope::SaleTotal, 500);

		let mut expired = base.clone();
		expired.valid_until = NaiveDate::from_ymd_opt(2026, 3, 3);
		assert_eq!(expired.discount_for(&lines, &ctx()), None);

		let mut weekend = base.clone();
		weekend.weekdays = vec![6, 7];
		assert_eq!(weekend.discount_for(&lines, &ctx()), None);

		let mut happy_hour = base.clone();
		happy_hour.start_time = NaiveTime::from_hms_opt(15, 0, 0);
		happy_hour.end_time = NaiveTime::from_hms_opt(17, 0, 0);
		assert_eq!(happy_hour.discount_for(&lines, &ctx()), None);

		let mut exhausted = base.clone();
		exhausted.max_uses = Some(10);
		exhausted.uses = 10;
		assert_eq!(exhausted.discount_for(&lines, &ctx()), None);

		let mut big_cart_only = base.clone();
		big_cart_only.minimum_amount = Some(Guaranies(50_000));
		assert_eq!(big_cart_only.discount_for(&lines, &ctx()), None);

		let mut quantity = base;
		quantity.minimum_quantity = Some(4);
		assert!(quantity.discount_for(&lines, &ctx()).is_some());
	}

	#[rstest]
	fn test_code_promotions(lines: Vec<CartLine>) {
		let mut promo = rule(7, PromotionKind::AmountDiscount, PromotionScope::SaleTotal, 1_000);
		promo.code = Some("VUELTA2026".into());
		assert_eq!(promo.discount_for(&lines, &ctx()), None);

		let mut with_code = ctx();
		with_code.code = Some("vuelta2026");
		assert_eq!(promo.discount_for(&lines, &with_code), Some(Guaranies(1_000)));
	}

	#[rstest]
	fn test_grade_scope(lines: Vec<CartLine>) {
		let mut promo = rule(8, PromotionKind::AmountDiscount, PromotionScope::StudentGrade, 2_000);
		promo.grades = vec!["3A".into()];
		assert_eq!(promo.discount_for(&lines, &ctx()), None);

		let mut student = ctx();
		student.student_grade = Some("3a");
		assert_eq!(promo.discount_for(&lines, &student), Some(Guaranies(2_000)));
	}

	#[rstest]
	fn test_best_promotion_picks_largest(lines: Vec<CartLine>) {
		let small = rule(1, PromotionKind::AmountDiscount, PromotionScope::SaleTotal, 1_000);
		let large = rule(2, PromotionKind::PercentageDiscount, PromotionScope::SaleTotal, 2_000);
		let tie = rule(3, PromotionKind::AmountDiscount, PromotionScope::SaleTotal, 4_600);
		let best = best_promotion(&[small, large, tie], &lines, &ctx()).unwrap();
		assert_eq!(best.promotion_id, 2);
		assert_eq!(best.discount, Guaranies(4_600));
	}

	#[rstest]
	fn test_parse_weekdays() {
		assert_eq!(parse_weekdays("1, 3,5"), vec![1, 3, 5]);
		assert_eq!(parse_weekdays("0,8,x,7"), vec![7]);
		assert!(parse_weekdays("").is_empty());
	}
}
