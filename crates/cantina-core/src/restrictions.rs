//! Dietary restriction matching.
//!
//! Products carry no ingredient lists, so conflicts are inferred from the
//! vocabulary of the product description, its category, the components of a
//! lunch and the notes a guardian wrote on the restriction. Each signal adds to
//! a score capped at 100; a score of 50 or more is a conflict.

use serde::Serialize;

use crate::enums::RestrictionKind;

/// Score at which a product is considered to conflict with a restriction.
pub const CONFLICT_THRESHOLD: u32 = 50;
/// Upper bound of the score.
pub const MAX_SCORE: u32 = 100;
/// Maximum number of alternatives suggested for a conflicting product.
pub const MAX_ALTERNATIVES: usize = 5;

const DESCRIPTION_WEIGHT: u32 = 30;
const CATEGORY_WEIGHT: u32 = 20;
const COMPONENT_WEIGHT: u32 = 25;
const NOTES_WEIGHT: u32 = 15;

/// Words that suggest a product is unsuitable for a restriction.
pub fn keywords(kind: RestrictionKind) -> &'static [&'static str] {
	match kind {
		RestrictionKind::Celiac => &[
			"harina", "trigo", "pan", "galleta", "pasta", "fideos", "empanada", "pizza", "torta",
			"bizcocho", "pastel", "cerveza", "malta", "avena", "cebada", "centeno",
		],
		RestrictionKind::LactoseIntolerance => &[
			"leche", "yogur", "queso", "crema", "manteca", "dulce de leche", "nata", "lacteo",
			"lácteo", "helado", "flan", "natilla", "ricota", "mozzarella", "parmesano",
		],
		RestrictionKind::PeanutAllergy => &["mani", "maní", "cacahuate", "cacahuete", "peanut"],
		RestrictionKind::NutAllergy => &[
			"nuez", "almendra", "avellana", "pistacho", "castaña", "anacardo", "macadamia", "pecana",
		],
		RestrictionKind::EggAllergy => &[
			"huevo", "clara", "yema", "merengue", "mayonesa", "tortilla", "omelette",
		],
		RestrictionKind::SeafoodAllergy => &[
			"camaron", "camarón", "langosta", "cangrejo", "surubí", "pescado", "atún", "salmón",
			"merluza", "corvina", "dorado", "mejillón", "almeja", "calamar",
		],
		RestrictionKind::Vegetarian => MEAT,
		RestrictionKind::Vegan => &[
			"carne", "pollo", "cerdo", "vacuno", "pavo", "jamón", "chorizo", "salchicha",
			"mortadela", "milanesa", "hamburguesa", "asado", "costilla", "lomo", "leche", "yogur",
			"queso", "crema", "manteca", "huevo", "miel",
		],
		RestrictionKind::Diabetes => &[
			"azucar", "azúcar", "dulce", "caramelo", "chocolate", "gaseosa", "coca", "sprite",
			"fanta", "refresco", "jugo", "néctar", "helado", "golosina",
		],
		RestrictionKind::Hypertension => &[
			"sal", "salado", "embutido", "fiambre", "jamón", "mortadela", "chorizo", "salchicha",
			"snack", "chipa", "chipá", "papas fritas",
		],
	}
}

const MEAT: &[&str] = &[
	"carne", "pollo", "cerdo", "vacuno", "pavo", "jamón", "chorizo", "salchicha", "mortadela",
	"milanesa", "hamburguesa", "asado", "costilla", "lomo",
];

/// Product categories that usually carry the restricted ingredients.
pub fn risk_categories(kind: RestrictionKind) -> &'static [&'static str] {
	match kind {
		RestrictionKind::Celiac => &["Panadería", "Pastelería", "Snacks"],
		RestrictionKind::LactoseIntolerance => &["Lácteos", "Postres", "Helados"],
		RestrictionKind::PeanutAllergy | RestrictionKind::NutAllergy => {
			&["Snacks", "Dulces", "Confitería"]
		}
		RestrictionKind::EggAllergy => &["Panadería", "Pastelería", "Postres"],
		RestrictionKind::SeafoodAllergy => &["Almuerzos", "Platos preparados"],
		RestrictionKind::Vegetarian => &["Almuerzos", "Snacks", "Platos preparados"],
		RestrictionKind::Vegan => &["Almuerzos", "Lácteos", "Postres", "Platos preparados"],
		RestrictionKind::Diabetes => &["Dulces", "Bebidas", "Snacks", "Postres"],
		RestrictionKind::Hypertension => &["Snacks", "Almuerzos", "Embutidos"],
	}
}

/// What the matcher needs to know about a product.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductProfile {
	pub id: i64,
	pub description: String,
	pub category_id: Option<i64>,
	pub category: Option<String>,
	pub active: bool,
	/// Lunch components (main course, dessert, drink) when the product is a lunch.
	pub components: Vec<String>,
}

/// A student's restriction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestrictionProfile {
	pub kind: RestrictionKind,
	pub notes: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
	Low,
	Medium,
	High,
}

impl Severity {
	pub fn from_score(score: u32) -> Self {
		if score >= 80 {
			Severity::High
		} else if score >= 60 {
			Severity::Medium
		} else {
			Severity::Low
		}
	}

	/// Medium and high conflicts need a supervisor before the sale goes through.
	pub fn requires_authorization(self) -> bool {
		self >= Severity::Medium
	}
}

/// Score of one product against one restriction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Analysis {
	pub score: u32,
	pub reasons: Vec<String>,
}

impl Analysis {
	pub fn is_conflict(&self) -> bool {
		self.score >= CONFLICT_THRESHOLD
	}
}

/// A product that conflicts with one of the student's restrictions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Conflict {
	pub product_id: i64,
	pub product: String,
	pub restriction: RestrictionKind,
	pub score: u32,
	pub severity: Severity,
	pub requires_authorization: bool,
	pub reasons: Vec<String>,
}

/// Scores `product` against `restriction`.
///
/// # Examples
///
/// ```
/// use cantina_core::enums::RestrictionKind;
/// use cantina_core::restrictions::{analyze_product, ProductProfile, RestrictionProfile};
///
/// let product = ProductProfile {
///     id: 1,
///     description: "Sandwich de jamón y queso".into(),
///     category_id: Some(3),
///     category: Some("Snacks".into()),
///     active: true,
///     components: vec![],
/// };
/// let restriction = RestrictionProfile { kind: RestrictionKind::LactoseIntolerance, notes: None };
/// let analysis = analyze_product(&product, &restriction);
/// assert_eq!(analysis.score, 30);
/// assert!(!analysis.is_conflict());
/// ```
pub fn analyze_product(product: &ProductProfile, restriction: &RestrictionProfile) -> Analysis {
	let words = keywords(restriction.kind);
	let mut score = 0u32;
	let mut reasons = Vec::new();

	let description = product.description.to_lowercase();
	for keyword in words {
		if description.contains(keyword) {
			score += DESCRIPTION_WEIGHT;
			reasons.push(format!("Description contains '{}'", keyword));
		}
	}

	if let Some(category) = &product.category
		&& risk_categories(restriction.kind)
			.iter()
			.any(|risk| risk.eq_ignore_ascii_case(category))
	{
		score += CATEGORY_WEIGHT;
		reasons.push(format!("Belongs to risk category '{}'", category));
	}

	for component in &product.components {
		let lowered = component.to_lowercase();
		for keyword in words {
			if lowered.contains(keyword) {
				score += COMPONENT_WEIGHT;
				reasons.push(format!("Component '{}' may contain '{}'", component, keyword));
			}
		}
	}

	if let Some(notes) = &restriction.notes {
		let lowered = notes.to_lowercase();
		for keyword in words {
			if lowered.contains(keyword) {
				score += NOTES_WEIGHT;
				reasons.push(format!("Restriction notes mention '{}'", keyword));
			}
		}
	}

	Analysis {
		score: score.min(MAX_SCORE),
		reasons,
	}
}

/// Every conflict between the products and the restrictions, worst first.
pub fn analyze_cart(products: &[ProductProfile], restrictions: &[RestrictionProfile]) -> Vec<Conflict> {
	let mut conflicts: Vec<Conflict> = products
		.iter()
		.flat_map(|product| {
			restrictions.iter().filter_map(move |restriction| {
				let analysis = analyze_product(product, restriction);
				if !analysis.is_conflict() {
					return None;
				}
				let severity = Severity::from_score(analysis.score);
				Some(Conflict {
					product_id: product.id,
					product: product.description.clone(),
					restriction: restriction.kind,
					score: analysis.score,
					severity,
					requires_authorization: severity.requires_authorization(),
					reasons: analysis.reasons,
				})
			})
		})
		.collect();
	conflicts.sort_by(|a, b| b.score.cmp(&a.score).then(a.product_id.cmp(&b.product_id)));
	conflicts
}

/// Whether a product conflicts with any restriction.
pub fn is_safe(product: &ProductProfile, restrictions: &[RestrictionProfile]) -> bool {
	restrictions
		.iter()
		.all(|restriction| !analyze_product(product, restriction).is_conflict())
}

/// Active products without conflicts.
pub fn safe_products<'a>(
	products: &'a [ProductProfile],
	restrictions: &[RestrictionProfile],
) -> Vec<&'a ProductProfile> {
	products
		.iter()
		.filter(|product| product.active && is_safe(product, restrictions))
		.collect()
}

/// Up to [`MAX_ALTERNATIVES`] safe products from the same category.
pub fn suggest_alternatives<'a>(
	product: &ProductProfile,
	candidates: &'a [ProductProfile],
	restrictions: &[RestrictionProfile],
) -> Vec<&'a ProductProfile> {
	candidates
		.iter()
		.filter(|candidate| candidate.id != product.id)
		.filter(|candidate| candidate.active)
		.filter(|candidate| product.category_id.is_some() && candidate.category_id == product.category_id)
		.filter(|candidate| is_safe(candidate, restrictions))
		.take(MAX_ALTERNATIVES)
		.collect()
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::{fixture, rstest};

	fn product(id: i64, description: &str, category: Option<(i64, &str)>) -> ProductProfile {
		ProductProfile {
			id,
			description: description.to_string(),
			category_id: category.map(|(id, _)| id),
			category: category.map(|(_, name)| name.to_string()),
			active: true,
			components: Vec::new(),
		}
	}

	#[fixture]
	fn celiac() -> Vec<RestrictionProfile> {
		vec![RestrictionProfile {
			kind: RestrictionKind::Celiac,
			notes: None,
		}]
	}

	#[rstest]
	fn test_keyword_and_category_reach_conflict(celiac: Vec<RestrictionProfile>) {
		// "pan" + "galleta" = 60, bakery category +20
		let cookie = product(1, "Galleta de pan dulce", Some((1, "Panadería")));
		let analysis = analyze_product(&cookie, &celiac[0]);
		assert_eq!(analysis.score, 80);
		assert!(analysis.is_conflict());
		assert_eq!(analysis.reasons.len(), 3);
		assert_eq!(Severity::from_score(analysis.score), Severity::High);
	}

	#[rstest]
	fn test_category_alone_is_not_conflict(celiac: Vec<RestrictionProfile>) {
		let chips = product(2, "Papas chips", Some((2, "Snacks")));
		let analysis = analyze_product(&chips, &celiac[0]);
		assert_eq!(analysis.score, 20);
		assert!(!analysis.is_conflict());
	}

	#[rstest]
	fn test_score_is_capped() {
		let restriction = RestrictionProfile {
			kind: RestrictionKind::Vegan,
			notes: Some("Sin leche, sin huevo, sin miel".into()),
		};
		let mut lunch = product(3, "Milanesa de pollo con queso y huevo", Some((4, "Almuerzos")));
		lunch.components = vec!["Flan con crema".into(), "Leche chocolatada".into()];
		let analysis = analyze_product(&lunch, &restriction);
		assert_eq!(analysis.score, MAX_SCORE);
	}

	#[rstest]
	fn test_notes_and_components_weights() {
		let restriction = RestrictionProfile {
			kind: RestrictionKind::EggAllergy,
			notes: Some("Reacción fuerte a la mayonesa".into()),
		};
		let mut lunch = product(4, "Menú del día", None);
		lunch.components = vec!["Ensalada con mayonesa".into()];
		let analysis = analyze_product(&lunch, &restriction);
		// component 25 + notes 15
		assert_eq!(analysis.score, 40);
	}

	#[rstest]
	#[case(49, Severity::Low, false)]
	#[case(59, Severity::Low, false)]
	#[case(60, Severity::Medium, true)]
	#[case(79, Severity::Medium, true)]
	#[case(80, Severity::High, true)]
	fn test_severity_thresholds(#[case] score: u32, #[case] severity: Severity, #[case] needs_auth: bool) {
		assert_eq!(Severity::from_score(score), severity);
		assert_eq!(severity.requires_authorization(), needs_auth);
	}

	#[rstest]
	fn test_analyze_cart_orders_by_score(celiac: Vec<RestrictionProfile>) {
		let products = vec![
			product(10, "Barrita de avena", Some((1, "Snacks"))),
			product(11, "Agua mineral", Some((5, "Bebidas"))),
			product(12, "Pizza de pan casero", Some((1, "Panadería"))),
		];
		let conflicts = analyze_cart(&products, &celiac);
		let ids: Vec<i64> = conflicts.iter().map(|c| c.product_id).collect();
		assert_eq!(ids, vec![12, 10]);
		assert_eq!(conflicts[0].severity, Severity::High);
		assert_eq!(conflicts[1].score, 50);
		assert!(!conflicts[1].requires_authorization);
	}

	#[rstest]
	fn test_alternatives_same_category_and_safe(celiac: Vec<RestrictionProfile>) {
		let sandwich = product(20, "Sándwich de pan de trigo", Some((7, "Rápidos")));
		let mut inactive = product(23, "Ensalada de frutas", Some((7, "Rápidos")));
		inactive.active = false;
		let candidates = vec![
			sandwich.clone(),
			product(21, "Tortilla de mandioca", Some((7, "Rápidos"))),
			product(22, "Pasta con salsa", Some((7, "Rápidos"))),
			inactive,
			product(24, "Chipa guazú", Some((8, "Otros"))),
		];
		let alternatives = suggest_alternatives(&sandwich, &candidates, &celiac);
		let ids: Vec<i64> = alternatives.iter().map(|p| p.id).collect();
		// Pasta only scores 30, below the threshold
		assert_eq!(ids, vec![21, 22]);
	}

	#[rstest]
	fn test_safe_products(celiac: Vec<RestrictionProfile>) {
		let products = vec![
			product(30, "Agua mineral", None),
			product(31, "Torta de harina", Some((1, "Pastelería"))),
		];
		let safe: Vec<i64> = safe_products(&products, &celiac).iter().map(|p| p.id).collect();
		assert_eq!(safe, vec![30]);
	}
}
