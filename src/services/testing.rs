//! Fixtures for service tests: an in-memory database with a small canteen.

use std::sync::Arc;

use cantina_auth::PasswordHasher;
use cantina_conf::Settings;
use cantina_core::enums::Role;
use cantina_core::{Guaranies, Result};
use cantina_db::Database;
use cantina_db::repositories::{accounts, cards, catalog, customers};
use rstest::fixture;

use crate::state::AppState;

/// Argon2 is slow in debug builds; tests only need a reversible stand-in.
pub(crate) struct PlainHasher;

impl PasswordHasher for PlainHasher {
	fn hash(&self, password: &str) -> Result<String> {
		Ok(format!("plain${}", password))
	}

	fn verify(&self, password: &str, hash: &str) -> Result<bool> {
		Ok(hash.strip_prefix("plain$") == Some(password))
	}
}

pub(crate) const CARD: &str = "1001";

pub(crate) struct TestEnv {
	pub state: AppState,
	pub admin_id: i64,
	pub manager_id: i64,
	pub cashier_id: i64,
	pub customer_id: i64,
	pub portal_user_id: i64,
	pub student_id: i64,
	pub snacks_id: i64,
	pub sandwich_id: i64,
	pub juice_id: i64,
	pub peanut_bar_id: i64,
}

impl TestEnv {
	pub async fn card(&self) -> cards::Card {
		let mut conn = self.state.db.pool().acquire().await.unwrap();
		cards::get_card(&mut conn, CARD).await.unwrap()
	}

	pub async fn set_balance(&self, balance: i64) {
		let mut conn = self.state.db.pool().acquire().await.unwrap();
		cards::set_balance(&mut conn, CARD, Guaranies(balance)).await.unwrap();
	}

	pub async fn stock(&self, product_id: i64) -> i64 {
		let mut conn = self.state.db.pool().acquire().await.unwrap();
		catalog::get_product(&mut conn, product_id).await.unwrap().stock
	}
}

pub(crate) fn test_settings() -> Settings {
	let mut settings = Settings::default();
	settings.portal.gateway_secret = "gateway-test-secret".to_string();
	settings
}

/// Staff of three roles, one family with a student and a card, and a few
/// products in stock.
#[fixture]
pub(crate) async fn env() -> TestEnv {
	let db = Database::in_memory().await.unwrap();
	let state = AppState::new(db, test_settings()).with_hasher(Arc::new(PlainHasher));
	let mut conn = state.db.pool().acquire().await.unwrap();

	let hash = |password: &str| PlainHasher.hash(password).unwrap();
	let admin = accounts::insert_employee(&mut conn, "admin", &hash("admin-2026"), "Ana", "Benítez", Role::Administrator)
		.await
		.unwrap();
	let manager = accounts::insert_employee(&mut conn, "gerente", &hash("gerente-2026"), "Marta", "Ríos", Role::Manager)
		.await
		.unwrap();
	let cashier = accounts::insert_employee(&mut conn, "cajera", &hash("cajera-2026"), "Lucía", "Gómez", Role::Cashier)
		.await
		.unwrap();

	let customer = customers::insert_customer(
		&mut conn,
		&customers::NewCustomer {
			first_name: "Carlos".into(),
			last_name: "Fernández".into(),
			tax_id: "1234567-9".into(),
			email: Some("familia@example.com".into()),
			..Default::default()
		},
	)
	.await
	.unwrap();
	let portal_user = accounts::insert_portal_user(&mut conn, customer.id, "familia@example.com", &hash("portal-2026"))
		.await
		.unwrap();
	let student = customers::insert_student(
		&mut conn,
		&customers::NewStudent {
			customer_id: customer.id,
			first_name: "Sofía".into(),
			last_name: "Fernández".into(),
			grade: "5B".into(),
			birth_date: None,
		},
	)
	.await
	.unwrap();
	cards::insert_card(&mut conn, CARD, student.id, None, None).await.unwrap();

	let snacks = catalog::insert_category(&mut conn, "Snacks", None).await.unwrap();
	let drinks = catalog::insert_category(&mut conn, "Bebidas", None).await.unwrap();
	let product = |category_id: i64, description: &str, price: i64, vat_rate: i64| catalog::NewProduct {
		category_id,
		description: description.to_string(),
		price: Guaranies(price),
		vat_rate,
		minimum_stock: 2,
		..Default::default()
	};
	let sandwich = catalog::insert_product(&mut conn, &product(snacks.id, "Sandwich de pollo", 12_000, 10))
		.await
		.unwrap();
	let juice = catalog::insert_product(&mut conn, &product(drinks.id, "Jugo de naranja", 5_000, 10))
		.await
		.unwrap();
	let peanut_bar = catalog::insert_product(&mut conn, &product(snacks.id, "Barra de maní", 4_000, 10))
		.await
		.unwrap();
	for (id, quantity) in [(sandwich.id, 20), (juice.id, 10), (peanut_bar.id, 10)] {
		catalog::move_stock(&mut conn, id, cantina_core::enums::StockMovementKind::Entry, quantity, None, None)
			.await
			.unwrap();
	}
	drop(conn);

	TestEnv {
		state,
		admin_id: admin.id,
		manager_id: manager.id,
		cashier_id: cashier.id,
		customer_id: customer.id,
		portal_user_id: portal_user.id,
		student_id: student.id,
		snacks_id: snacks.id,
		sandwich_id: sandwich.id,
		juice_id: juice.id,
		peanut_bar_id: peanut_bar.id,
	}
}
