//! Customer and student payloads.

use cantina_core::enums::RestrictionKind;
use cantina_db::repositories::customers::{CustomerChanges, NewCustomer, NewStudent, StudentChanges};
use chrono::NaiveDate;
use serde::Deserialize;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct CustomerRequest {
	#[validate(length(min = 1, max = 100, message = "is required"))]
	pub first_name: String,
	#[validate(length(min = 1, max = 100, message = "is required"))]
	pub last_name: String,
	/// RUC or identity card number.
	#[validate(length(min = 1, max = 20, message = "is required"))]
	pub tax_id: String,
	#[validate(email(message = "Invalid email format"))]
	pub email: Option<String>,
	pub phone: Option<String>,
	pub address: Option<String>,
}

impl CustomerRequest {
	pub fn into_new(self) -> NewCustomer {
		NewCustomer {
			first_name: self.first_name.trim().to_string(),
			last_name: self.last_name.trim().to_string(),
			tax_id: self.tax_id.trim().to_string(),
			email: self.email.map(|e| e.trim().to_lowercase()),
			phone: self.phone,
			address: self.address,
		}
	}
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct CustomerUpdateRequest {
	#[validate(length(min = 1, message = "cannot be empty"))]
	pub first_name: Option<String>,
	#[validate(length(min = 1, message = "cannot be empty"))]
	pub last_name: Option<String>,
	#[validate(email(message = "Invalid email format"))]
	pub email: Option<String>,
	pub phone: Option<String>,
	pub address: Option<String>,
	pub active: Option<bool>,
}

impl From<CustomerUpdateRequest> for CustomerChanges {
	fn from(data: CustomerUpdateRequest) -> Self {
		CustomerChanges {
			first_name: data.first_name,
			last_name: data.last_name,
			email: data.email.map(|e| e.trim().to_lowercase()),
			phone: data.phone,
			address: data.address,
			active: data.active,
		}
	}
}

#[derive(Debug, Deserialize, Validate)]
pub struct StudentRequest {
	#[validate(length(min = 1, max = 100, message = "is required"))]
	pub first_name: String,
	#[validate(length(min = 1, max = 100, message = "is required"))]
	pub last_name: String,
	#[validate(length(min = 1, max = 20, message = "is required"))]
	pub grade: String,
	pub birth_date: Option<NaiveDate>,
}

impl StudentRequest {
	pub fn into_new(self, customer_id: i64) -> NewStudent {
		NewStudent {
			customer_id,
			first_name: self.first_name.trim().to_string(),
			last_name: self.last_name.trim().to_string(),
			grade: self.grade.trim().to_string(),
			birth_date: self.birth_date,
		}
	}
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct StudentUpdateRequest {
	#[validate(length(min = 1, message = "cannot be empty"))]
	pub first_name: Option<String>,
	#[validate(length(min = 1, message = "cannot be empty"))]
	pub last_name: Option<String>,
	#[validate(length(min = 1, message = "cannot be empty"))]
	pub grade: Option<String>,
	pub birth_date: Option<NaiveDate>,
	pub active: Option<bool>,
}

impl From<StudentUpdateRequest> for StudentChanges {
	fn from(data: StudentUpdateRequest) -> Self {
		StudentChanges {
			first_name: data.first_name,
			last_name: data.last_name,
			grade: data.grade,
			birth_date: data.birth_date,
			active: data.active,
		}
	}
}

#[derive(Debug, Deserialize, Validate)]
pub struct RestrictionRequest {
	pub kind: RestrictionKind,
	#[validate(length(max = 500))]
	pub notes: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct PortalUserRequest {
	#[validate(email(message = "Invalid email format"))]
	pub email: String,
	pub password: String,
}
