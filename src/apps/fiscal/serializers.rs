use cantina_db::repositories::fiscal::NewStamp;
use chrono::NaiveDate;
use serde::Deserialize;
use validator::Validate;

use crate::services::fiscal::ReturnLine;

#[derive(Debug, Deserialize, Validate)]
pub struct StampRequest {
	#[validate(length(min = 1, max = 20, message = "is required"))]
	pub number: String,
	#[validate(length(equal = 3))]
	pub establishment: String,
	#[validate(length(equal = 3))]
	pub expedition_point: String,
	pub valid_from: NaiveDate,
	pub valid_until: NaiveDate,
	#[validate(range(min = 1))]
	pub first_number: i64,
	#[validate(range(min = 1))]
	pub last_number: i64,
}

impl From<StampRequest> for NewStamp {
	fn from(request: StampRequest) -> Self {
		NewStamp {
			number: request.number.trim().to_string(),
			establishment: request.establishment,
			expedition_point: request.expedition_point,
			valid_from: request.valid_from,
			valid_until: request.valid_until,
			first_number: request.first_number,
			last_number: request.last_number,
		}
	}
}

#[derive(Debug, Deserialize)]
pub struct InvoiceRequest {
	pub sale_id: i64,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreditNoteRequest {
	#[validate(length(min = 1, max = 255, message = "is required"))]
	pub reason: String,
	#[validate(length(min = 1, message = "must contain at least one item"))]
	pub items: Vec<ReturnLine>,
}
