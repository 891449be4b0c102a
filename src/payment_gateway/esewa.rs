//! eSewa epay v2.
//!
//! The customer's browser posts a signed form to eSewa, eSewa redirects
//! back to our success/failure URL, and the status API settles anything the
//! redirect did not.
use base64::{engine::general_purpose::STANDARD, Engine};
use hmac::{Hmac, Mac};
use log::debug;
use serde_json::{Map, Value};
use sha2::Sha256;

use super::Payment;
use crate::{
	error::{AppError, AppResult},
	settings::Esewa,
};

pub type HmacSha256 = Hmac<Sha256>;

/// Fields eSewa expects to be signed when a payment is initiated, in order.
pub const INITIATE_SIGNED_FIELDS: &str = "total_amount,transaction_uuid,product_code";

/// Accepted difference between amounts, in rupees.
const AMOUNT_TOLERANCE: f64 = 0.01;

text_enum! {
	pub enum EsewaStatus {
		Pending => "PENDING",
		Complete => "COMPLETE",
		FullRefund => "FULL_REFUND",
		PartialRefund => "PARTIAL_REFUND",
		Ambiguous => "AMBIGUOUS",
		NotFound => "NOT_FOUND",
		Canceled => "CANCELED",
	}
}

/// Inputs of the form the frontend generates and submits to `action`.
#[derive(serde::Serialize, serde::Deserialize, Debug, Clone, PartialEq)]
pub struct PaymentForm {
	pub action: String,
	pub fields: FormFields,
}

#[derive(serde::Serialize, serde::Deserialize, Debug, Clone, PartialEq)]
pub struct FormFields {
	pub amount: String,
	pub tax_amount: String,
	pub total_amount: String,
	pub transaction_uuid: String,
	pub product_code: String,
	pub product_service_charge: String,
	pub product_delivery_charge: String,
	pub success_url: String,
	pub failure_url: String,
	pub signed_field_names: String,
	pub signature: String,
}

/// Decoded and verified `data` parameter of the success redirect.
#[derive(Debug, Clone, PartialEq)]
pub struct Callback {
	pub transaction_code: String,
	pub status: EsewaStatus,
	pub total_amount: f64,
	pub transaction_uuid: String,
	pub product_code: String,
}

/// Response of the transaction status API.
#[derive(serde::Deserialize, Debug, Clone, PartialEq)]
pub struct StatusReport {
	pub product_code: String,
	pub transaction_uuid: String,
	pub total_amount: f64,
	pub status: EsewaStatus,
	pub ref_id: Option<String>,
}

pub fn sign(secret: &str, message: &str) -> AppResult<String> {
	let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).map_err(|err| AppError::Internal(err.to_string()))?;
	mac.update(message.as_bytes());
	Ok(STANDARD.encode(mac.finalize().into_bytes()))
}

/// Builds `name=value,name=value` over `signed_field_names`, looking each
/// name up with `value_of`.
pub fn signing_message<F>(signed_field_names: &str, value_of: F) -> AppResult<String>
where
	F: Fn(&str) -> Option<String>,
{
	let mut pairs = Vec::new();
	for name in signed_field_names.split(',').map(str::trim).filter(|n| !n.is_empty()) {
		let value = value_of(name).ok_or_else(|| AppError::BadRequest(format!("signed field `{name}` is missing")))?;
		pairs.push(format!("{name}={value}"));
	}
	if pairs.is_empty() {
		return Err(AppError::BadRequest("no signed fields".to_string()));
	}
	Ok(pairs.join(","))
}

pub fn format_amount(amount: f64) -> String {
	format!("{amount:.2}")
}

/// Parses amounts as eSewa prints them, e.g. `"1,500.0"`.
pub fn parse_amount(value: &Value) -> Option<f64> {
	match value {
		Value::Number(n) => n.as_f64(),
		Value::String(s) => s.replace(',', "").trim().parse().ok(),
		_ => None,
	}
}

pub fn amounts_match(a: f64, b: f64) -> bool {
	(a - b).abs() <= AMOUNT_TOLERANCE
}

fn value_text(value: &Value) -> Option<String> {
	match value {
		Value::String(s) => Some(s.clone()),
		Value::Number(n) => Some(n.to_string()),
		Value::Bool(b) => Some(b.to_string()),
		_ => None,
	}
}

fn required_text(map: &Map<String, Value>, key: &str) -> AppResult<String> {
	map.get(key)
		.and_then(value_text)
		.ok_or_else(|| AppError::BadRequest(format!("callback field `{key}` is missing")))
}

#[derive(Clone)]
pub struct EsewaClient {
	http: reqwest::Client,
	merchant: Esewa,
}

impl EsewaClient {
	pub fn new(merchant: Esewa) -> Self {
		EsewaClient { http: reqwest::Client::new(), merchant }
	}

	pub fn product_code(&self) -> &str {
		&self.merchant.product_code
	}

	/// Signed form for `payment`. Tax and charges are zero; the rental
	/// price is the whole amount.
	pub fn form_for(&self, payment: &Payment) -> AppResult<PaymentForm> {
		let total_amount = format_amount(payment.amount);
		let message = format!(
			"total_amount={},transaction_uuid={},product_code={}",
			total_amount, payment.transaction_uuid, self.merchant.product_code
		);
		let signature = sign(&self.merchant.secret_key, &message)?;

		Ok(PaymentForm {
			action: self.merchant.form_url.clone(),
			fields: FormFields {
				amount: total_amount.clone(),
				tax_amount: "0".to_string(),
				total_amount,
				transaction_uuid: payment.transaction_uuid.clone(),
				product_code: self.merchant.product_code.clone(),
				product_service_charge: "0".to_string(),
				product_delivery_charge: "0".to_string(),
				success_url: self.merchant.success_url.clone(),
				failure_url: self.merchant.failure_url.clone(),
				signed_field_names: INITIATE_SIGNED_FIELDS.to_string(),
				signature,
			},
		})
	}

	/// Decodes the base64 `data` of a success redirect and checks its
	/// signature and merchant.
	pub fn verify_callback(&self, data: &str) -> AppResult<Callback> {
		// `+` turns into a space when the redirect query is not escaped
		let data = data.trim().replace(' ', "+");
		let raw = STANDARD
			.decode(data.as_bytes())
			.map_err(|err| AppError::BadRequest(format!("callback data is not base64: {err}")))?;
		let map: Map<String, Value> = serde_json::from_slice(&raw)
			.map_err(|err| AppError::BadRequest(format!("callback data is not a JSON object: {err}")))?;
		debug!("eSewa callback: {map:?}");

		let signed_field_names = required_text(&map, "signed_field_names")?;
		let signature = required_text(&map, "signature")?;
		let message = signing_message(&signed_field_names, |name| map.get(name).and_then(value_text))?;
		if sign(&self.merchant.secret_key, &message)? != signature {
			return Err(AppError::BadRequest("callback signature does not match".to_string()));
		}

		let product_code = required_text(&map, "product_code")?;
		if product_code != self.merchant.product_code {
			return Err(AppError::BadRequest(format!("callback is for merchant `{product_code}`")));
		}
		let total_amount = map
			.get("total_amount")
			.and_then(parse_amount)
			.ok_or_else(|| AppError::BadRequest("callback total_amount is invalid".to_string()))?;

		Ok(Callback {
			transaction_code: required_text(&map, "transaction_code")?,
			status: required_text(&map, "status")?.parse()?,
			total_amount,
			transaction_uuid: required_text(&map, "transaction_uuid")?,
			product_code,
		})
	}

	pub async fn check_status(&self, payment: &Payment) -> AppResult<StatusReport> {
		let total_amount = format_amount(payment.amount);
		let response = self
			.http
			.get(&self.merchant.status_url)
			.query(&[
				("product_code", self.merchant.product_code.as_str()),
				("total_amount", total_amount.as_str()),
				("transaction_uuid", payment.transaction_uuid.as_str()),
			])
			.send()
			.await
			.map_err(|err| AppError::Gateway(err.to_string()))?;

		if !response.status().is_success() {
			return Err(AppError::Gateway(format!("status API answered {}", response.status())));
		}
		response
			.json::<StatusReport>()
			.await
			.map_err(|err| AppError::Gateway(format!("unreadable status response: {err}")))
	}
}

#[cfg(test)]
mod tests {
	use chrono::Utc;
	use serde_json::json;
	use uuid::Uuid;

	use super::*;
	use crate::settings::Settings;

	fn client() -> EsewaClient {
		EsewaClient::new(Settings::for_tests("images").esewa)
	}

	fn encode_callback(client: &EsewaClient, mut body: Value) -> String {
		let names = "transaction_code,status,total_amount,transaction_uuid,product_code,signed_field_names";
		body["signed_field_names"] = json!(names);
		let message = signing_message(names, |name| body.get(name).and_then(value_text)).unwrap();
		body["signature"] = json!(sign(&client.merchant.secret_key, &message).unwrap());
		STANDARD.encode(body.to_string())
	}

	#[test]
	fn signature_matches_esewa_reference() {
		// Worked example from eSewa's developer guide.
		let signature = sign("8gBm/:&EnhH.1/q", "total_amount=110,transaction_uuid=241028,product_code=EPAYTEST").unwrap();
		assert_eq!(signature, "i94zsd3oXF6ZsSr/kGqT4sSzYQzjj1W/waxjWyRwaME=");
	}

	#[test]
	fn form_signs_total_uuid_and_product() {
		let client = client();
		let payment = Payment::esewa(Uuid::new_v4(), Uuid::new_v4(), 4500.0, Utc::now());
		let form = client.form_for(&payment).unwrap();

		assert_eq!(form.fields.total_amount, "4500.00");
		assert_eq!(form.fields.signed_field_names, INITIATE_SIGNED_FIELDS);
		let message = format!("total_amount=4500.00,transaction_uuid={},product_code=EPAYTEST", payment.transaction_uuid);
		assert_eq!(form.fields.signature, sign("8gBm/:&EnhH.1/q", &message).unwrap());
	}

	#[test]
	fn callback_round_trips_through_verification() {
		let client = client();
		let data = encode_callback(
			&client,
			json!({
				"transaction_code": "000AWEO",
				"status": "COMPLETE",
				"total_amount": "1,500.0",
				"transaction_uuid": "abc-123",
				"product_code": "EPAYTEST",
			}),
		);

		let callback = client.verify_callback(&data).unwrap();
		assert_eq!(callback.status, EsewaStatus::Complete);
		assert_eq!(callback.total_amount, 1500.0);
		assert_eq!(callback.transaction_code, "000AWEO");
	}

	#[test]
	fn tampered_callback_is_rejected() {
		let client = client();
		let data = encode_callback(
			&client,
			json!({
				"transaction_code": "000AWEO",
				"status": "COMPLETE",
				"total_amount": "10.0",
				"transaction_uuid": "abc-123",
				"product_code": "EPAYTEST",
			}),
		);
		let mut body: Value = serde_json::from_slice(&STANDARD.decode(&data).unwrap()).unwrap();
		body["total_amount"] = json!("1.0");
		let forged = STANDARD.encode(body.to_string());

		assert!(matches!(client.verify_callback(&forged), Err(AppError::BadRequest(_))));
	}

	#[test]
	fn garbage_is_not_a_callback() {
		assert!(client().verify_callback("%%%not-base64").is_err());
	}

	#[test]
	fn amounts_parse_with_thousands_separators() {
		assert_eq!(parse_amount(&json!("1,000.5")), Some(1000.5));
		assert_eq!(parse_amount(&json!(99)), Some(99.0));
		assert_eq!(parse_amount(&json!(null)), None);
		assert!(amounts_match(100.0, 100.004));
		assert!(!amounts_match(100.0, 100.5));
	}
}
