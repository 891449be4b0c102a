#![allow(dead_code)]

use std::sync::Arc;

use axum::{
	body::Body,
	http::{header, Method, Request, StatusCode},
	Router,
};
use chrono::{Duration, NaiveDate, Utc};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;
use wheelify_server::{routes, settings::Settings, state::AppState, store::MemoryStore};

pub const ADMIN_EMAIL: &str = "admin@wheelify.test";
pub const ADMIN_PASSWORD: &str = "admin-password";

pub struct TestApp {
	pub router: Router,
	pub state: AppState,
}

pub async fn spawn() -> TestApp {
	spawn_with(|_| {}).await
}

/// Like [`spawn`], with `tweak` applied to the settings first.
pub async fn spawn_with(tweak: impl FnOnce(&mut Settings)) -> TestApp {
	let upload_dir = std::env::temp_dir().join(format!("wheelify-test-{}", Uuid::new_v4()));
	let mut settings = Settings::for_tests(&upload_dir.to_string_lossy());
	settings.auth.admin_email = Some(ADMIN_EMAIL.to_string());
	settings.auth.admin_password = Some(ADMIN_PASSWORD.to_string());
	tweak(&mut settings);

	let state = AppState::new(Arc::new(MemoryStore::new()), settings);
	state.seed_admin().await.unwrap();
	TestApp { router: routes::app(state.clone()), state }
}

pub fn day(offset: i64) -> NaiveDate {
	Utc::now().date_naive() + Duration::days(offset)
}

impl TestApp {
	pub async fn request(&self, request: Request<Body>) -> (StatusCode, Value) {
		let response = self.router.clone().oneshot(request).await.unwrap();
		let status = response.status();
		let bytes = response.into_body().collect().await.unwrap().to_bytes();
		let body = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap() };
		(status, body)
	}

	pub async fn send(&self, method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
		let mut builder = Request::builder().method(method).uri(uri);
		if let Some(token) = token {
			builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
		}
		let request = match body {
			Some(body) => builder
				.header(header::CONTENT_TYPE, "application/json")
				.body(Body::from(body.to_string()))
				.unwrap(),
			None => builder.body(Body::empty()).unwrap(),
		};
		self.request(request).await
	}

	pub async fn get(&self, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
		self.send(Method::GET, uri, token, None).await
	}

	pub async fn post(&self, uri: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
		self.send(Method::POST, uri, token, Some(body)).await
	}

	pub async fn put(&self, uri: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
		self.send(Method::PUT, uri, token, Some(body)).await
	}

	/// Registers a customer and returns their token.
	pub async fn register(&self, name: &str, email: &str) -> String {
		let (status, body) = self
			.post(
				"/auth/register",
				None,
				json!({ "name": name, "email": email, "phone": "9800000000", "password": "password123" }),
			)
			.await;
		assert_eq!(status, StatusCode::CREATED, "{body}");
		body["token"].as_str().unwrap().to_string()
	}

	pub async fn admin_token(&self) -> String {
		let (status, body) =
			self.post("/auth/login", None, json!({ "email": ADMIN_EMAIL, "password": ADMIN_PASSWORD })).await;
		assert_eq!(status, StatusCode::OK, "{body}");
		body["token"].as_str().unwrap().to_string()
	}

	/// A registered user whose vendor application has been approved.
	pub async fn approved_vendor(&self, email: &str) -> String {
		let token = self.register("Sita Rentals", email).await;
		let (status, vendor) = self
			.post(
				"/vendors/apply",
				Some(&token),
				json!({ "business_name": "Sita Rentals", "phone": "9811111111", "address": "Lalitpur" }),
			)
			.await;
		assert_eq!(status, StatusCode::CREATED, "{vendor}");

		let admin = self.admin_token().await;
		let uri = format!("/vendors/{}/approval", vendor["id"].as_str().unwrap());
		let (status, body) = self.put(&uri, Some(&admin), json!({ "status": "approved" })).await;
		assert_eq!(status, StatusCode::OK, "{body}");
		token
	}

	/// A vehicle created by `vendor` and approved by the admin; returns its id.
	pub async fn listed_vehicle(&self, vendor: &str) -> String {
		let (status, vehicle) = self
			.post(
				"/vehicles",
				Some(vendor),
				json!({
					"name": "Hyundai Creta",
					"brand": "Hyundai",
					"model": "Creta",
					"vehicle_type": "suv",
					"year": 2021,
					"seats": 5,
					"location": "Kathmandu",
					"price_per_day": 6500.0
				}),
			)
			.await;
		assert_eq!(status, StatusCode::CREATED, "{vehicle}");
		let id = vehicle["id"].as_str().unwrap().to_string();

		let admin = self.admin_token().await;
		let (status, body) = self.put(&format!("/vehicles/{id}/approval"), Some(&admin), json!({ "status": "approved" })).await;
		assert_eq!(status, StatusCode::OK, "{body}");
		id
	}

	pub async fn book(&self, token: &str, vehicle_id: &str, start: i64, end: i64) -> (StatusCode, Value) {
		self.post(
			"/rentals",
			Some(token),
			json!({ "vehicle_id": vehicle_id, "start_date": day(start), "end_date": day(end) }),
		)
		.await
	}
}
