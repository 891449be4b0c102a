//! Persistence.
//!
//! Handlers only see [`Store`]. [`PgStore`] is the production backend;
//! [`MemoryStore`] backs the tests and `database.url = "memory"`.
use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
	approval::ApprovalStatus,
	error::AppResult,
	payment_gateway::{esewa::EsewaStatus, Payment, Settled},
	rentals::{DateSpan, Rental, RentalFilter},
	terms::Terms,
	users::User,
	vehicles::{Vehicle, VehicleFilter},
	vendors::Vendor,
};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Row counts for the admin dashboard, keyed by status text.
#[derive(serde::Serialize, serde::Deserialize, Debug, Clone, Default, PartialEq)]
pub struct DashboardStats {
	pub users: i64,
	pub vendors: BTreeMap<String, i64>,
	pub vehicles: BTreeMap<String, i64>,
	pub rentals: BTreeMap<String, i64>,
	pub revenue: f64,
}

#[async_trait]
pub trait Store: Send + Sync {
	/// Fails with `Conflict` when the email is taken.
	async fn insert_user(&self, user: &User) -> AppResult<()>;
	async fn user_by_id(&self, id: Uuid) -> AppResult<Option<User>>;
	async fn user_by_email(&self, email: &str) -> AppResult<Option<User>>;
	/// Newest first.
	async fn list_users(&self) -> AppResult<Vec<User>>;
	async fn update_user(&self, user: &User) -> AppResult<()>;
	/// Also removes the user's vendor profile and its vehicles.
	async fn delete_user(&self, id: Uuid) -> AppResult<bool>;

	async fn insert_vendor(&self, vendor: &Vendor) -> AppResult<()>;
	async fn vendor_by_id(&self, id: Uuid) -> AppResult<Option<Vendor>>;
	async fn vendor_by_user(&self, user_id: Uuid) -> AppResult<Option<Vendor>>;
	async fn list_vendors(&self, status: Option<ApprovalStatus>) -> AppResult<Vec<Vendor>>;
	async fn update_vendor(&self, vendor: &Vendor) -> AppResult<()>;

	async fn insert_vehicle(&self, vehicle: &Vehicle) -> AppResult<()>;
	async fn vehicle_by_id(&self, id: Uuid) -> AppResult<Option<Vehicle>>;
	/// Newest first.
	async fn list_vehicles(&self, filter: &VehicleFilter) -> AppResult<Vec<Vehicle>>;
	async fn update_vehicle(&self, vehicle: &Vehicle) -> AppResult<()>;
	async fn delete_vehicle(&self, id: Uuid) -> AppResult<bool>;
	/// Whether the vehicle is visible in the public catalogue.
	async fn vehicle_is_listed(&self, id: Uuid) -> AppResult<bool>;

	/// Inserts `rental` unless another rental blocks its dates at `now`,
	/// in which case it fails with `Conflict`. Check and insert are atomic.
	async fn book_rental(&self, rental: &Rental, now: DateTime<Utc>) -> AppResult<()>;
	async fn rental_by_id(&self, id: Uuid) -> AppResult<Option<Rental>>;
	/// Newest first.
	async fn list_rentals(&self, filter: &RentalFilter) -> AppResult<Vec<Rental>>;
	/// Rentals of `vehicle_id` blocking any day of `span` at `now`.
	async fn blocking_rentals(&self, vehicle_id: Uuid, span: DateSpan, now: DateTime<Utc>) -> AppResult<Vec<Rental>>;
	async fn update_rental(&self, rental: &Rental) -> AppResult<()>;

	async fn insert_payment(&self, payment: &Payment) -> AppResult<()>;
	async fn payment_by_id(&self, id: Uuid) -> AppResult<Option<Payment>>;
	async fn payment_by_transaction(&self, transaction_uuid: &str) -> AppResult<Option<Payment>>;
	/// Newest first, optionally only those made by `user_id`.
	async fn list_payments(&self, user_id: Option<Uuid>) -> AppResult<Vec<Payment>>;
	async fn update_payment(&self, payment: &Payment) -> AppResult<()>;
	/// Applies a gateway `status` to the payment and its rental through
	/// [`reconcile`](crate::payment_gateway::reconcile). Reading, the
	/// conflict check against the rental's dates and writing both rows happen
	/// under the same lock that [`book_rental`](Store::book_rental) takes.
	async fn settle_payment(
		&self,
		payment_id: Uuid,
		status: EsewaStatus,
		transaction_code: Option<String>,
		now: DateTime<Utc>,
	) -> AppResult<Settled>;

	async fn latest_terms(&self) -> AppResult<Option<Terms>>;
	/// Stores `content` as the next version.
	async fn save_terms(&self, content: &str, updated_by: Uuid, now: DateTime<Utc>) -> AppResult<Terms>;

	async fn dashboard_stats(&self) -> AppResult<DashboardStats>;
}
