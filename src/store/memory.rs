use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{DashboardStats, Store};
use crate::{
	approval::ApprovalStatus,
	error::{AppError, AppResult},
	payment_gateway::{esewa::EsewaStatus, reconcile, Payment, Settled, Settlement, TransactionStatus},
	rentals::{availability, DateSpan, Rental, RentalFilter},
	terms::Terms,
	users::User,
	vehicles::{Vehicle, VehicleFilter},
	vendors::Vendor,
};

#[derive(Default)]
struct Tables {
	users: HashMap<Uuid, User>,
	vendors: HashMap<Uuid, Vendor>,
	vehicles: HashMap<Uuid, Vehicle>,
	rentals: HashMap<Uuid, Rental>,
	payments: HashMap<Uuid, Payment>,
	terms: Vec<Terms>,
}

impl Tables {
	fn is_listed(&self, vehicle: &Vehicle) -> bool {
		vehicle.approval_status == ApprovalStatus::Approved
			&& vehicle.available
			&& self.vendors.get(&vehicle.vendor_id).is_some_and(Vendor::is_approved)
	}
}

/// Everything in process memory behind one lock.
#[derive(Default)]
pub struct MemoryStore {
	tables: RwLock<Tables>,
}

impl MemoryStore {
	pub fn new() -> Self {
		Self::default()
	}
}

fn newest_first<T, F>(mut items: Vec<T>, created_at: F) -> Vec<T>
where
	F: Fn(&T) -> DateTime<Utc>,
{
	items.sort_by_key(|item| std::cmp::Reverse(created_at(item)));
	items
}

fn replace<T: Clone>(table: &mut HashMap<Uuid, T>, id: Uuid, value: &T, what: &str) -> AppResult<()> {
	match table.get_mut(&id) {
		Some(slot) => {
			*slot = value.clone();
			Ok(())
		}
		None => Err(AppError::not_found(what)),
	}
}

#[async_trait]
impl Store for MemoryStore {
	async fn insert_user(&self, user: &User) -> AppResult<()> {
		let mut tables = self.tables.write().await;
		if tables.users.values().any(|u| u.email == user.email) {
			return Err(AppError::Conflict("email is already registered".to_string()));
		}
		tables.users.insert(user.id, user.clone());
		Ok(())
	}

	async fn user_by_id(&self, id: Uuid) -> AppResult<Option<User>> {
		Ok(self.tables.read().await.users.get(&id).cloned())
	}

	async fn user_by_email(&self, email: &str) -> AppResult<Option<User>> {
		Ok(self.tables.read().await.users.values().find(|u| u.email == email).cloned())
	}

	async fn list_users(&self) -> AppResult<Vec<User>> {
		let users = self.tables.read().await.users.values().cloned().collect();
		Ok(newest_first(users, |u: &User| u.created_at))
	}

	async fn update_user(&self, user: &User) -> AppResult<()> {
		let mut tables = self.tables.write().await;
		if tables.users.values().any(|u| u.email == user.email && u.id != user.id) {
			return Err(AppError::Conflict("email is already registered".to_string()));
		}
		replace(&mut tables.users, user.id, user, "user")
	}

	async fn delete_user(&self, id: Uuid) -> AppResult<bool> {
		let mut tables = self.tables.write().await;
		if tables.users.remove(&id).is_none() {
			return Ok(false);
		}
		let vendor_ids: Vec<Uuid> = tables.vendors.values().filter(|v| v.user_id == id).map(|v| v.id).collect();
		for vendor_id in vendor_ids {
			tables.vendors.remove(&vendor_id);
			tables.vehicles.retain(|_, vehicle| vehicle.vendor_id != vendor_id);
		}
		Ok(true)
	}

	async fn insert_vendor(&self, vendor: &Vendor) -> AppResult<()> {
		let mut tables = self.tables.write().await;
		if tables.vendors.values().any(|v| v.user_id == vendor.user_id) {
			return Err(AppError::Conflict("user already has a vendor profile".to_string()));
		}
		tables.vendors.insert(vendor.id, vendor.clone());
		Ok(())
	}

	async fn vendor_by_id(&self, id: Uuid) -> AppResult<Option<Vendor>> {
		Ok(self.tables.read().await.vendors.get(&id).cloned())
	}

	async fn vendor_by_user(&self, user_id: Uuid) -> AppResult<Option<Vendor>> {
		Ok(self.tables.read().await.vendors.values().find(|v| v.user_id == user_id).cloned())
	}

	async fn list_vendors(&self, status: Option<ApprovalStatus>) -> AppResult<Vec<Vendor>> {
		let vendors = self
			.tables
			.read()
			.await
			.vendors
			.values()
			.filter(|v| status.map_or(true, |s| v.approval_status == s))
			.cloned()
			.collect();
		Ok(newest_first(vendors, |v: &Vendor| v.created_at))
	}

	async fn update_vendor(&self, vendor: &Vendor) -> AppResult<()> {
		replace(&mut self.tables.write().await.vendors, vendor.id, vendor, "vendor")
	}

	async fn insert_vehicle(&self, vehicle: &Vehicle) -> AppResult<()> {
		self.tables.write().await.vehicles.insert(vehicle.id, vehicle.clone());
		Ok(())
	}

	async fn vehicle_by_id(&self, id: Uuid) -> AppResult<Option<Vehicle>> {
		Ok(self.tables.read().await.vehicles.get(&id).cloned())
	}

	async fn list_vehicles(&self, filter: &VehicleFilter) -> AppResult<Vec<Vehicle>> {
		let tables = self.tables.read().await;
		let vehicles = tables
			.vehicles
			.values()
			.filter(|v| filter.vendor_id.map_or(true, |id| v.vendor_id == id))
			.filter(|v| filter.approval_status.map_or(true, |s| v.approval_status == s))
			.filter(|v| !filter.listed_only || tables.is_listed(v))
			.filter(|v| filter.matches(v))
			.cloned()
			.collect();
		Ok(newest_first(vehicles, |v: &Vehicle| v.created_at))
	}

	async fn update_vehicle(&self, vehicle: &Vehicle) -> AppResult<()> {
		replace(&mut self.tables.write().await.vehicles, vehicle.id, vehicle, "vehicle")
	}

	async fn delete_vehicle(&self, id: Uuid) -> AppResult<bool> {
		Ok(self.tables.write().await.vehicles.remove(&id).is_some())
	}

	async fn vehicle_is_listed(&self, id: Uuid) -> AppResult<bool> {
		let tables = self.tables.read().await;
		Ok(tables.vehicles.get(&id).is_some_and(|v| tables.is_listed(v)))
	}

	async fn book_rental(&self, rental: &Rental, now: DateTime<Utc>) -> AppResult<()> {
		let mut tables = self.tables.write().await;
		if !tables.vehicles.contains_key(&rental.vehicle_id) {
			return Err(AppError::not_found("vehicle"));
		}
		let existing: Vec<Rental> = tables.rentals.values().filter(|r| r.vehicle_id == rental.vehicle_id).cloned().collect();
		if !availability::conflicts(&existing, &rental.span(), now).is_empty() {
			return Err(AppError::Conflict("vehicle is already booked for those dates".to_string()));
		}
		tables.rentals.insert(rental.id, rental.clone());
		Ok(())
	}

	async fn rental_by_id(&self, id: Uuid) -> AppResult<Option<Rental>> {
		Ok(self.tables.read().await.rentals.get(&id).cloned())
	}

	async fn list_rentals(&self, filter: &RentalFilter) -> AppResult<Vec<Rental>> {
		let rentals = self
			.tables
			.read()
			.await
			.rentals
			.values()
			.filter(|r| filter.customer_id.map_or(true, |id| r.customer_id == id))
			.filter(|r| filter.vendor_id.map_or(true, |id| r.vendor_id == id))
			.filter(|r| filter.vehicle_id.map_or(true, |id| r.vehicle_id == id))
			.filter(|r| filter.status.map_or(true, |s| r.status == s))
			.cloned()
			.collect();
		Ok(newest_first(rentals, |r: &Rental| r.created_at))
	}

	async fn blocking_rentals(&self, vehicle_id: Uuid, span: DateSpan, now: DateTime<Utc>) -> AppResult<Vec<Rental>> {
		let tables = self.tables.read().await;
		let existing: Vec<Rental> = tables.rentals.values().filter(|r| r.vehicle_id == vehicle_id).cloned().collect();
		let mut blocking: Vec<Rental> = availability::conflicts(&existing, &span, now).into_iter().cloned().collect();
		blocking.sort_by_key(|r| r.start_date);
		Ok(blocking)
	}

	async fn update_rental(&self, rental: &Rental) -> AppResult<()> {
		replace(&mut self.tables.write().await.rentals, rental.id, rental, "rental")
	}

	async fn insert_payment(&self, payment: &Payment) -> AppResult<()> {
		let mut tables = self.tables.write().await;
		if tables.payments.values().any(|p| p.transaction_uuid == payment.transaction_uuid) {
			return Err(AppError::Conflict("duplicate transaction".to_string()));
		}
		tables.payments.insert(payment.id, payment.clone());
		Ok(())
	}

	async fn payment_by_id(&self, id: Uuid) -> AppResult<Option<Payment>> {
		Ok(self.tables.read().await.payments.get(&id).cloned())
	}

	async fn payment_by_transaction(&self, transaction_uuid: &str) -> AppResult<Option<Payment>> {
		Ok(self
			.tables
			.read()
			.await
			.payments
			.values()
			.find(|p| p.transaction_uuid == transaction_uuid)
			.cloned())
	}

	async fn list_payments(&self, user_id: Option<Uuid>) -> AppResult<Vec<Payment>> {
		let payments = self
			.tables
			.read()
			.await
			.payments
			.values()
			.filter(|p| user_id.map_or(true, |id| p.user_id == id))
			.cloned()
			.collect();
		Ok(newest_first(payments, |p: &Payment| p.created_at))
	}

	async fn update_payment(&self, payment: &Payment) -> AppResult<()> {
		replace(&mut self.tables.write().await.payments, payment.id, payment, "payment")
	}

	async fn settle_payment(
		&self,
		payment_id: Uuid,
		status: EsewaStatus,
		transaction_code: Option<String>,
		now: DateTime<Utc>,
	) -> AppResult<Settled> {
		let mut tables = self.tables.write().await;
		let mut payment = tables.payments.get(&payment_id).cloned().ok_or_else(|| AppError::not_found("payment"))?;
		let mut rental = tables.rentals.get(&payment.rental_id).cloned().ok_or_else(|| AppError::not_found("rental"))?;
		let others: Vec<Rental> = tables
			.rentals
			.values()
			.filter(|r| r.vehicle_id == rental.vehicle_id && r.id != rental.id)
			.cloned()
			.collect();
		let dates_taken = !availability::conflicts(&others, &rental.span(), now).is_empty();

		let settlement = reconcile(&mut payment, &mut rental, status, transaction_code, dates_taken, now)?;
		if settlement != Settlement::Unchanged {
			tables.payments.insert(payment.id, payment.clone());
			tables.rentals.insert(rental.id, rental.clone());
		}
		Ok(Settled { payment, rental, settlement })
	}

	async fn latest_terms(&self) -> AppResult<Option<Terms>> {
		Ok(self.tables.read().await.terms.last().cloned())
	}

	async fn save_terms(&self, content: &str, updated_by: Uuid, now: DateTime<Utc>) -> AppResult<Terms> {
		let mut tables = self.tables.write().await;
		let version = tables.terms.last().map_or(1, |t| t.version + 1);
		let terms = Terms { version, content: content.to_string(), updated_by, updated_at: now };
		tables.terms.push(terms.clone());
		Ok(terms)
	}

	async fn dashboard_stats(&self) -> AppResult<DashboardStats> {
		let tables = self.tables.read().await;
		let mut stats = DashboardStats { users: tables.users.len() as i64, ..Default::default() };
		for vendor in tables.vendors.values() {
			*stats.vendors.entry(vendor.approval_status.to_string()).or_default() += 1;
		}
		for vehicle in tables.vehicles.values() {
			*stats.vehicles.entry(vehicle.approval_status.to_string()).or_default() += 1;
		}
		for rental in tables.rentals.values() {
			*stats.rentals.entry(rental.status.to_string()).or_default() += 1;
		}
		stats.revenue = availability::round_money(
			tables
				.payments
				.values()
				.filter(|p| p.status == TransactionStatus::Complete)
				.map(|p| p.amount)
				.sum(),
		);
		Ok(stats)
	}
}

#[cfg(test)]
mod tests {
	use chrono::{Duration, NaiveDate};

	use super::*;
	use crate::rentals::{PaymentStatus, RentalStatus};

	fn rental(vehicle_id: Uuid, start: u32, end: u32, now: DateTime<Utc>) -> Rental {
		Rental {
			id: Uuid::new_v4(),
			vehicle_id,
			vendor_id: Uuid::new_v4(),
			customer_id: Uuid::new_v4(),
			start_date: NaiveDate::from_ymd_opt(2026, 12, start).unwrap(),
			end_date: NaiveDate::from_ymd_opt(2026, 12, end).unwrap(),
			days: (end - start) as i32,
			price_per_day: 100.0,
			total_price: 100.0 * (end - start) as f64,
			status: RentalStatus::Pending,
			payment_status: PaymentStatus::Unpaid,
			hold_expires_at: now + Duration::minutes(30),
			created_at: now,
			updated_at: now,
		}
	}

	async fn store_with_vehicle() -> (MemoryStore, Uuid) {
		let store = MemoryStore::new();
		let vehicle = crate::vehicles::tests::sample(Uuid::new_v4());
		let id = vehicle.id;
		store.insert_vehicle(&vehicle).await.unwrap();
		(store, id)
	}

	#[tokio::test]
	async fn overlapping_booking_is_refused() {
		let (store, vehicle_id) = store_with_vehicle().await;
		let now = Utc::now();
		store.book_rental(&rental(vehicle_id, 1, 5, now), now).await.unwrap();

		let err = store.book_rental(&rental(vehicle_id, 4, 6, now), now).await.unwrap_err();
		assert!(matches!(err, AppError::Conflict(_)));
		store.book_rental(&rental(vehicle_id, 5, 6, now), now).await.unwrap();
	}

	#[tokio::test]
	async fn expired_hold_frees_the_dates() {
		let (store, vehicle_id) = store_with_vehicle().await;
		let now = Utc::now();
		store.book_rental(&rental(vehicle_id, 1, 5, now), now).await.unwrap();

		let later = now + Duration::hours(1);
		store.book_rental(&rental(vehicle_id, 2, 3, later), later).await.unwrap();
	}

	#[tokio::test]
	async fn late_payment_loses_dates_booked_meanwhile() {
		let (store, vehicle_id) = store_with_vehicle().await;
		let now = Utc::now();
		let first = rental(vehicle_id, 1, 5, now);
		store.book_rental(&first, now).await.unwrap();
		let payment = Payment::esewa(first.id, first.customer_id, first.total_price, now);
		store.insert_payment(&payment).await.unwrap();

		let later = now + Duration::hours(1);
		store.book_rental(&rental(vehicle_id, 3, 4, later), later).await.unwrap();

		let settled = store.settle_payment(payment.id, EsewaStatus::Complete, None, later).await.unwrap();
		assert_eq!(settled.settlement, Settlement::Released);
		let stored = store.rental_by_id(first.id).await.unwrap().unwrap();
		assert_eq!(stored.status, RentalStatus::Cancelled);
		assert_eq!(stored.payment_status, PaymentStatus::Refunded);
		let stored = store.payment_by_id(payment.id).await.unwrap().unwrap();
		assert_eq!(stored.status, TransactionStatus::Refunded);
	}

	#[tokio::test]
	async fn settling_twice_writes_once() {
		let (store, vehicle_id) = store_with_vehicle().await;
		let now = Utc::now();
		let booked = rental(vehicle_id, 1, 5, now);
		store.book_rental(&booked, now).await.unwrap();
		let payment = Payment::esewa(booked.id, booked.customer_id, booked.total_price, now);
		store.insert_payment(&payment).await.unwrap();

		let code = Some("000AE01".to_string());
		let first = store.settle_payment(payment.id, EsewaStatus::Complete, code.clone(), now).await.unwrap();
		let second = store.settle_payment(payment.id, EsewaStatus::Complete, code, now).await.unwrap();
		assert_eq!(first.settlement, Settlement::Confirmed);
		assert_eq!(second.settlement, Settlement::Unchanged);
		assert_eq!(second.rental.status, RentalStatus::Confirmed);

		let err = store.settle_payment(Uuid::new_v4(), EsewaStatus::Complete, None, now).await.unwrap_err();
		assert!(matches!(err, AppError::NotFound(_)));
	}

	#[tokio::test]
	async fn terms_versions_increase() {
		let store = MemoryStore::new();
		let admin = Uuid::new_v4();
		assert!(store.latest_terms().await.unwrap().is_none());

		store.save_terms("<p>v1</p>", admin, Utc::now()).await.unwrap();
		let second = store.save_terms("<p>v2</p>", admin, Utc::now()).await.unwrap();
		assert_eq!(second.version, 2);
		assert_eq!(store.latest_terms().await.unwrap().unwrap().content, "<p>v2</p>");
	}
}
