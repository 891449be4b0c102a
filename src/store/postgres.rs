use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::info;
use postgres_from_row::FromRow;
use tokio_postgres::{error::SqlState, Row};
use uuid::Uuid;

use super::{DashboardStats, Store};
use crate::{
	approval::ApprovalStatus,
	db_client::DbClient,
	error::{AppError, AppResult},
	payment_gateway::{esewa::EsewaStatus, reconcile, Payment, Settled, Settlement},
	rentals::{availability, DateSpan, Rental, RentalFilter},
	terms::Terms,
	users::User,
	vehicles::{Vehicle, VehicleFilter},
	vendors::Vendor,
};

const SCHEMA: &str = include_str!("schema.sql");

/// Rentals holding their dates at `$4`. Expects `$1` vehicle, `$2`/`$3` span.
const BLOCKING_RENTALS: &str = "SELECT * FROM rentals
	WHERE vehicle_id = $1 AND start_date < $3 AND $2 < end_date
	AND (status IN ('confirmed', 'active') OR (status = 'pending' AND hold_expires_at > $4))
	ORDER BY start_date";

const INSERT_RENTAL: &str = "INSERT INTO rentals
	(id, vehicle_id, vendor_id, customer_id, start_date, end_date, days, price_per_day, total_price,
	 status, payment_status, hold_expires_at, created_at, updated_at)
	VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)";

const UPDATE_RENTAL: &str =
	"UPDATE rentals SET status = $2, payment_status = $3, hold_expires_at = $4, updated_at = $5 WHERE id = $1";

const UPDATE_PAYMENT: &str = "UPDATE payments SET transaction_code = $2, status = $3, updated_at = $4 WHERE id = $1";

pub struct PgStore {
	db: DbClient,
}

impl PgStore {
	pub async fn connect(config: &str) -> Result<Self, tokio_postgres::Error> {
		Ok(PgStore { db: DbClient::connect(config).await? })
	}

	/// Creates missing tables and indexes.
	pub async fn migrate(&self) -> Result<(), tokio_postgres::Error> {
		self.db.batch_execute(SCHEMA).await?;
		info!("database schema is up to date");
		Ok(())
	}

	async fn counts(&self, statement: &str) -> AppResult<BTreeMap<String, i64>> {
		let rows = self.db.query(statement, &[]).await?;
		let mut counts = BTreeMap::new();
		for row in rows {
			counts.insert(row.try_get::<_, String>(0)?, row.try_get::<_, i64>(1)?);
		}
		Ok(counts)
	}
}

fn rows_to<T: FromRow>(rows: &[Row]) -> AppResult<Vec<T>> {
	Ok(rows.iter().map(T::try_from_row).collect::<Result<Vec<_>, _>>()?)
}

fn row_to<T: FromRow>(row: Option<Row>) -> AppResult<Option<T>> {
	Ok(row.as_ref().map(T::try_from_row).transpose()?)
}

/// Constraint violations become client errors; anything else stays a
/// database error.
fn constraint(err: tokio_postgres::Error, message: &str) -> AppError {
	match err.code() {
		Some(code) if *code == SqlState::UNIQUE_VIOLATION || *code == SqlState::FOREIGN_KEY_VIOLATION => {
			AppError::Conflict(message.to_string())
		}
		_ => AppError::Database(err),
	}
}

fn expect_one(updated: u64, what: &str) -> AppResult<()> {
	if updated == 0 {
		return Err(AppError::not_found(what));
	}
	Ok(())
}

#[async_trait]
impl Store for PgStore {
	async fn insert_user(&self, user: &User) -> AppResult<()> {
		self.db
			.execute(
				"INSERT INTO users (id, name, email, phone, password_hash, role, created_at, updated_at)
				VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
				&[&user.id, &user.name, &user.email, &user.phone, &user.password_hash, &user.role, &user.created_at, &user.updated_at],
			)
			.await
			.map_err(|e| constraint(e, "email is already registered"))?;
		Ok(())
	}

	async fn user_by_id(&self, id: Uuid) -> AppResult<Option<User>> {
		row_to(self.db.query_opt("SELECT * FROM users WHERE id = $1", &[&id]).await?)
	}

	async fn user_by_email(&self, email: &str) -> AppResult<Option<User>> {
		row_to(self.db.query_opt("SELECT * FROM users WHERE email = $1", &[&email]).await?)
	}

	async fn list_users(&self) -> AppResult<Vec<User>> {
		rows_to(&self.db.query("SELECT * FROM users ORDER BY created_at DESC", &[]).await?)
	}

	async fn update_user(&self, user: &User) -> AppResult<()> {
		let updated = self
			.db
			.execute(
				"UPDATE users SET name = $2, email = $3, phone = $4, password_hash = $5, role = $6, updated_at = $7
				WHERE id = $1",
				&[&user.id, &user.name, &user.email, &user.phone, &user.password_hash, &user.role, &user.updated_at],
			)
			.await
			.map_err(|e| constraint(e, "email is already registered"))?;
		expect_one(updated, "user")
	}

	async fn delete_user(&self, id: Uuid) -> AppResult<bool> {
		let deleted = self
			.db
			.execute("DELETE FROM users WHERE id = $1", &[&id])
			.await
			.map_err(|e| constraint(e, "user still has rentals or payments"))?;
		Ok(deleted > 0)
	}

	async fn insert_vendor(&self, vendor: &Vendor) -> AppResult<()> {
		self.db
			.execute(
				"INSERT INTO vendors (id, user_id, business_name, phone, address, pan_number, description,
				 approval_status, rejection_reason, created_at, updated_at)
				VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)",
				&[
					&vendor.id,
					&vendor.user_id,
					&vendor.business_name,
					&vendor.phone,
					&vendor.address,
					&vendor.pan_number,
					&vendor.description,
					&vendor.approval_status,
					&vendor.rejection_reason,
					&vendor.created_at,
					&vendor.updated_at,
				],
			)
			.await
			.map_err(|e| constraint(e, "user already has a vendor profile"))?;
		Ok(())
	}

	async fn vendor_by_id(&self, id: Uuid) -> AppResult<Option<Vendor>> {
		row_to(self.db.query_opt("SELECT * FROM vendors WHERE id = $1", &[&id]).await?)
	}

	async fn vendor_by_user(&self, user_id: Uuid) -> AppResult<Option<Vendor>> {
		row_to(self.db.query_opt("SELECT * FROM vendors WHERE user_id = $1", &[&user_id]).await?)
	}

	async fn list_vendors(&self, status: Option<ApprovalStatus>) -> AppResult<Vec<Vendor>> {
		let rows = self
			.db
			.query(
				"SELECT * FROM vendors WHERE ($1::text IS NULL OR approval_status = $1) ORDER BY created_at DESC",
				&[&status],
			)
			.await?;
		rows_to(&rows)
	}

	async fn update_vendor(&self, vendor: &Vendor) -> AppResult<()> {
		let updated = self
			.db
			.execute(
				"UPDATE vendors SET business_name = $2, phone = $3, address = $4, pan_number = $5, description = $6,
				 approval_status = $7, rejection_reason = $8, updated_at = $9
				WHERE id = $1",
				&[
					&vendor.id,
					&vendor.business_name,
					&vendor.phone,
					&vendor.address,
					&vendor.pan_number,
					&vendor.description,
					&vendor.approval_status,
					&vendor.rejection_reason,
					&vendor.updated_at,
				],
			)
			.await?;
		expect_one(updated, "vendor")
	}

	async fn insert_vehicle(&self, v: &Vehicle) -> AppResult<()> {
		self.db
			.execute(
				"INSERT INTO vehicles (id, vendor_id, name, brand, model, vehicle_type, year, seats, fuel_type,
				 transmission, location, description, price_per_day, images, approval_status, rejection_reason,
				 available, created_at, updated_at)
				VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19)",
				&[
					&v.id,
					&v.vendor_id,
					&v.name,
					&v.brand,
					&v.model,
					&v.vehicle_type,
					&v.year,
					&v.seats,
					&v.fuel_type,
					&v.transmission,
					&v.location,
					&v.description,
					&v.price_per_day,
					&v.images,
					&v.approval_status,
					&v.rejection_reason,
					&v.available,
					&v.created_at,
					&v.updated_at,
				],
			)
			.await?;
		Ok(())
	}

	async fn vehicle_by_id(&self, id: Uuid) -> AppResult<Option<Vehicle>> {
		row_to(self.db.query_opt("SELECT * FROM vehicles WHERE id = $1", &[&id]).await?)
	}

	async fn list_vehicles(&self, filter: &VehicleFilter) -> AppResult<Vec<Vehicle>> {
		let rows = self
			.db
			.query(
				"SELECT v.* FROM vehicles v JOIN vendors d ON d.id = v.vendor_id
				WHERE ($1::uuid IS NULL OR v.vendor_id = $1)
				AND ($2::text IS NULL OR v.approval_status = $2)
				AND (NOT $3 OR (v.approval_status = 'approved' AND v.available AND d.approval_status = 'approved'))
				ORDER BY v.created_at DESC",
				&[&filter.vendor_id, &filter.approval_status, &filter.listed_only],
			)
			.await?;
		let vehicles: Vec<Vehicle> = rows_to(&rows)?;
		Ok(vehicles.into_iter().filter(|v| filter.matches(v)).collect())
	}

	async fn update_vehicle(&self, v: &Vehicle) -> AppResult<()> {
		let updated = self
			.db
			.execute(
				"UPDATE vehicles SET name = $2, brand = $3, model = $4, vehicle_type = $5, year = $6, seats = $7,
				 fuel_type = $8, transmission = $9, location = $10, description = $11, price_per_day = $12,
				 images = $13, approval_status = $14, rejection_reason = $15, available = $16, updated_at = $17
				WHERE id = $1",
				&[
					&v.id,
					&v.name,
					&v.brand,
					&v.model,
					&v.vehicle_type,
					&v.year,
					&v.seats,
					&v.fuel_type,
					&v.transmission,
					&v.location,
					&v.description,
					&v.price_per_day,
					&v.images,
					&v.approval_status,
					&v.rejection_reason,
					&v.available,
					&v.updated_at,
				],
			)
			.await?;
		expect_one(updated, "vehicle")
	}

	async fn delete_vehicle(&self, id: Uuid) -> AppResult<bool> {
		let deleted = self
			.db
			.execute("DELETE FROM vehicles WHERE id = $1", &[&id])
			.await
			.map_err(|e| constraint(e, "vehicle has rental history"))?;
		Ok(deleted > 0)
	}

	async fn vehicle_is_listed(&self, id: Uuid) -> AppResult<bool> {
		let row = self
			.db
			.query_opt(
				"SELECT 1 FROM vehicles v JOIN vendors d ON d.id = v.vendor_id
				WHERE v.id = $1 AND v.approval_status = 'approved' AND v.available AND d.approval_status = 'approved'",
				&[&id],
			)
			.await?;
		Ok(row.is_some())
	}

	async fn book_rental(&self, r: &Rental, now: DateTime<Utc>) -> AppResult<()> {
		let mut writer = self.db.writer().await;
		let tx = writer.transaction().await?;

		// held until commit, so concurrent bookings of this vehicle queue here
		if tx.query_opt("SELECT id FROM vehicles WHERE id = $1 FOR UPDATE", &[&r.vehicle_id]).await?.is_none() {
			return Err(AppError::not_found("vehicle"));
		}
		let clashes = tx.query(BLOCKING_RENTALS, &[&r.vehicle_id, &r.start_date, &r.end_date, &now]).await?;
		if !clashes.is_empty() {
			return Err(AppError::Conflict("vehicle is already booked for those dates".to_string()));
		}

		tx.execute(
			INSERT_RENTAL,
			&[
				&r.id,
				&r.vehicle_id,
				&r.vendor_id,
				&r.customer_id,
				&r.start_date,
				&r.end_date,
				&r.days,
				&r.price_per_day,
				&r.total_price,
				&r.status,
				&r.payment_status,
				&r.hold_expires_at,
				&r.created_at,
				&r.updated_at,
			],
		)
		.await?;
		tx.commit().await?;
		Ok(())
	}

	async fn rental_by_id(&self, id: Uuid) -> AppResult<Option<Rental>> {
		row_to(self.db.query_opt("SELECT * FROM rentals WHERE id = $1", &[&id]).await?)
	}

	async fn list_rentals(&self, filter: &RentalFilter) -> AppResult<Vec<Rental>> {
		let rows = self
			.db
			.query(
				"SELECT * FROM rentals
				WHERE ($1::uuid IS NULL OR customer_id = $1)
				AND ($2::uuid IS NULL OR vendor_id = $2)
				AND ($3::uuid IS NULL OR vehicle_id = $3)
				AND ($4::text IS NULL OR status = $4)
				ORDER BY created_at DESC",
				&[&filter.customer_id, &filter.vendor_id, &filter.vehicle_id, &filter.status],
			)
			.await?;
		rows_to(&rows)
	}

	async fn blocking_rentals(&self, vehicle_id: Uuid, span: DateSpan, now: DateTime<Utc>) -> AppResult<Vec<Rental>> {
		let rows = self.db.query(BLOCKING_RENTALS, &[&vehicle_id, &span.start, &span.end, &now]).await?;
		rows_to(&rows)
	}

	async fn update_rental(&self, r: &Rental) -> AppResult<()> {
		let updated = self
			.db
			.execute(UPDATE_RENTAL, &[&r.id, &r.status, &r.payment_status, &r.hold_expires_at, &r.updated_at])
			.await?;
		expect_one(updated, "rental")
	}

	async fn insert_payment(&self, p: &Payment) -> AppResult<()> {
		self.db
			.execute(
				"INSERT INTO payments (id, rental_id, user_id, amount, provider, transaction_uuid, transaction_code,
				 status, created_at, updated_at)
				VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
				&[
					&p.id,
					&p.rental_id,
					&p.user_id,
					&p.amount,
					&p.provider,
					&p.transaction_uuid,
					&p.transaction_code,
					&p.status,
					&p.created_at,
					&p.updated_at,
				],
			)
			.await
			.map_err(|e| constraint(e, "duplicate transaction"))?;
		Ok(())
	}

	async fn payment_by_id(&self, id: Uuid) -> AppResult<Option<Payment>> {
		row_to(self.db.query_opt("SELECT * FROM payments WHERE id = $1", &[&id]).await?)
	}

	async fn payment_by_transaction(&self, transaction_uuid: &str) -> AppResult<Option<Payment>> {
		row_to(
			self.db
				.query_opt("SELECT * FROM payments WHERE transaction_uuid = $1", &[&transaction_uuid])
				.await?,
		)
	}

	async fn list_payments(&self, user_id: Option<Uuid>) -> AppResult<Vec<Payment>> {
		let rows = self
			.db
			.query(
				"SELECT * FROM payments WHERE ($1::uuid IS NULL OR user_id = $1) ORDER BY created_at DESC",
				&[&user_id],
			)
			.await?;
		rows_to(&rows)
	}

	async fn update_payment(&self, p: &Payment) -> AppResult<()> {
		let updated = self
			.db
			.execute(UPDATE_PAYMENT, &[&p.id, &p.transaction_code, &p.status, &p.updated_at])
			.await?;
		expect_one(updated, "payment")
	}

	async fn settle_payment(
		&self,
		payment_id: Uuid,
		status: EsewaStatus,
		transaction_code: Option<String>,
		now: DateTime<Utc>,
	) -> AppResult<Settled> {
		let mut writer = self.db.writer().await;
		let tx = writer.transaction().await?;

		let vehicle_id: Uuid = tx
			.query_opt(
				"SELECT r.vehicle_id FROM payments p JOIN rentals r ON r.id = p.rental_id WHERE p.id = $1",
				&[&payment_id],
			)
			.await?
			.ok_or_else(|| AppError::not_found("payment"))?
			.try_get(0)?;
		// same lock as book_rental, taken before the rows it guards
		tx.query_opt("SELECT id FROM vehicles WHERE id = $1 FOR UPDATE", &[&vehicle_id]).await?;

		let mut payment: Payment = row_to(tx.query_opt("SELECT * FROM payments WHERE id = $1 FOR UPDATE", &[&payment_id]).await?)?
			.ok_or_else(|| AppError::not_found("payment"))?;
		let mut rental: Rental =
			row_to(tx.query_opt("SELECT * FROM rentals WHERE id = $1 FOR UPDATE", &[&payment.rental_id]).await?)?
				.ok_or_else(|| AppError::not_found("rental"))?;
		let clashes: Vec<Rental> =
			rows_to(&tx.query(BLOCKING_RENTALS, &[&rental.vehicle_id, &rental.start_date, &rental.end_date, &now]).await?)?;
		let dates_taken = clashes.iter().any(|r| r.id != rental.id);

		let settlement = reconcile(&mut payment, &mut rental, status, transaction_code, dates_taken, now)?;
		if settlement != Settlement::Unchanged {
			tx.execute(UPDATE_PAYMENT, &[&payment.id, &payment.transaction_code, &payment.status, &payment.updated_at])
				.await?;
			tx.execute(
				UPDATE_RENTAL,
				&[&rental.id, &rental.status, &rental.payment_status, &rental.hold_expires_at, &rental.updated_at],
			)
			.await?;
		}
		tx.commit().await?;
		Ok(Settled { payment, rental, settlement })
	}

	async fn latest_terms(&self) -> AppResult<Option<Terms>> {
		row_to(self.db.query_opt("SELECT * FROM terms ORDER BY version DESC LIMIT 1", &[]).await?)
	}

	async fn save_terms(&self, content: &str, updated_by: Uuid, now: DateTime<Utc>) -> AppResult<Terms> {
		let row = self
			.db
			.query_one(
				"INSERT INTO terms (version, content, updated_by, updated_at)
				SELECT COALESCE(MAX(version), 0) + 1, $1, $2, $3 FROM terms
				RETURNING *",
				&[&content, &updated_by, &now],
			)
			.await
			.map_err(|e| constraint(e, "terms were updated concurrently, retry"))?;
		Ok(Terms::try_from_row(&row)?)
	}

	async fn dashboard_stats(&self) -> AppResult<DashboardStats> {
		let users: i64 = self.db.query_one("SELECT COUNT(*) FROM users", &[]).await?.try_get(0)?;
		let revenue: f64 = self
			.db
			.query_one("SELECT COALESCE(SUM(amount), 0)::float8 FROM payments WHERE status = 'complete'", &[])
			.await?
			.try_get(0)?;

		Ok(DashboardStats {
			users,
			vendors: self.counts("SELECT approval_status, COUNT(*) FROM vendors GROUP BY approval_status").await?,
			vehicles: self.counts("SELECT approval_status, COUNT(*) FROM vehicles GROUP BY approval_status").await?,
			rentals: self.counts("SELECT status, COUNT(*) FROM rentals GROUP BY status").await?,
			revenue: availability::round_money(revenue),
		})
	}
}
