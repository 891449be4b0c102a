use axum::{
	extract::{Path, Query, State},
	Json,
};
use chrono::{NaiveDate, Utc};
use hyper::StatusCode;
use log::info;
use uuid::Uuid;

use super::{availability, DateSpan, PaymentStatus, Rental, RentalFilter, RentalStatus};
use crate::{
	auth::AuthUser,
	error::{AppError, AppResult},
	payment_gateway::TransactionStatus,
	state::AppState,
	users::Role,
	vehicles::Vehicle,
};

#[derive(serde::Deserialize, Debug)]
pub struct AvailabilityQuery {
	pub vehicle_id: Uuid,
	pub start_date: NaiveDate,
	pub end_date: NaiveDate,
}

#[derive(serde::Serialize, serde::Deserialize, Debug, PartialEq)]
pub struct Availability {
	pub available: bool,
	pub days: i64,
	pub total_price: f64,
	pub conflicts: Vec<DateSpan>,
}

#[derive(serde::Deserialize, Debug)]
pub struct Booking {
	pub vehicle_id: Uuid,
	pub start_date: NaiveDate,
	pub end_date: NaiveDate,
}

#[derive(serde::Deserialize, Debug)]
pub struct StatusChange {
	pub status: RentalStatus,
}

/// A vehicle in the public catalogue.
async fn listed_vehicle(state: &AppState, id: Uuid) -> AppResult<Vehicle> {
	if !state.store.vehicle_is_listed(id).await? {
		return Err(AppError::not_found("vehicle"));
	}
	state.store.vehicle_by_id(id).await?.ok_or_else(|| AppError::not_found("vehicle"))
}

async fn vendor_id_of(state: &AppState, user: &AuthUser) -> AppResult<Option<Uuid>> {
	Ok(state.store.vendor_by_user(user.id()).await?.map(|v| v.id))
}

pub async fn check_availability(
	State(state): State<AppState>,
	Query(query): Query<AvailabilityQuery>,
) -> AppResult<Json<Availability>> {
	let span = DateSpan::new(query.start_date, query.end_date)?;
	let vehicle = listed_vehicle(&state, query.vehicle_id).await?;
	let blocking = state.store.blocking_rentals(vehicle.id, span, Utc::now()).await?;

	Ok(Json(Availability {
		available: blocking.is_empty(),
		days: span.days(),
		total_price: availability::total_price(&span, vehicle.price_per_day),
		conflicts: blocking.iter().map(Rental::span).collect(),
	}))
}

pub async fn create(
	State(state): State<AppState>,
	user: AuthUser,
	Json(booking): Json<Booking>,
) -> AppResult<(StatusCode, Json<Rental>)> {
	user.require(&[Role::Customer, Role::Vendor])?;
	let span = DateSpan::new(booking.start_date, booking.end_date)?;
	let now = Utc::now();
	if span.start < now.date_naive() {
		return Err(AppError::BadRequest("start_date is in the past".to_string()));
	}

	let vehicle = listed_vehicle(&state, booking.vehicle_id).await?;
	if vendor_id_of(&state, &user).await? == Some(vehicle.vendor_id) {
		return Err(AppError::forbidden("vendors cannot rent their own vehicles"));
	}

	let rental = Rental {
		id: Uuid::new_v4(),
		vehicle_id: vehicle.id,
		vendor_id: vehicle.vendor_id,
		customer_id: user.id(),
		start_date: span.start,
		end_date: span.end,
		days: span.days() as i32,
		price_per_day: vehicle.price_per_day,
		total_price: availability::total_price(&span, vehicle.price_per_day),
		status: RentalStatus::Pending,
		payment_status: PaymentStatus::Unpaid,
		hold_expires_at: now + state.hold_duration(),
		created_at: now,
		updated_at: now,
	};
	state.store.book_rental(&rental, now).await?;

	info!(
		"user {} booked vehicle {} from {} to {} ({})",
		user.id(),
		vehicle.id,
		rental.start_date,
		rental.end_date,
		rental.id
	);
	Ok((StatusCode::CREATED, Json(rental)))
}

pub async fn mine(State(state): State<AppState>, user: AuthUser) -> AppResult<Json<Vec<Rental>>> {
	let filter = RentalFilter { customer_id: Some(user.id()), ..Default::default() };
	Ok(Json(state.store.list_rentals(&filter).await?))
}

pub async fn for_vendor(
	State(state): State<AppState>,
	user: AuthUser,
	Query(mut filter): Query<RentalFilter>,
) -> AppResult<Json<Vec<Rental>>> {
	user.require(&[Role::Vendor])?;
	let Some(vendor_id) = vendor_id_of(&state, &user).await? else {
		return Ok(Json(Vec::new()));
	};
	filter.vendor_id = Some(vendor_id);
	Ok(Json(state.store.list_rentals(&filter).await?))
}

pub async fn list_all(
	State(state): State<AppState>,
	user: AuthUser,
	Query(filter): Query<RentalFilter>,
) -> AppResult<Json<Vec<Rental>>> {
	user.require(&[Role::Admin])?;
	Ok(Json(state.store.list_rentals(&filter).await?))
}

pub async fn get_rental(State(state): State<AppState>, user: AuthUser, Path(id): Path<Uuid>) -> AppResult<Json<Rental>> {
	let rental = state.store.rental_by_id(id).await?.ok_or_else(|| AppError::not_found("rental"))?;
	let allowed = user.is_admin()
		|| rental.customer_id == user.id()
		|| vendor_id_of(&state, &user).await? == Some(rental.vendor_id);
	if !allowed {
		return Err(AppError::forbidden("not your rental"));
	}
	Ok(Json(rental))
}

pub async fn update_status(
	State(state): State<AppState>,
	user: AuthUser,
	Path(id): Path<Uuid>,
	Json(change): Json<StatusChange>,
) -> AppResult<Json<Rental>> {
	let mut rental = state.store.rental_by_id(id).await?.ok_or_else(|| AppError::not_found("rental"))?;
	let is_customer = rental.customer_id == user.id();
	let is_vendor = vendor_id_of(&state, &user).await? == Some(rental.vendor_id);
	if !user.is_admin() && !is_customer && !is_vendor {
		return Err(AppError::forbidden("not your rental"));
	}

	let next = change.status;
	if !next.requestable_by(user.role(), is_customer, is_vendor) {
		return Err(AppError::forbidden(format!("you cannot mark this rental {next}")));
	}
	if !rental.status.can_transition_to(next) {
		return Err(AppError::Unprocessable(format!("a {} rental cannot become {}", rental.status, next)));
	}

	let now = Utc::now();
	let previous = rental.status;
	rental.status = next;
	rental.updated_at = now;
	if next == RentalStatus::Cancelled && rental.payment_status == PaymentStatus::Paid {
		rental.payment_status = PaymentStatus::Refunded;
		refund_payments(&state, &rental).await?;
	}
	state.store.update_rental(&rental).await?;

	info!("user {} moved rental {} from {} to {}", user.id(), rental.id, previous, next);
	Ok(Json(rental))
}

/// Marks the completed payments of `rental` refunded.
pub(crate) async fn refund_payments(state: &AppState, rental: &Rental) -> AppResult<()> {
	let now = Utc::now();
	for mut payment in state.store.list_payments(Some(rental.customer_id)).await? {
		if payment.rental_id == rental.id && payment.status == TransactionStatus::Complete {
			payment.status = TransactionStatus::Refunded;
			payment.updated_at = now;
			state.store.update_payment(&payment).await?;
		}
	}
	Ok(())
}
