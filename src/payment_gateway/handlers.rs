use axum::{
	extract::{Path, Query, State},
	Json,
};
use chrono::Utc;
use hyper::StatusCode;
use log::{info, warn};
use uuid::Uuid;

use super::{
	esewa::{amounts_match, EsewaStatus, PaymentForm},
	Payment, Settled, Settlement, TransactionStatus,
};
use crate::{
	auth::AuthUser,
	error::{AppError, AppResult},
	rentals::{PaymentStatus, Rental, RentalStatus},
	state::AppState,
	users::Role,
};

#[derive(serde::Deserialize, Debug)]
pub struct InitiateRequest {
	pub rental_id: Uuid,
}

#[derive(serde::Serialize, serde::Deserialize, Debug)]
pub struct Initiated {
	pub payment_id: Uuid,
	#[serde(flatten)]
	pub form: PaymentForm,
}

#[derive(serde::Deserialize, Debug)]
pub struct SuccessQuery {
	pub data: String,
}

#[derive(serde::Deserialize, Debug)]
pub struct FailureQuery {
	pub transaction_uuid: String,
}

#[derive(serde::Serialize, Debug)]
pub struct PaymentOutcome {
	pub payment: Payment,
	pub rental: Rental,
}

async fn by_transaction(state: &AppState, transaction_uuid: &str) -> AppResult<Payment> {
	state
		.store
		.payment_by_transaction(transaction_uuid)
		.await?
		.ok_or_else(|| AppError::not_found("payment"))
}

pub async fn initiate(
	State(state): State<AppState>,
	user: AuthUser,
	Json(request): Json<InitiateRequest>,
) -> AppResult<(StatusCode, Json<Initiated>)> {
	let rental = state.store.rental_by_id(request.rental_id).await?.ok_or_else(|| AppError::not_found("rental"))?;
	if rental.customer_id != user.id() {
		return Err(AppError::forbidden("not your rental"));
	}
	if rental.status != RentalStatus::Pending {
		return Err(AppError::Conflict(format!("rental is {}", rental.status)));
	}
	if !matches!(rental.payment_status, PaymentStatus::Unpaid | PaymentStatus::Failed) {
		return Err(AppError::Conflict(format!("rental is already {}", rental.payment_status)));
	}
	let now = Utc::now();
	if !rental.hold_is_live(now) {
		return Err(AppError::Conflict("the booking hold has expired, book again".to_string()));
	}

	// only the newest checkout of a rental stays pending
	let stale = state.store.list_payments(Some(user.id())).await?;
	for old in stale.iter().filter(|p| p.rental_id == rental.id && p.status == TransactionStatus::Pending) {
		state.store.settle_payment(old.id, EsewaStatus::Canceled, None, now).await?;
		info!("payment {} superseded by a new checkout", old.id);
	}

	let payment = Payment::esewa(rental.id, user.id(), rental.total_price, now);
	let form = state.esewa.form_for(&payment)?;
	state.store.insert_payment(&payment).await?;

	info!("payment {} started for rental {} ({})", payment.id, rental.id, payment.transaction_uuid);
	Ok((StatusCode::CREATED, Json(Initiated { payment_id: payment.id, form })))
}

/// Redirect target after a payment on eSewa.
pub async fn success(State(state): State<AppState>, Query(query): Query<SuccessQuery>) -> AppResult<Json<PaymentOutcome>> {
	let callback = state.esewa.verify_callback(&query.data)?;
	let payment = by_transaction(&state, &callback.transaction_uuid).await?;
	if !amounts_match(callback.total_amount, payment.amount) {
		warn!(
			"callback amount {} does not match payment {} amount {}",
			callback.total_amount, payment.id, payment.amount
		);
		return Err(AppError::BadRequest("callback amount does not match the payment".to_string()));
	}

	apply_status(&state, &payment, callback.status, Some(callback.transaction_code)).await.map(Json)
}

pub async fn failure(State(state): State<AppState>, Query(query): Query<FailureQuery>) -> AppResult<Json<PaymentOutcome>> {
	let payment = by_transaction(&state, &query.transaction_uuid).await?;
	apply_status(&state, &payment, EsewaStatus::Canceled, None).await.map(Json)
}

/// Asks the status API about a payment and applies the answer.
pub async fn verify(State(state): State<AppState>, user: AuthUser, Path(id): Path<Uuid>) -> AppResult<Json<PaymentOutcome>> {
	let payment = state.store.payment_by_id(id).await?.ok_or_else(|| AppError::not_found("payment"))?;
	if !user.is_admin() && payment.user_id != user.id() {
		return Err(AppError::forbidden("not your payment"));
	}

	let report = state.esewa.check_status(&payment).await?;
	if report.transaction_uuid != payment.transaction_uuid {
		return Err(AppError::Gateway(format!("status API answered for {}", report.transaction_uuid)));
	}
	apply_status(&state, &payment, report.status, report.ref_id).await.map(Json)
}

pub async fn mine(State(state): State<AppState>, user: AuthUser) -> AppResult<Json<Vec<Payment>>> {
	Ok(Json(state.store.list_payments(Some(user.id())).await?))
}

pub async fn list_all(State(state): State<AppState>, user: AuthUser) -> AppResult<Json<Vec<Payment>>> {
	user.require(&[Role::Admin])?;
	Ok(Json(state.store.list_payments(None).await?))
}

/// Moves a payment and its rental to match a gateway status.
pub async fn apply_status(
	state: &AppState,
	payment: &Payment,
	status: EsewaStatus,
	transaction_code: Option<String>,
) -> AppResult<PaymentOutcome> {
	let Settled { payment, rental, settlement } =
		state.store.settle_payment(payment.id, status, transaction_code, Utc::now()).await?;

	match settlement {
		Settlement::Unchanged => info!("payment {} is {} after gateway status {}", payment.id, payment.status, status),
		Settlement::Confirmed => info!("payment {} confirmed rental {}", payment.id, rental.id),
		Settlement::Duplicate => {
			warn!("payment {} arrived for rental {} which is already paid, to be refunded", payment.id, rental.id)
		}
		Settlement::Released => warn!(
			"payment {} for rental {} ({}) came after its hold and is to be refunded",
			payment.id, rental.id, rental.status
		),
		Settlement::Failed => info!("payment {} failed ({})", payment.id, status),
		Settlement::Refunded => info!("payment {} refunded by the gateway", payment.id),
	}
	Ok(PaymentOutcome { payment, rental })
}
