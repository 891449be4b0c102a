use chrono::{DateTime, Utc};
use postgres_from_row::FromRow;
use uuid::Uuid;

use crate::{
	error::{AppError, AppResult},
	rentals::{PaymentStatus, Rental, RentalStatus},
};
use esewa::EsewaStatus;

pub mod esewa;
pub mod handlers;

text_enum! {
	pub enum TransactionStatus {
		Pending => "pending",
		Complete => "complete",
		Failed => "failed",
		Refunded => "refunded",
	}
}

/// One attempt to pay for a rental through the gateway.
#[derive(serde::Serialize, Debug, Clone, PartialEq, FromRow)]
pub struct Payment {
	pub id: Uuid,
	pub rental_id: Uuid,
	pub user_id: Uuid,
	pub amount: f64,
	pub provider: String,
	pub transaction_uuid: String,
	pub transaction_code: Option<String>,
	pub status: TransactionStatus,
	pub created_at: DateTime<Utc>,
	pub updated_at: DateTime<Utc>,
}

impl Payment {
	pub fn esewa(rental_id: Uuid, user_id: Uuid, amount: f64, now: DateTime<Utc>) -> Self {
		Payment {
			id: Uuid::new_v4(),
			rental_id,
			user_id,
			amount,
			provider: "esewa".to_string(),
			transaction_uuid: Uuid::new_v4().to_string(),
			transaction_code: None,
			status: TransactionStatus::Pending,
			created_at: now,
			updated_at: now,
		}
	}
}

/// What a gateway status did to a payment and its rental.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Settlement {
	/// Nothing to write.
	Unchanged,
	/// The money confirmed the rental.
	Confirmed,
	/// The rental was already paid by another payment, this one is refunded.
	Duplicate,
	/// The money came too late: the rental is gone or its dates were taken.
	Released,
	Failed,
	/// The gateway returned the money.
	Refunded,
}

/// A payment and its rental after [`reconcile`], as stored.
#[derive(Debug, Clone)]
pub struct Settled {
	pub payment: Payment,
	pub rental: Rental,
	pub settlement: Settlement,
}

/// Applies a gateway `status` to `payment` and its `rental`.
///
/// `dates_taken` says whether another rental blocks the rental's dates at
/// `now`; it only matters for a pending rental whose hold has lapsed.
/// Stores call this with both rows locked and write them back unless the
/// result is [`Settlement::Unchanged`].
pub fn reconcile(
	payment: &mut Payment,
	rental: &mut Rental,
	status: EsewaStatus,
	transaction_code: Option<String>,
	dates_taken: bool,
	now: DateTime<Utc>,
) -> AppResult<Settlement> {
	let settlement = match status {
		EsewaStatus::Complete => match payment.status {
			TransactionStatus::Complete => return Ok(Settlement::Unchanged),
			TransactionStatus::Refunded => {
				return Err(AppError::Conflict(format!("payment is already {}", payment.status)));
			}
			TransactionStatus::Pending | TransactionStatus::Failed => {
				if transaction_code.is_some() {
					payment.transaction_code = transaction_code;
				}
				if rental.payment_status == PaymentStatus::Paid {
					payment.status = TransactionStatus::Refunded;
					Settlement::Duplicate
				} else if rental.status == RentalStatus::Pending && (rental.hold_is_live(now) || !dates_taken) {
					payment.status = TransactionStatus::Complete;
					rental.status = RentalStatus::Confirmed;
					rental.payment_status = PaymentStatus::Paid;
					Settlement::Confirmed
				} else {
					payment.status = TransactionStatus::Refunded;
					if rental.status == RentalStatus::Pending {
						rental.status = RentalStatus::Cancelled;
					}
					rental.payment_status = PaymentStatus::Refunded;
					Settlement::Released
				}
			}
		},
		EsewaStatus::NotFound | EsewaStatus::Canceled => {
			if payment.status != TransactionStatus::Pending {
				return Ok(Settlement::Unchanged);
			}
			payment.status = TransactionStatus::Failed;
			if rental.payment_status == PaymentStatus::Unpaid {
				rental.payment_status = PaymentStatus::Failed;
			}
			Settlement::Failed
		}
		EsewaStatus::Pending | EsewaStatus::Ambiguous => return Ok(Settlement::Unchanged),
		EsewaStatus::FullRefund | EsewaStatus::PartialRefund => {
			if payment.status == TransactionStatus::Refunded {
				return Ok(Settlement::Unchanged);
			}
			if payment.status == TransactionStatus::Complete {
				rental.payment_status = PaymentStatus::Refunded;
			}
			payment.status = TransactionStatus::Refunded;
			Settlement::Refunded
		}
	};
	payment.updated_at = now;
	rental.updated_at = now;
	Ok(settlement)
}

#[cfg(test)]
mod tests {
	use chrono::{Duration, NaiveDate};

	use super::*;

	fn pending_rental(now: DateTime<Utc>, hold: Duration) -> Rental {
		Rental {
			id: Uuid::new_v4(),
			vehicle_id: Uuid::new_v4(),
			vendor_id: Uuid::new_v4(),
			customer_id: Uuid::new_v4(),
			start_date: NaiveDate::from_ymd_opt(2026, 12, 1).unwrap(),
			end_date: NaiveDate::from_ymd_opt(2026, 12, 4).unwrap(),
			days: 3,
			price_per_day: 6500.0,
			total_price: 19500.0,
			status: RentalStatus::Pending,
			payment_status: PaymentStatus::Unpaid,
			hold_expires_at: now + hold,
			created_at: now,
			updated_at: now,
		}
	}

	fn payment_for(rental: &Rental, now: DateTime<Utc>) -> Payment {
		Payment::esewa(rental.id, rental.customer_id, rental.total_price, now)
	}

	fn complete(payment: &mut Payment, rental: &mut Rental, dates_taken: bool, now: DateTime<Utc>) -> Settlement {
		reconcile(payment, rental, EsewaStatus::Complete, Some("000AE01".to_string()), dates_taken, now).unwrap()
	}

	#[test]
	fn payment_within_the_hold_confirms() {
		let now = Utc::now();
		let mut rental = pending_rental(now, Duration::minutes(30));
		let mut payment = payment_for(&rental, now);

		assert_eq!(complete(&mut payment, &mut rental, true, now), Settlement::Confirmed);
		assert_eq!(payment.status, TransactionStatus::Complete);
		assert_eq!(payment.transaction_code.as_deref(), Some("000AE01"));
		assert_eq!(rental.status, RentalStatus::Confirmed);
		assert_eq!(rental.payment_status, PaymentStatus::Paid);

		assert_eq!(complete(&mut payment, &mut rental, true, now), Settlement::Unchanged);
	}

	#[test]
	fn second_payment_is_refunded_without_touching_the_rental() {
		let now = Utc::now();
		let mut rental = pending_rental(now, Duration::minutes(30));
		let mut first = payment_for(&rental, now);
		let mut second = payment_for(&rental, now);
		complete(&mut first, &mut rental, false, now);

		assert_eq!(complete(&mut second, &mut rental, false, now), Settlement::Duplicate);
		assert_eq!(second.status, TransactionStatus::Refunded);
		assert_eq!(rental.status, RentalStatus::Confirmed);
		assert_eq!(rental.payment_status, PaymentStatus::Paid);
	}

	#[test]
	fn lapsed_hold_confirms_only_while_the_dates_are_free() {
		let now = Utc::now();
		let mut free = pending_rental(now, -Duration::minutes(5));
		let mut payment = payment_for(&free, now);
		assert_eq!(complete(&mut payment, &mut free, false, now), Settlement::Confirmed);

		let mut taken = pending_rental(now, -Duration::minutes(5));
		let mut payment = payment_for(&taken, now);
		assert_eq!(complete(&mut payment, &mut taken, true, now), Settlement::Released);
		assert_eq!(payment.status, TransactionStatus::Refunded);
		assert_eq!(taken.status, RentalStatus::Cancelled);
		assert_eq!(taken.payment_status, PaymentStatus::Refunded);
	}

	#[test]
	fn refunded_payment_cannot_complete() {
		let now = Utc::now();
		let mut rental = pending_rental(now, Duration::minutes(30));
		let mut payment = payment_for(&rental, now);
		payment.status = TransactionStatus::Refunded;
		let err = reconcile(&mut payment, &mut rental, EsewaStatus::Complete, None, false, now).unwrap_err();
		assert!(matches!(err, AppError::Conflict(_)));
	}

	#[test]
	fn cancelled_payment_fails_once() {
		let now = Utc::now();
		let mut rental = pending_rental(now, Duration::minutes(30));
		let mut payment = payment_for(&rental, now);

		let settlement = reconcile(&mut payment, &mut rental, EsewaStatus::Canceled, None, false, now).unwrap();
		assert_eq!(settlement, Settlement::Failed);
		assert_eq!(payment.status, TransactionStatus::Failed);
		assert_eq!(rental.payment_status, PaymentStatus::Failed);
		assert_eq!(rental.status, RentalStatus::Pending);

		let again = reconcile(&mut payment, &mut rental, EsewaStatus::NotFound, None, false, now).unwrap();
		assert_eq!(again, Settlement::Unchanged);
	}

	#[test]
	fn gateway_refund_of_a_stray_payment_keeps_the_rental_paid() {
		let now = Utc::now();
		let mut rental = pending_rental(now, Duration::minutes(30));
		let mut paid = payment_for(&rental, now);
		let mut stray = payment_for(&rental, now);
		complete(&mut paid, &mut rental, false, now);

		let settlement = reconcile(&mut stray, &mut rental, EsewaStatus::FullRefund, None, false, now).unwrap();
		assert_eq!(settlement, Settlement::Refunded);
		assert_eq!(rental.payment_status, PaymentStatus::Paid);

		let settlement = reconcile(&mut paid, &mut rental, EsewaStatus::FullRefund, None, false, now).unwrap();
		assert_eq!(settlement, Settlement::Refunded);
		assert_eq!(paid.status, TransactionStatus::Refunded);
		assert_eq!(rental.payment_status, PaymentStatus::Refunded);
	}
}
