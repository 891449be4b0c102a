//! Bookings: a customer holding a vehicle for a span of days.
//!
//! A new rental starts `pending` and holds its dates until
//! `hold_expires_at`. Completing the eSewa payment confirms it; from there
//! the vendor hands the vehicle over (`active`) and takes it back
//! (`completed`).
use chrono::{DateTime, NaiveDate, Utc};
use postgres_from_row::FromRow;
use uuid::Uuid;

use crate::users::Role;

pub mod availability;
pub mod handlers;

pub use availability::DateSpan;

text_enum! {
	pub enum RentalStatus {
		Pending => "pending",
		Confirmed => "confirmed",
		Active => "active",
		Completed => "completed",
		Cancelled => "cancelled",
		Rejected => "rejected",
	}
}

text_enum! {
	pub enum PaymentStatus {
		Unpaid => "unpaid",
		Paid => "paid",
		Failed => "failed",
		Refunded => "refunded",
	}
}

impl RentalStatus {
	pub fn can_transition_to(self, next: RentalStatus) -> bool {
		use RentalStatus::*;
		matches!(
			(self, next),
			(Pending, Confirmed)
				| (Pending, Cancelled)
				| (Pending, Rejected)
				| (Confirmed, Active)
				| (Confirmed, Cancelled)
				| (Active, Completed)
		)
	}

	/// Transitions a role may request through `PUT /rentals/:id/status`.
	/// `confirmed` is reached by paying, never by request.
	pub fn requestable_by(self, role: Role, is_customer: bool, is_vendor: bool) -> bool {
		use RentalStatus::*;
		match role {
			Role::Admin => self != Confirmed,
			_ if is_vendor => matches!(self, Rejected | Active | Completed | Cancelled),
			_ if is_customer => self == Cancelled,
			_ => false,
		}
	}
}

#[derive(serde::Serialize, Debug, Clone, PartialEq, FromRow)]
pub struct Rental {
	pub id: Uuid,
	pub vehicle_id: Uuid,
	pub vendor_id: Uuid,
	pub customer_id: Uuid,
	pub start_date: NaiveDate,
	pub end_date: NaiveDate,
	pub days: i32,
	pub price_per_day: f64,
	pub total_price: f64,
	pub status: RentalStatus,
	pub payment_status: PaymentStatus,
	pub hold_expires_at: DateTime<Utc>,
	pub created_at: DateTime<Utc>,
	pub updated_at: DateTime<Utc>,
}

impl Rental {
	pub fn span(&self) -> DateSpan {
		DateSpan { start: self.start_date, end: self.end_date }
	}

	/// Whether this rental keeps others from booking its dates.
	pub fn blocks(&self, now: DateTime<Utc>) -> bool {
		match self.status {
			RentalStatus::Confirmed | RentalStatus::Active => true,
			RentalStatus::Pending => self.hold_expires_at > now,
			RentalStatus::Completed | RentalStatus::Cancelled | RentalStatus::Rejected => false,
		}
	}

	pub fn hold_is_live(&self, now: DateTime<Utc>) -> bool {
		self.status == RentalStatus::Pending && self.hold_expires_at > now
	}
}

#[derive(serde::Deserialize, Debug, Clone, Default)]
pub struct RentalFilter {
	#[serde(skip)]
	pub customer_id: Option<Uuid>,
	#[serde(skip)]
	pub vendor_id: Option<Uuid>,
	#[serde(skip)]
	pub vehicle_id: Option<Uuid>,
	pub status: Option<RentalStatus>,
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn lifecycle_moves_forward_only() {
		use RentalStatus::*;
		assert!(Pending.can_transition_to(Confirmed));
		assert!(Confirmed.can_transition_to(Active));
		assert!(Active.can_transition_to(Completed));
		assert!(!Active.can_transition_to(Cancelled));
		assert!(!Completed.can_transition_to(Active));
		assert!(!Cancelled.can_transition_to(Pending));
		assert!(!Rejected.can_transition_to(Confirmed));
	}

	#[test]
	fn customers_may_only_cancel() {
		assert!(RentalStatus::Cancelled.requestable_by(Role::Customer, true, false));
		assert!(!RentalStatus::Active.requestable_by(Role::Customer, true, false));
		assert!(!RentalStatus::Cancelled.requestable_by(Role::Customer, false, false));
	}

	#[test]
	fn vendors_drive_handover() {
		assert!(RentalStatus::Active.requestable_by(Role::Vendor, false, true));
		assert!(RentalStatus::Rejected.requestable_by(Role::Vendor, false, true));
		assert!(!RentalStatus::Confirmed.requestable_by(Role::Vendor, false, true));
		assert!(!RentalStatus::Active.requestable_by(Role::Vendor, false, false));
	}

	#[test]
	fn admins_cannot_confirm_without_payment() {
		assert!(!RentalStatus::Confirmed.requestable_by(Role::Admin, false, false));
		assert!(RentalStatus::Completed.requestable_by(Role::Admin, false, false));
	}
}
