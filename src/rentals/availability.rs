use chrono::{DateTime, NaiveDate, Utc};

use super::Rental;
use crate::error::{AppError, AppResult};

/// Longest rental accepted in one booking.
pub const MAX_RENTAL_DAYS: i64 = 90;

/// Half-open span of days `[start, end)`. `end` is the return day, so a
/// vehicle returned on the 5th can be picked up by someone else on the 5th.
#[derive(serde::Serialize, serde::Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateSpan {
	#[serde(rename = "start_date")]
	pub start: NaiveDate,
	#[serde(rename = "end_date")]
	pub end: NaiveDate,
}

impl DateSpan {
	pub fn new(start: NaiveDate, end: NaiveDate) -> AppResult<Self> {
		if end <= start {
			return Err(AppError::BadRequest("end_date must be after start_date".to_string()));
		}
		let span = DateSpan { start, end };
		if span.days() > MAX_RENTAL_DAYS {
			return Err(AppError::BadRequest(format!("a rental can last at most {MAX_RENTAL_DAYS} days")));
		}
		Ok(span)
	}

	pub fn days(&self) -> i64 {
		(self.end - self.start).num_days()
	}

	pub fn overlaps(&self, other: &DateSpan) -> bool {
		self.start < other.end && other.start < self.end
	}
}

/// Rentals among `existing` that block `span` at time `now`.
pub fn conflicts<'a>(existing: &'a [Rental], span: &DateSpan, now: DateTime<Utc>) -> Vec<&'a Rental> {
	existing.iter().filter(|r| r.blocks(now) && r.span().overlaps(span)).collect()
}

pub fn total_price(span: &DateSpan, price_per_day: f64) -> f64 {
	round_money(span.days() as f64 * price_per_day)
}

/// Rounds to paisa.
pub fn round_money(amount: f64) -> f64 {
	(amount * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
	use chrono::Duration;
	use uuid::Uuid;

	use super::*;
	use crate::rentals::{PaymentStatus, RentalStatus};

	fn day(d: u32) -> NaiveDate {
		NaiveDate::from_ymd_opt(2026, 11, d).unwrap()
	}

	fn rental(start: u32, end: u32, status: RentalStatus, hold_expires_at: DateTime<Utc>) -> Rental {
		let now = Utc::now();
		Rental {
			id: Uuid::new_v4(),
			vehicle_id: Uuid::new_v4(),
			vendor_id: Uuid::new_v4(),
			customer_id: Uuid::new_v4(),
			start_date: day(start),
			end_date: day(end),
			days: (end - start) as i32,
			price_per_day: 1000.0,
			total_price: 1000.0 * (end - start) as f64,
			status,
			payment_status: PaymentStatus::Unpaid,
			hold_expires_at,
			created_at: now,
			updated_at: now,
		}
	}

	#[test]
	fn empty_or_inverted_spans_are_rejected() {
		assert!(DateSpan::new(day(3), day(3)).is_err());
		assert!(DateSpan::new(day(4), day(3)).is_err());
	}

	#[test]
	fn spans_longer_than_the_limit_are_rejected() {
		let start = day(1);
		assert!(DateSpan::new(start, start + Duration::days(MAX_RENTAL_DAYS)).is_ok());
		assert!(DateSpan::new(start, start + Duration::days(MAX_RENTAL_DAYS + 1)).is_err());
	}

	#[test]
	fn return_day_can_be_next_pickup_day() {
		let first = DateSpan::new(day(1), day(5)).unwrap();
		let second = DateSpan::new(day(5), day(7)).unwrap();
		assert!(!first.overlaps(&second));
		assert!(!second.overlaps(&first));
	}

	#[test]
	fn partial_and_nested_spans_overlap() {
		let outer = DateSpan::new(day(1), day(10)).unwrap();
		assert!(outer.overlaps(&DateSpan::new(day(3), day(4)).unwrap()));
		assert!(outer.overlaps(&DateSpan::new(day(9), day(12)).unwrap()));
		assert!(DateSpan::new(day(3), day(4)).unwrap().overlaps(&outer));
	}

	#[test]
	fn pricing_counts_nights() {
		let span = DateSpan::new(day(1), day(4)).unwrap();
		assert_eq!(span.days(), 3);
		assert_eq!(total_price(&span, 2500.5), 7501.5);
	}

	#[test]
	fn expired_holds_and_closed_rentals_do_not_block() {
		let now = Utc::now();
		let existing = vec![
			rental(1, 5, RentalStatus::Pending, now - Duration::minutes(1)),
			rental(1, 5, RentalStatus::Cancelled, now + Duration::minutes(30)),
			rental(1, 5, RentalStatus::Completed, now),
		];
		let span = DateSpan::new(day(2), day(3)).unwrap();
		assert!(conflicts(&existing, &span, now).is_empty());
	}

	#[test]
	fn live_holds_and_confirmed_rentals_block() {
		let now = Utc::now();
		let existing = vec![
			rental(1, 3, RentalStatus::Pending, now + Duration::minutes(10)),
			rental(6, 8, RentalStatus::Confirmed, now - Duration::days(2)),
			rental(10, 12, RentalStatus::Active, now - Duration::days(2)),
		];
		let span = DateSpan::new(day(2), day(7)).unwrap();
		assert_eq!(conflicts(&existing, &span, now).len(), 2);
	}
}
