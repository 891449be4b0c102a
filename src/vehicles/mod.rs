use chrono::{DateTime, Datelike, Utc};
use postgres_from_row::FromRow;
use uuid::Uuid;

use crate::{
	approval::ApprovalStatus,
	error::{AppError, AppResult},
};

pub mod handlers;
pub mod search;
pub mod upload;

text_enum! {
	pub enum VehicleType {
		Car => "car",
		Bike => "bike",
		Scooter => "scooter",
		Suv => "suv",
		Van => "van",
		Jeep => "jeep",
	}
}

#[derive(serde::Serialize, Debug, Clone, PartialEq, FromRow)]
pub struct Vehicle {
	pub id: Uuid,
	pub vendor_id: Uuid,
	pub name: String,
	pub brand: String,
	pub model: String,
	pub vehicle_type: VehicleType,
	pub year: i32,
	pub seats: i32,
	pub fuel_type: String,
	pub transmission: String,
	pub location: String,
	pub description: String,
	pub price_per_day: f64,
	pub images: Vec<String>,
	pub approval_status: ApprovalStatus,
	pub rejection_reason: Option<String>,
	pub available: bool,
	pub created_at: DateTime<Utc>,
	pub updated_at: DateTime<Utc>,
}

/// Body of `POST /vehicles`.
#[derive(serde::Deserialize, Debug, Clone)]
pub struct NewVehicle {
	pub name: String,
	#[serde(default)]
	pub brand: String,
	#[serde(default)]
	pub model: String,
	pub vehicle_type: VehicleType,
	pub year: i32,
	pub seats: i32,
	#[serde(default)]
	pub fuel_type: String,
	#[serde(default)]
	pub transmission: String,
	pub location: String,
	#[serde(default)]
	pub description: String,
	pub price_per_day: f64,
}

/// Body of `PUT /vehicles/:id`. Absent fields keep their value.
#[derive(serde::Deserialize, Debug, Clone, Default)]
pub struct VehicleChanges {
	pub name: Option<String>,
	pub brand: Option<String>,
	pub model: Option<String>,
	pub vehicle_type: Option<VehicleType>,
	pub year: Option<i32>,
	pub seats: Option<i32>,
	pub fuel_type: Option<String>,
	pub transmission: Option<String>,
	pub location: Option<String>,
	pub description: Option<String>,
	pub price_per_day: Option<f64>,
	pub available: Option<bool>,
}

impl VehicleChanges {
	/// True when anything other than the `available` flag is being changed.
	pub fn touches_listing(&self) -> bool {
		self.name.is_some()
			|| self.brand.is_some()
			|| self.model.is_some()
			|| self.vehicle_type.is_some()
			|| self.year.is_some()
			|| self.seats.is_some()
			|| self.fuel_type.is_some()
			|| self.transmission.is_some()
			|| self.location.is_some()
			|| self.description.is_some()
			|| self.price_per_day.is_some()
	}
}

impl Vehicle {
	pub fn new(vendor_id: Uuid, input: NewVehicle, now: DateTime<Utc>) -> AppResult<Self> {
		let vehicle = Vehicle {
			id: Uuid::new_v4(),
			vendor_id,
			name: input.name.trim().to_string(),
			brand: input.brand.trim().to_string(),
			model: input.model.trim().to_string(),
			vehicle_type: input.vehicle_type,
			year: input.year,
			seats: input.seats,
			fuel_type: input.fuel_type.trim().to_string(),
			transmission: input.transmission.trim().to_string(),
			location: input.location.trim().to_string(),
			description: input.description.trim().to_string(),
			price_per_day: input.price_per_day,
			images: Vec::new(),
			approval_status: ApprovalStatus::Pending,
			rejection_reason: None,
			available: true,
			created_at: now,
			updated_at: now,
		};
		vehicle.validate(now)?;
		Ok(vehicle)
	}

	/// Applies `changes`; a listing change sends an approved vehicle back for review.
	pub fn apply(&mut self, changes: VehicleChanges, now: DateTime<Utc>) -> AppResult<()> {
		let relist = changes.touches_listing();
		if let Some(name) = changes.name {
			self.name = name.trim().to_string();
		}
		if let Some(brand) = changes.brand {
			self.brand = brand.trim().to_string();
		}
		if let Some(model) = changes.model {
			self.model = model.trim().to_string();
		}
		if let Some(vehicle_type) = changes.vehicle_type {
			self.vehicle_type = vehicle_type;
		}
		if let Some(year) = changes.year {
			self.year = year;
		}
		if let Some(seats) = changes.seats {
			self.seats = seats;
		}
		if let Some(fuel_type) = changes.fuel_type {
			self.fuel_type = fuel_type.trim().to_string();
		}
		if let Some(transmission) = changes.transmission {
			self.transmission = transmission.trim().to_string();
		}
		if let Some(location) = changes.location {
			self.location = location.trim().to_string();
		}
		if let Some(description) = changes.description {
			self.description = description.trim().to_string();
		}
		if let Some(price) = changes.price_per_day {
			self.price_per_day = price;
		}
		if let Some(available) = changes.available {
			self.available = available;
		}
		self.validate(now)?;

		if relist {
			self.approval_status = ApprovalStatus::Pending;
			self.rejection_reason = None;
		}
		self.updated_at = now;
		Ok(())
	}

	fn validate(&self, now: DateTime<Utc>) -> AppResult<()> {
		if self.name.is_empty() {
			return Err(AppError::Unprocessable("name must not be empty".to_string()));
		}
		if self.location.is_empty() {
			return Err(AppError::Unprocessable("location must not be empty".to_string()));
		}
		if !self.price_per_day.is_finite() || self.price_per_day <= 0.0 {
			return Err(AppError::Unprocessable("price_per_day must be positive".to_string()));
		}
		if !(1..=60).contains(&self.seats) {
			return Err(AppError::Unprocessable("seats must be between 1 and 60".to_string()));
		}
		let next_year = now.year() + 1;
		if !(1950..=next_year).contains(&self.year) {
			return Err(AppError::Unprocessable(format!("year must be between 1950 and {next_year}")));
		}
		Ok(())
	}
}

/// Selection over vehicles. The store evaluates `vendor_id`,
/// `approval_status` and `listed_only`; [`VehicleFilter::matches`] covers
/// the rest.
#[derive(serde::Deserialize, Debug, Clone, Default)]
pub struct VehicleFilter {
	#[serde(skip)]
	pub vendor_id: Option<Uuid>,
	#[serde(rename = "status")]
	pub approval_status: Option<ApprovalStatus>,
	#[serde(skip)]
	pub listed_only: bool,
	pub q: Option<String>,
	pub vehicle_type: Option<VehicleType>,
	pub location: Option<String>,
	pub min_price: Option<f64>,
	pub max_price: Option<f64>,
}

impl VehicleFilter {
	pub fn listed() -> Self {
		VehicleFilter { listed_only: true, ..Default::default() }
	}

	pub fn matches(&self, vehicle: &Vehicle) -> bool {
		if let Some(vehicle_type) = self.vehicle_type {
			if vehicle.vehicle_type != vehicle_type {
				return false;
			}
		}
		if let Some(location) = self.location.as_deref().map(str::trim).filter(|l| !l.is_empty()) {
			if !vehicle.location.to_lowercase().contains(&location.to_lowercase()) {
				return false;
			}
		}
		if let Some(min) = self.min_price {
			if vehicle.price_per_day < min {
				return false;
			}
		}
		if let Some(max) = self.max_price {
			if vehicle.price_per_day > max {
				return false;
			}
		}
		match self.q.as_deref().map(str::trim).filter(|q| !q.is_empty()) {
			Some(q) => search::matches_keyword(vehicle, q),
			None => true,
		}
	}
}

#[cfg(test)]
pub(crate) mod tests {
	use super::*;

	pub(crate) fn sample(vendor_id: Uuid) -> Vehicle {
		let input = NewVehicle {
			name: "Hyundai Creta".to_string(),
			brand: "Hyundai".to_string(),
			model: "Creta".to_string(),
			vehicle_type: VehicleType::Suv,
			year: 2021,
			seats: 5,
			fuel_type: "petrol".to_string(),
			transmission: "manual".to_string(),
			location: "Kathmandu".to_string(),
			description: "Clean SUV with roof rack".to_string(),
			price_per_day: 6500.0,
		};
		Vehicle::new(vendor_id, input, Utc::now()).unwrap()
	}

	#[test]
	fn new_vehicle_starts_pending_and_available() {
		let vehicle = sample(Uuid::new_v4());
		assert_eq!(vehicle.approval_status, ApprovalStatus::Pending);
		assert!(vehicle.available);
		assert!(vehicle.images.is_empty());
	}

	#[test]
	fn rejects_non_positive_price() {
		let mut vehicle = sample(Uuid::new_v4());
		let err = vehicle
			.apply(VehicleChanges { price_per_day: Some(0.0), ..Default::default() }, Utc::now())
			.unwrap_err();
		assert!(matches!(err, AppError::Unprocessable(_)));
	}

	#[test]
	fn availability_toggle_keeps_approval() {
		let mut vehicle = sample(Uuid::new_v4());
		vehicle.approval_status = ApprovalStatus::Approved;
		vehicle.apply(VehicleChanges { available: Some(false), ..Default::default() }, Utc::now()).unwrap();
		assert_eq!(vehicle.approval_status, ApprovalStatus::Approved);
		assert!(!vehicle.available);
	}

	#[test]
	fn listing_change_requires_review_again() {
		let mut vehicle = sample(Uuid::new_v4());
		vehicle.approval_status = ApprovalStatus::Approved;
		vehicle
			.apply(VehicleChanges { price_per_day: Some(7000.0), ..Default::default() }, Utc::now())
			.unwrap();
		assert_eq!(vehicle.approval_status, ApprovalStatus::Pending);
		assert_eq!(vehicle.price_per_day, 7000.0);
	}

	#[test]
	fn filter_checks_type_location_and_price() {
		let vehicle = sample(Uuid::new_v4());
		let mut filter = VehicleFilter { location: Some("kathmandu".to_string()), ..Default::default() };
		assert!(filter.matches(&vehicle));

		filter.vehicle_type = Some(VehicleType::Bike);
		assert!(!filter.matches(&vehicle));

		filter.vehicle_type = None;
		filter.max_price = Some(5000.0);
		assert!(!filter.matches(&vehicle));
	}
}
