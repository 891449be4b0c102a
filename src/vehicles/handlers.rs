use axum::{
	extract::{Multipart, Path, Query, State},
	Json,
};
use chrono::Utc;
use hyper::StatusCode;
use log::{info, warn};
use uuid::Uuid;

use super::{upload, NewVehicle, Vehicle, VehicleChanges, VehicleFilter};
use crate::{
	approval::ApprovalDecision,
	auth::{AuthUser, MaybeUser},
	error::{AppError, AppResult},
	rentals::RentalFilter,
	state::AppState,
	users::Role,
	vendors::Vendor,
};

async fn approved_vendor(state: &AppState, user: &AuthUser) -> AppResult<Vendor> {
	user.require(&[Role::Vendor])?;
	let vendor = state
		.store
		.vendor_by_user(user.id())
		.await?
		.ok_or_else(|| AppError::forbidden("no vendor profile"))?;
	if !vendor.is_approved() {
		return Err(AppError::forbidden("vendor account is not approved"));
	}
	Ok(vendor)
}

async fn fetch(state: &AppState, id: Uuid) -> AppResult<Vehicle> {
	state.store.vehicle_by_id(id).await?.ok_or_else(|| AppError::not_found("vehicle"))
}

async fn is_owner(state: &AppState, user: &AuthUser, vehicle: &Vehicle) -> AppResult<bool> {
	Ok(state.store.vendor_by_user(user.id()).await?.is_some_and(|v| v.id == vehicle.vendor_id))
}

/// Loads a vehicle the caller owns.
async fn owned(state: &AppState, user: &AuthUser, id: Uuid) -> AppResult<Vehicle> {
	let vehicle = fetch(state, id).await?;
	if !is_owner(state, user, &vehicle).await? {
		return Err(AppError::forbidden("not your vehicle"));
	}
	Ok(vehicle)
}

pub async fn create(
	State(state): State<AppState>,
	user: AuthUser,
	Json(input): Json<NewVehicle>,
) -> AppResult<(StatusCode, Json<Vehicle>)> {
	let vendor = approved_vendor(&state, &user).await?;
	let vehicle = Vehicle::new(vendor.id, input, Utc::now())?;
	state.store.insert_vehicle(&vehicle).await?;

	info!("vendor {} listed vehicle {}", vendor.id, vehicle.id);
	Ok((StatusCode::CREATED, Json(vehicle)))
}

pub async fn upload_images(
	State(state): State<AppState>,
	user: AuthUser,
	Path(id): Path<Uuid>,
	multipart: Multipart,
) -> AppResult<Json<Vehicle>> {
	let mut vehicle = owned(&state, &user, id).await?;
	let dir = upload::vehicle_dir(&state.settings.server.upload_dir, vehicle.id);
	let saved = upload::save_images(multipart, &dir, vehicle.images.len()).await?;

	vehicle.images.extend(saved.iter().map(|name| format!("/vehicles/images/{}/{}", vehicle.id, name)));
	vehicle.updated_at = Utc::now();
	state.store.update_vehicle(&vehicle).await?;

	info!("stored {} images for vehicle {}", saved.len(), vehicle.id);
	Ok(Json(vehicle))
}

/// Public catalogue: approved, available vehicles of approved vendors.
pub async fn list_public(
	State(state): State<AppState>,
	Query(mut filter): Query<VehicleFilter>,
) -> AppResult<Json<Vec<Vehicle>>> {
	filter.listed_only = true;
	filter.approval_status = None;
	filter.vendor_id = None;
	Ok(Json(state.store.list_vehicles(&filter).await?))
}

/// Listed vehicles are public; anything else only to its owner or an admin.
pub async fn get_vehicle(
	State(state): State<AppState>,
	MaybeUser(user): MaybeUser,
	Path(id): Path<Uuid>,
) -> AppResult<Json<Vehicle>> {
	let vehicle = fetch(&state, id).await?;
	if state.store.vehicle_is_listed(id).await? {
		return Ok(Json(vehicle));
	}
	let visible = match &user {
		Some(user) if user.is_admin() => true,
		Some(user) => is_owner(&state, user, &vehicle).await?,
		None => false,
	};
	if !visible {
		return Err(AppError::not_found("vehicle"));
	}
	Ok(Json(vehicle))
}

pub async fn mine(State(state): State<AppState>, user: AuthUser) -> AppResult<Json<Vec<Vehicle>>> {
	user.require(&[Role::Vendor])?;
	let Some(vendor) = state.store.vendor_by_user(user.id()).await? else {
		return Ok(Json(Vec::new()));
	};
	let filter = VehicleFilter { vendor_id: Some(vendor.id), ..Default::default() };
	Ok(Json(state.store.list_vehicles(&filter).await?))
}

pub async fn admin_list(
	State(state): State<AppState>,
	user: AuthUser,
	Query(mut filter): Query<VehicleFilter>,
) -> AppResult<Json<Vec<Vehicle>>> {
	user.require(&[Role::Admin])?;
	filter.listed_only = false;
	Ok(Json(state.store.list_vehicles(&filter).await?))
}

pub async fn update(
	State(state): State<AppState>,
	user: AuthUser,
	Path(id): Path<Uuid>,
	Json(changes): Json<VehicleChanges>,
) -> AppResult<Json<Vehicle>> {
	let mut vehicle = owned(&state, &user, id).await?;
	vehicle.apply(changes, Utc::now())?;
	state.store.update_vehicle(&vehicle).await?;

	info!("vehicle {} updated, now {}", vehicle.id, vehicle.approval_status);
	Ok(Json(vehicle))
}

pub async fn delete(State(state): State<AppState>, user: AuthUser, Path(id): Path<Uuid>) -> AppResult<StatusCode> {
	let vehicle = fetch(&state, id).await?;
	if !user.is_admin() && !is_owner(&state, &user, &vehicle).await? {
		return Err(AppError::forbidden("not your vehicle"));
	}

	let history = RentalFilter { vehicle_id: Some(id), ..Default::default() };
	if !state.store.list_rentals(&history).await?.is_empty() {
		return Err(AppError::Conflict("vehicle has rental history".to_string()));
	}
	if !state.store.delete_vehicle(id).await? {
		return Err(AppError::not_found("vehicle"));
	}

	let dir = upload::vehicle_dir(&state.settings.server.upload_dir, id);
	if let Err(err) = tokio::fs::remove_dir_all(&dir).await {
		if err.kind() != std::io::ErrorKind::NotFound {
			warn!("could not remove {}: {}", dir.display(), err);
		}
	}

	info!("user {} deleted vehicle {}", user.id(), id);
	Ok(StatusCode::NO_CONTENT)
}

pub async fn decide(
	State(state): State<AppState>,
	admin: AuthUser,
	Path(id): Path<Uuid>,
	Json(decision): Json<ApprovalDecision>,
) -> AppResult<Json<Vehicle>> {
	admin.require(&[Role::Admin])?;
	let (status, reason) = decision.validate()?;

	let mut vehicle = fetch(&state, id).await?;
	vehicle.approval_status = status;
	vehicle.rejection_reason = reason;
	vehicle.updated_at = Utc::now();
	state.store.update_vehicle(&vehicle).await?;

	info!("admin {} marked vehicle {} {}", admin.id(), vehicle.id, vehicle.approval_status);
	Ok(Json(vehicle))
}
