use axum::{
	extract::{Path, Query, State},
	Json,
};
use chrono::Utc;
use hyper::StatusCode;
use log::info;
use uuid::Uuid;

use super::Vendor;
use crate::{
	approval::{ApprovalDecision, ApprovalStatus},
	auth::AuthUser,
	error::{AppError, AppResult},
	state::AppState,
	users::Role,
};

#[derive(serde::Deserialize, Debug)]
pub struct VendorApplication {
	pub business_name: String,
	pub phone: String,
	pub address: String,
	pub pan_number: Option<String>,
	pub description: Option<String>,
}

#[derive(serde::Deserialize, Debug, Default)]
pub struct VendorQuery {
	pub status: Option<ApprovalStatus>,
}

fn required(value: &str, field: &str) -> AppResult<String> {
	let value = value.trim();
	if value.is_empty() {
		return Err(AppError::Unprocessable(format!("{field} must not be empty")));
	}
	Ok(value.to_string())
}

fn optional(value: Option<String>) -> Option<String> {
	value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

/// Files a vendor application, or re-files a rejected one.
pub async fn apply(
	State(state): State<AppState>,
	user: AuthUser,
	Json(application): Json<VendorApplication>,
) -> AppResult<(StatusCode, Json<Vendor>)> {
	user.require(&[Role::Customer, Role::Vendor])?;
	let business_name = required(&application.business_name, "business_name")?;
	let phone = required(&application.phone, "phone")?;
	let address = required(&application.address, "address")?;
	let now = Utc::now();

	match state.store.vendor_by_user(user.id()).await? {
		Some(mut vendor) => {
			if vendor.approval_status != ApprovalStatus::Rejected {
				return Err(AppError::Conflict(format!("vendor application is already {}", vendor.approval_status)));
			}
			vendor.business_name = business_name;
			vendor.phone = phone;
			vendor.address = address;
			vendor.pan_number = optional(application.pan_number);
			vendor.description = optional(application.description);
			vendor.approval_status = ApprovalStatus::Pending;
			vendor.rejection_reason = None;
			vendor.updated_at = now;
			state.store.update_vendor(&vendor).await?;

			info!("vendor {} re-applied", vendor.id);
			Ok((StatusCode::OK, Json(vendor)))
		}
		None => {
			let vendor = Vendor {
				id: Uuid::new_v4(),
				user_id: user.id(),
				business_name,
				phone,
				address,
				pan_number: optional(application.pan_number),
				description: optional(application.description),
				approval_status: ApprovalStatus::Pending,
				rejection_reason: None,
				created_at: now,
				updated_at: now,
			};
			state.store.insert_vendor(&vendor).await?;

			info!("user {} applied as vendor {}", user.id(), vendor.id);
			Ok((StatusCode::CREATED, Json(vendor)))
		}
	}
}

pub async fn my_vendor(State(state): State<AppState>, user: AuthUser) -> AppResult<Json<Vendor>> {
	let vendor = state.store.vendor_by_user(user.id()).await?.ok_or_else(|| AppError::not_found("vendor profile"))?;
	Ok(Json(vendor))
}

pub async fn list_vendors(
	State(state): State<AppState>,
	user: AuthUser,
	Query(query): Query<VendorQuery>,
) -> AppResult<Json<Vec<Vendor>>> {
	user.require(&[Role::Admin])?;
	Ok(Json(state.store.list_vendors(query.status).await?))
}

pub async fn get_vendor(State(state): State<AppState>, user: AuthUser, Path(id): Path<Uuid>) -> AppResult<Json<Vendor>> {
	user.require(&[Role::Admin])?;
	let vendor = state.store.vendor_by_id(id).await?.ok_or_else(|| AppError::not_found("vendor"))?;
	Ok(Json(vendor))
}

/// Admin decision on a vendor. Approval makes the owner a vendor;
/// rejection turns a vendor back into a customer.
pub async fn decide(
	State(state): State<AppState>,
	admin: AuthUser,
	Path(id): Path<Uuid>,
	Json(decision): Json<ApprovalDecision>,
) -> AppResult<Json<Vendor>> {
	admin.require(&[Role::Admin])?;
	let (status, reason) = decision.validate()?;

	let mut vendor = state.store.vendor_by_id(id).await?.ok_or_else(|| AppError::not_found("vendor"))?;
	let mut owner = state.store.user_by_id(vendor.user_id).await?.ok_or_else(|| AppError::not_found("user"))?;
	let now = Utc::now();

	vendor.approval_status = status;
	vendor.rejection_reason = reason;
	vendor.updated_at = now;
	state.store.update_vendor(&vendor).await?;

	let role = match status {
		ApprovalStatus::Approved if owner.role == Role::Customer => Some(Role::Vendor),
		ApprovalStatus::Rejected if owner.role == Role::Vendor => Some(Role::Customer),
		_ => None,
	};
	if let Some(role) = role {
		owner.role = role;
		owner.updated_at = now;
		state.store.update_user(&owner).await?;
	}

	info!("admin {} marked vendor {} {}", admin.id(), vendor.id, vendor.approval_status);
	Ok(Json(vendor))
}
