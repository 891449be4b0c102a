use axum::{
	extract::{Path, State},
	Json,
};
use chrono::Utc;
use hyper::StatusCode;
use log::info;
use uuid::Uuid;

use super::{Role, UserView};
use crate::{
	auth::{password, AuthUser},
	error::{AppError, AppResult},
	rentals::RentalFilter,
	state::AppState,
};

#[derive(serde::Deserialize, Debug, Default)]
pub struct ProfileChanges {
	pub name: Option<String>,
	pub phone: Option<String>,
	pub password: Option<String>,
}

#[derive(serde::Deserialize, Debug)]
pub struct RoleChange {
	pub role: Role,
}

pub async fn list_users(State(state): State<AppState>, user: AuthUser) -> AppResult<Json<Vec<UserView>>> {
	user.require(&[Role::Admin])?;
	let users = state.store.list_users().await?;
	Ok(Json(users.iter().map(UserView::from).collect()))
}

pub async fn get_user(State(state): State<AppState>, user: AuthUser, Path(id): Path<Uuid>) -> AppResult<Json<UserView>> {
	if !user.is_admin() && user.id() != id {
		return Err(AppError::forbidden("you can only view your own account"));
	}
	let found = state.store.user_by_id(id).await?.ok_or_else(|| AppError::not_found("user"))?;
	Ok(Json(UserView::from(&found)))
}

pub async fn update_profile(
	State(state): State<AppState>,
	AuthUser(mut user): AuthUser,
	Json(changes): Json<ProfileChanges>,
) -> AppResult<Json<UserView>> {
	if let Some(name) = changes.name {
		let name = name.trim();
		if name.is_empty() {
			return Err(AppError::Unprocessable("name must not be empty".to_string()));
		}
		user.name = name.to_string();
	}
	if let Some(phone) = changes.phone {
		user.phone = phone.trim().to_string();
	}
	if let Some(secret) = changes.password {
		password::validate_password(&secret)?;
		user.password_hash = password::hash_password(&secret)?;
	}
	user.updated_at = Utc::now();

	state.store.update_user(&user).await?;
	info!("user {} updated their profile", user.id);
	Ok(Json(UserView::from(&user)))
}

pub async fn change_role(
	State(state): State<AppState>,
	admin: AuthUser,
	Path(id): Path<Uuid>,
	Json(change): Json<RoleChange>,
) -> AppResult<Json<UserView>> {
	admin.require(&[Role::Admin])?;
	if admin.id() == id && change.role != Role::Admin {
		return Err(AppError::Conflict("admins cannot demote themselves".to_string()));
	}

	let mut user = state.store.user_by_id(id).await?.ok_or_else(|| AppError::not_found("user"))?;
	user.role = change.role;
	user.updated_at = Utc::now();
	state.store.update_user(&user).await?;

	info!("admin {} set role of {} to {}", admin.id(), user.id, user.role);
	Ok(Json(UserView::from(&user)))
}

pub async fn delete_user(State(state): State<AppState>, admin: AuthUser, Path(id): Path<Uuid>) -> AppResult<StatusCode> {
	admin.require(&[Role::Admin])?;
	if admin.id() == id {
		return Err(AppError::Conflict("admins cannot delete themselves".to_string()));
	}

	// accounts with rental history are never deleted
	let as_customer = RentalFilter { customer_id: Some(id), ..Default::default() };
	let mut has_history = !state.store.list_rentals(&as_customer).await?.is_empty();
	if let Some(vendor) = state.store.vendor_by_user(id).await? {
		let as_vendor = RentalFilter { vendor_id: Some(vendor.id), ..Default::default() };
		has_history |= !state.store.list_rentals(&as_vendor).await?.is_empty();
	}
	if has_history {
		return Err(AppError::Conflict("user has rental history".to_string()));
	}

	if !state.store.delete_user(id).await? {
		return Err(AppError::not_found("user"));
	}
	info!("admin {} deleted user {}", admin.id(), id);
	Ok(StatusCode::NO_CONTENT)
}
