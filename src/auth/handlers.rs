use axum::{extract::State, Json};
use chrono::Utc;
use hyper::StatusCode;
use log::info;
use uuid::Uuid;

use super::{password, AuthUser};
use crate::{
	error::{AppError, AppResult},
	state::AppState,
	users::{normalize_email, Role, User, UserView},
};

#[derive(serde::Deserialize, Debug)]
pub struct Registration {
	pub name: String,
	pub email: String,
	#[serde(default)]
	pub phone: String,
	pub password: String,
}

#[derive(serde::Deserialize)]
pub struct Logins {
	pub email: String,
	pub password: String,
}

#[derive(serde::Serialize, serde::Deserialize, Debug)]
pub struct Session {
	pub token: String,
	pub user: UserView,
	pub home_route: String,
}

#[derive(serde::Serialize, serde::Deserialize, Debug)]
pub struct Me {
	pub user: UserView,
	pub home_route: String,
}

fn session(state: &AppState, user: &User) -> AppResult<Session> {
	Ok(Session {
		token: state.tokens.issue(user)?,
		user: UserView::from(user),
		home_route: user.role.home_route().to_string(),
	})
}

pub fn validate_email(email: &str) -> AppResult<()> {
	let valid = email
		.split_once('@')
		.is_some_and(|(local, domain)| !local.is_empty() && !domain.is_empty() && !email.contains(char::is_whitespace));
	if !valid {
		return Err(AppError::Unprocessable("email address is invalid".to_string()));
	}
	Ok(())
}

pub async fn register(
	State(state): State<AppState>,
	Json(registration): Json<Registration>,
) -> AppResult<(StatusCode, Json<Session>)> {
	let name = registration.name.trim();
	if name.is_empty() {
		return Err(AppError::Unprocessable("name must not be empty".to_string()));
	}
	let email = normalize_email(&registration.email);
	validate_email(&email)?;
	password::validate_password(&registration.password)?;

	let now = Utc::now();
	let user = User {
		id: Uuid::new_v4(),
		name: name.to_string(),
		email,
		phone: registration.phone.trim().to_string(),
		password_hash: password::hash_password(&registration.password)?,
		role: Role::Customer,
		created_at: now,
		updated_at: now,
	};
	state.store.insert_user(&user).await?;
	info!("registered user {}", user.id);

	Ok((StatusCode::CREATED, Json(session(&state, &user)?)))
}

pub async fn login(State(state): State<AppState>, Json(logins): Json<Logins>) -> AppResult<Json<Session>> {
	let email = normalize_email(&logins.email);
	let Some(user) = state.store.user_by_email(&email).await? else {
		return Err(AppError::Unauthorized);
	};
	if !password::verify_password(&logins.password, &user.password_hash) {
		return Err(AppError::Unauthorized);
	}

	info!("user {} logged in", user.id);
	Ok(Json(session(&state, &user)?))
}

pub async fn me(user: AuthUser) -> Json<Me> {
	Json(Me {
		home_route: user.role().home_route().to_string(),
		user: UserView::from(&user.0),
	})
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn email_needs_both_sides_of_the_at() {
		assert!(validate_email("ram@example.com").is_ok());
		assert!(validate_email("ops@localhost").is_ok());
		assert!(validate_email("@example.com").is_err());
		assert!(validate_email("ram@").is_err());
		assert!(validate_email("ram sharma@example.com").is_err());
		assert!(validate_email("ram.example.com").is_err());
	}
}
