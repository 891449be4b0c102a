//! Terms and conditions, edited by admins in a rich-text editor.
use axum::{extract::State, Json};
use chrono::{DateTime, Utc};
use log::info;
use postgres_from_row::FromRow;
use uuid::Uuid;

use crate::{
	auth::AuthUser,
	error::{AppError, AppResult},
	state::AppState,
	users::Role,
};

pub const MAX_CONTENT_BYTES: usize = 200 * 1024;

#[derive(serde::Serialize, serde::Deserialize, Debug, Clone, PartialEq, FromRow)]
pub struct Terms {
	pub version: i32,
	pub content: String,
	pub updated_by: Uuid,
	pub updated_at: DateTime<Utc>,
}

#[derive(serde::Deserialize, Debug)]
pub struct TermsUpdate {
	pub content: String,
}

/// Checks editor output before it is published.
pub fn validate_content(content: &str) -> AppResult<&str> {
	let content = content.trim();
	if content.is_empty() {
		return Err(AppError::Unprocessable("terms content must not be empty".to_string()));
	}
	if content.len() > MAX_CONTENT_BYTES {
		return Err(AppError::Unprocessable(format!("terms content exceeds {MAX_CONTENT_BYTES} bytes")));
	}
	if content.to_ascii_lowercase().contains("<script") {
		return Err(AppError::Unprocessable("terms content must not contain scripts".to_string()));
	}
	Ok(content)
}

pub async fn get_terms(State(state): State<AppState>) -> AppResult<Json<Terms>> {
	let terms = state.store.latest_terms().await?.ok_or_else(|| AppError::not_found("terms"))?;
	Ok(Json(terms))
}

pub async fn update_terms(
	State(state): State<AppState>,
	user: AuthUser,
	Json(update): Json<TermsUpdate>,
) -> AppResult<Json<Terms>> {
	user.require(&[Role::Admin])?;
	let content = validate_content(&update.content)?;

	let terms = state.store.save_terms(content, user.id(), Utc::now()).await?;
	info!("terms updated to version {} by {}", terms.version, user.id());
	Ok(Json(terms))
}
