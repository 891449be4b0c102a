use axum::{extract::State, Json};

use crate::{auth::AuthUser, error::AppResult, state::AppState, store::DashboardStats, users::Role};

/// Counts behind the admin dashboard.
pub async fn stats(State(state): State<AppState>, user: AuthUser) -> AppResult<Json<DashboardStats>> {
	user.require(&[Role::Admin])?;
	Ok(Json(state.store.dashboard_stats().await?))
}
