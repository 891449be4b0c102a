//! Who is calling, and may they.
use axum::{
	async_trait,
	extract::FromRequestParts,
	http::{header::AUTHORIZATION, request::Parts},
};
use uuid::Uuid;

use crate::{
	error::{AppError, AppResult},
	state::AppState,
	users::{Role, User},
};

pub mod handlers;
pub mod jwt;
pub mod password;

/// The caller behind a valid `Authorization: Bearer` token.
///
/// The role is read from the stored user rather than the token, so a role
/// change applies on the next request.
#[derive(Debug, Clone)]
pub struct AuthUser(pub User);

impl AuthUser {
	pub fn id(&self) -> Uuid {
		self.0.id
	}

	pub fn role(&self) -> Role {
		self.0.role
	}

	pub fn is_admin(&self) -> bool {
		self.0.role == Role::Admin
	}

	pub fn require(&self, roles: &[Role]) -> AppResult<()> {
		if roles.contains(&self.0.role) {
			Ok(())
		} else {
			Err(AppError::forbidden(format!("{} accounts cannot do this", self.0.role)))
		}
	}
}

fn bearer_token(parts: &Parts) -> Option<&str> {
	let value = parts.headers.get(AUTHORIZATION)?.to_str().ok()?;
	let (scheme, token) = value.split_once(' ')?;
	if !scheme.eq_ignore_ascii_case("bearer") {
		return None;
	}
	let token = token.trim();
	(!token.is_empty()).then_some(token)
}

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
	type Rejection = AppError;

	async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
		let token = bearer_token(parts).ok_or(AppError::Unauthorized)?;
		let claims = state.tokens.verify(token)?;
		let user = state.store.user_by_id(claims.sub).await?.ok_or(AppError::Unauthorized)?;
		Ok(AuthUser(user))
	}
}

/// Like [`AuthUser`] but a request without an `Authorization` header is
/// anonymous. A header that fails to authenticate, or a store error while
/// loading the user, still rejects the request.
#[derive(Debug, Clone)]
pub struct MaybeUser(pub Option<AuthUser>);

#[async_trait]
impl FromRequestParts<AppState> for MaybeUser {
	type Rejection = AppError;

	async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
		if !parts.headers.contains_key(AUTHORIZATION) {
			return Ok(MaybeUser(None));
		}
		AuthUser::from_request_parts(parts, state).await.map(|user| MaybeUser(Some(user)))
	}
}

#[cfg(test)]
mod tests {
	use axum::http::Request;

	use super::*;

	fn parts(header: &str) -> Parts {
		let (parts, _) = Request::builder().header(AUTHORIZATION, header).body(()).unwrap().into_parts();
		parts
	}

	#[test]
	fn bearer_scheme_is_case_insensitive() {
		assert_eq!(bearer_token(&parts("bearer abc.def")), Some("abc.def"));
		assert_eq!(bearer_token(&parts("Bearer  abc.def ")), Some("abc.def"));
	}

	#[test]
	fn other_schemes_are_ignored() {
		assert_eq!(bearer_token(&parts("Basic dXNlcjpwYXNz")), None);
		assert_eq!(bearer_token(&parts("Bearer ")), None);
	}
}
