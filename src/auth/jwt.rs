use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use log::debug;
use uuid::Uuid;

use crate::{
	error::{AppError, AppResult},
	users::{Role, User},
};

#[derive(serde::Serialize, serde::Deserialize, Debug, Clone, PartialEq)]
pub struct Claims {
	pub sub: Uuid,
	pub role: Role,
	pub iat: i64,
	pub exp: i64,
}

/// HS256 keys plus the lifetime of issued tokens.
pub struct TokenKeys {
	encoding: EncodingKey,
	decoding: DecodingKey,
	ttl: Duration,
}

impl TokenKeys {
	pub fn new(secret: &str, ttl_hours: i64) -> Self {
		TokenKeys {
			encoding: EncodingKey::from_secret(secret.as_bytes()),
			decoding: DecodingKey::from_secret(secret.as_bytes()),
			ttl: Duration::hours(ttl_hours),
		}
	}

	pub fn issue(&self, user: &User) -> AppResult<String> {
		let now = Utc::now();
		let claims = Claims {
			sub: user.id,
			role: user.role,
			iat: now.timestamp(),
			exp: (now + self.ttl).timestamp(),
		};
		encode(&Header::default(), &claims, &self.encoding).map_err(|err| AppError::Internal(err.to_string()))
	}

	pub fn verify(&self, token: &str) -> AppResult<Claims> {
		decode::<Claims>(token, &self.decoding, &Validation::default())
			.map(|data| data.claims)
			.map_err(|err| {
				debug!("rejected token: {err}");
				AppError::Unauthorized
			})
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn user(role: Role) -> User {
		let now = Utc::now();
		User {
			id: Uuid::new_v4(),
			name: "Sita".to_string(),
			email: "sita@example.com".to_string(),
			phone: "9800000000".to_string(),
			password_hash: String::new(),
			role,
			created_at: now,
			updated_at: now,
		}
	}

	#[test]
	fn issued_token_verifies() {
		let keys = TokenKeys::new("secret", 1);
		let user = user(Role::Vendor);
		let claims = keys.verify(&keys.issue(&user).unwrap()).unwrap();
		assert_eq!(claims.sub, user.id);
		assert_eq!(claims.role, Role::Vendor);
	}

	#[test]
	fn token_from_other_secret_is_rejected() {
		let token = TokenKeys::new("secret", 1).issue(&user(Role::Admin)).unwrap();
		assert!(matches!(TokenKeys::new("other", 1).verify(&token), Err(AppError::Unauthorized)));
	}

	#[test]
	fn expired_token_is_rejected() {
		let keys = TokenKeys::new("secret", -2);
		let token = keys.issue(&user(Role::Customer)).unwrap();
		assert!(keys.verify(&token).is_err());
	}
}
