use chrono::{DateTime, Utc};
use postgres_from_row::FromRow;
use uuid::Uuid;

pub mod handlers;

text_enum! {
	pub enum Role {
		Customer => "customer",
		Vendor => "vendor",
		Admin => "admin",
	}
}

impl Role {
	/// Where the frontend's auth guard sends a user after login.
	pub fn home_route(&self) -> &'static str {
		match self {
			Role::Admin => "/admin/dashboard",
			Role::Vendor => "/vendor/dashboard",
			Role::Customer => "/",
		}
	}
}

#[derive(Debug, Clone, FromRow)]
pub struct User {
	pub id: Uuid,
	pub name: String,
	pub email: String,
	pub phone: String,
	pub password_hash: String,
	pub role: Role,
	pub created_at: DateTime<Utc>,
	pub updated_at: DateTime<Utc>,
}

/// What the API shows of a user. Never carries the password hash.
#[derive(serde::Serialize, serde::Deserialize, Debug, Clone, PartialEq)]
pub struct UserView {
	pub id: Uuid,
	pub name: String,
	pub email: String,
	pub phone: String,
	pub role: Role,
	pub created_at: DateTime<Utc>,
}

impl From<&User> for UserView {
	fn from(user: &User) -> Self {
		UserView {
			id: user.id,
			name: user.name.clone(),
			email: user.email.clone(),
			phone: user.phone.clone(),
			role: user.role,
			created_at: user.created_at,
		}
	}
}

pub fn normalize_email(email: &str) -> String {
	email.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn home_route_follows_role() {
		assert_eq!(Role::Admin.home_route(), "/admin/dashboard");
		assert_eq!(Role::Vendor.home_route(), "/vendor/dashboard");
		assert_eq!(Role::Customer.home_route(), "/");
	}

	#[test]
	fn emails_are_trimmed_and_lowercased() {
		assert_eq!(normalize_email("  Ram@Example.COM "), "ram@example.com");
	}
}
