use std::sync::Arc;

use chrono::{Duration, Utc};
use log::info;
use uuid::Uuid;

use crate::{
	auth::{jwt::TokenKeys, password},
	error::AppResult,
	payment_gateway::esewa::EsewaClient,
	settings::Settings,
	store::Store,
	users::{normalize_email, Role, User},
};

#[derive(Clone)]
pub struct AppState {
	pub store: Arc<dyn Store>,
	pub settings: Arc<Settings>,
	pub tokens: Arc<TokenKeys>,
	pub esewa: Arc<EsewaClient>,
}

impl AppState {
	pub fn new(store: Arc<dyn Store>, settings: Settings) -> Self {
		AppState {
			store,
			tokens: Arc::new(TokenKeys::new(&settings.auth.jwt_secret, settings.auth.token_ttl_hours)),
			esewa: Arc::new(EsewaClient::new(settings.esewa.clone())),
			settings: Arc::new(settings),
		}
	}

	pub fn hold_duration(&self) -> Duration {
		Duration::minutes(self.settings.rental.hold_minutes)
	}

	/// Creates the configured admin account unless that email already exists.
	pub async fn seed_admin(&self) -> AppResult<()> {
		let (Some(email), Some(secret)) = (&self.settings.auth.admin_email, &self.settings.auth.admin_password) else {
			return Ok(());
		};
		let email = normalize_email(email);
		if self.store.user_by_email(&email).await?.is_some() {
			return Ok(());
		}

		password::validate_password(secret)?;
		let now = Utc::now();
		let admin = User {
			id: Uuid::new_v4(),
			name: "Administrator".to_string(),
			email,
			phone: String::new(),
			password_hash: password::hash_password(secret)?,
			role: Role::Admin,
			created_at: now,
			updated_at: now,
		};
		self.store.insert_user(&admin).await?;
		info!("seeded admin account {}", admin.email);
		Ok(())
	}
}
