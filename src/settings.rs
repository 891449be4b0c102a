//! Runtime settings.
//!
//! Values come from an optional `wheelify.toml` in the working directory,
//! overlaid by `WHEELIFY_*` environment variables using `__` between
//! sections, e.g. `WHEELIFY_AUTH__JWT_SECRET`.
use config::{Config, ConfigError, Environment, File};

#[derive(Debug, Clone, serde::Deserialize)]
pub struct Server {
	pub host: String,
	pub port: u16,
	pub upload_dir: String,
	pub max_upload_bytes: usize,
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct Database {
	pub url: String,
}

impl Database {
	pub fn is_memory(&self) -> bool {
		let url = self.url.trim();
		url.is_empty() || url.eq_ignore_ascii_case("memory")
	}
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct Auth {
	pub jwt_secret: String,
	pub token_ttl_hours: i64,
	pub admin_email: Option<String>,
	pub admin_password: Option<String>,
}

/// Merchant credentials and endpoints for eSewa's epay v2 API.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct Esewa {
	pub product_code: String,
	pub secret_key: String,
	pub form_url: String,
	pub status_url: String,
	pub success_url: String,
	pub failure_url: String,
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct Rental {
	pub hold_minutes: i64,
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct Settings {
	pub server: Server,
	pub database: Database,
	pub auth: Auth,
	pub esewa: Esewa,
	pub rental: Rental,
}

impl Settings {
	pub fn load() -> Result<Self, ConfigError> {
		let settings: Settings = Self::builder()?
			.add_source(File::with_name("wheelify").required(false))
			.add_source(Environment::with_prefix("WHEELIFY").prefix_separator("_").separator("__"))
			.build()?
			.try_deserialize()?;

		settings.validate()?;
		Ok(settings)
	}

	fn builder() -> Result<config::builder::ConfigBuilder<config::builder::DefaultState>, ConfigError> {
		Config::builder()
			.set_default("server.host", "0.0.0.0")?
			.set_default("server.port", 4000)?
			.set_default("server.upload_dir", "images")?
			.set_default("server.max_upload_bytes", 10 * 1024 * 1024)?
			.set_default("database.url", "host=localhost user=wheelify dbname=wheelify")?
			.set_default("auth.jwt_secret", "")?
			.set_default("auth.token_ttl_hours", 24)?
			.set_default("esewa.product_code", "EPAYTEST")?
			.set_default("esewa.secret_key", "8gBm/:&EnhH.1/q")?
			.set_default("esewa.form_url", "https://rc-epay.esewa.com.np/api/epay/main/v2/form")?
			.set_default("esewa.status_url", "https://rc.esewa.com.np/api/epay/transaction/status/")?
			.set_default("esewa.success_url", "http://localhost:3000/payment/success")?
			.set_default("esewa.failure_url", "http://localhost:3000/payment/failure")?
			.set_default("rental.hold_minutes", 30)
	}

	fn validate(&self) -> Result<(), ConfigError> {
		if self.auth.jwt_secret.trim().is_empty() {
			return Err(ConfigError::Message("auth.jwt_secret must be set".to_string()));
		}
		if self.auth.token_ttl_hours <= 0 {
			return Err(ConfigError::Message("auth.token_ttl_hours must be positive".to_string()));
		}
		if self.rental.hold_minutes <= 0 {
			return Err(ConfigError::Message("rental.hold_minutes must be positive".to_string()));
		}
		Ok(())
	}

	/// Settings for tests and local demos: in-memory store, eSewa test merchant.
	pub fn for_tests(upload_dir: &str) -> Self {
		Settings {
			server: Server {
				host: "127.0.0.1".to_string(),
				port: 0,
				upload_dir: upload_dir.to_string(),
				max_upload_bytes: 10 * 1024 * 1024,
			},
			database: Database { url: "memory".to_string() },
			auth: Auth {
				jwt_secret: "test-secret".to_string(),
				token_ttl_hours: 1,
				admin_email: None,
				admin_password: None,
			},
			esewa: Esewa {
				product_code: "EPAYTEST".to_string(),
				secret_key: "8gBm/:&EnhH.1/q".to_string(),
				form_url: "https://rc-epay.esewa.com.np/api/epay/main/v2/form".to_string(),
				status_url: "http://127.0.0.1:9/status".to_string(),
				success_url: "http://localhost:3000/payment/success".to_string(),
				failure_url: "http://localhost:3000/payment/failure".to_string(),
			},
			rental: Rental { hold_minutes: 30 },
		}
	}
}
