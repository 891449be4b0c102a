use std::sync::Arc;

use anyhow::Context;
use log::info;
use tokio::net::TcpListener;
use wheelify_server::{
	routes,
	settings::Settings,
	state::AppState,
	store::{MemoryStore, PgStore, Store},
};

async fn shutdown_signal() {
	let ctrl_c = async {
		if let Err(err) = tokio::signal::ctrl_c().await {
			log::error!("failed to listen for ctrl-c: {err}");
		}
	};

	#[cfg(unix)]
	let terminate = async {
		match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
			Ok(mut signal) => {
				signal.recv().await;
			}
			Err(err) => log::error!("failed to listen for SIGTERM: {err}"),
		}
	};

	#[cfg(not(unix))]
	let terminate = std::future::pending::<()>();

	tokio::select! {
		_ = ctrl_c => {},
		_ = terminate => {},
	}
	info!("shutting down");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
	env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

	let settings = Settings::load().context("loading settings")?;

	let store: Arc<dyn Store> = if settings.database.is_memory() {
		info!("using the in-memory store");
		Arc::new(MemoryStore::default())
	} else {
		let store = PgStore::connect(&settings.database.url).await.context("connecting to postgres")?;
		store.migrate().await.context("migrating the database")?;
		Arc::new(store)
	};

	tokio::fs::create_dir_all(&settings.server.upload_dir)
		.await
		.with_context(|| format!("creating {}", settings.server.upload_dir))?;

	let addr = format!("{}:{}", settings.server.host, settings.server.port);
	let state = AppState::new(store, settings);
	state.seed_admin().await.context("seeding the admin account")?;

	let listener = TcpListener::bind(&addr).await.with_context(|| format!("binding {addr}"))?;
	info!("listening on {}", listener.local_addr()?);
	axum::serve(listener, routes::app(state))
		.with_graceful_shutdown(shutdown_signal())
		.await
		.context("serving")?;
	Ok(())
}
