use std::ops::Deref;

use log::error;
use tokio::sync::{Mutex, MutexGuard};
use tokio_postgres::{Client, NoTls};

/// Two connections to the same database. Plain statements share `client`;
/// multi-statement transactions take the `writer` connection so nothing
/// else interleaves with them.
pub struct DbClient {
	client: Client,
	writer: Mutex<Client>,
}

impl DbClient {
	pub async fn connect(config: &str) -> Result<Self, tokio_postgres::Error> {
		let client = open(config).await?;
		let writer = open(config).await?;
		Ok(DbClient { client, writer: Mutex::new(writer) })
	}

	pub async fn writer(&self) -> MutexGuard<'_, Client> {
		self.writer.lock().await
	}
}

impl Deref for DbClient {
	type Target = Client;

	fn deref(&self) -> &Self::Target {
		&self.client
	}
}

async fn open(config: &str) -> Result<Client, tokio_postgres::Error> {
	let (client, connection) = tokio_postgres::connect(config, NoTls).await?;

	tokio::spawn(async move {
		if let Err(e) = connection.await {
			error!("Connection error: {}", e);
		}
	});

	Ok(client)
}
