use std::{path::Path, time::Duration};

use sqlx::{
	SqlitePool,
	sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous},
};
use tokio::sync::Mutex;

use crate::{Error, Result};

#[derive(Debug, Clone)]
pub struct StoreOptions {
	pub pool_max_conns: u32,
	pub busy_timeout: Duration,
}
impl StoreOptions {
	pub fn from_config(cfg: &hrag_config::Storage) -> Self {
		Self {
			pool_max_conns: cfg.pool_max_conns,
			busy_timeout: Duration::from_millis(cfg.busy_timeout_ms),
		}
	}
}
impl Default for StoreOptions {
	fn default() -> Self {
		Self { pool_max_conns: 8, busy_timeout: Duration::from_secs(5) }
	}
}

/// Point-lookup store for chunk records, one SQLite file per index.
///
/// The file runs in WAL mode so readers never wait on the writer and never see a partially
/// committed row. Writes from this process additionally go through `writer` so that at most one
/// write transaction is open at a time.
pub struct NodeStore {
	pub pool: SqlitePool,
	pub(crate) writer: Mutex<()>,
}
impl NodeStore {
	/// Opens an existing store. A missing file is `Error::NotFound`.
	pub async fn open(path: &Path, opts: &StoreOptions) -> Result<Self> {
		if !path.is_file() {
			return Err(Error::NotFound(format!("Node store file {path:?} does not exist.")));
		}

		Self::connect(path, opts, false).await
	}

	/// Opens the store, creating the file when it does not exist yet.
	pub async fn create(path: &Path, opts: &StoreOptions) -> Result<Self> {
		Self::connect(path, opts, true).await
	}

	async fn connect(path: &Path, opts: &StoreOptions, create: bool) -> Result<Self> {
		let options = SqliteConnectOptions::new()
			.filename(path)
			.create_if_missing(create)
			.journal_mode(SqliteJournalMode::Wal)
			.synchronous(SqliteSynchronous::Normal)
			.busy_timeout(opts.busy_timeout)
			.pragma("cache_size", "-64000");
		let pool = SqlitePoolOptions::new()
			.max_connections(opts.pool_max_conns.max(1))
			.connect_with(options)
			.await?;

		tracing::debug!(path = %path.display(), "Node store opened.");

		Ok(Self { pool, writer: Mutex::new(()) })
	}

	pub async fn close(&self) {
		self.pool.close().await;
	}
}
