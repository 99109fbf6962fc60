//! Database abstraction over SQLite via sqlx.

use std::path::Path;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool};

use crate::error::StoreError;
use crate::replay::SqliteReplayStore;
use crate::trust::SqliteContactStore;

/// Central store handle.  Cheap to clone (Arc internally).
#[derive(Clone)]
pub struct Store {
    pub pool: SqlitePool,
}

impl Store {
    /// Open (or create) the SQLite database at `db_path`.
    /// Runs all pending migrations automatically.
    ///
    /// WAL journal mode and foreign-key enforcement are configured at
    /// connection time, not inside a migration: SQLite forbids changing
    /// `journal_mode` inside a transaction and sqlx wraps every migration
    /// in one.
    pub async fn open(db_path: &Path) -> Result<Self, StoreError> {
        let opts = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .foreign_keys(true);

        let pool = SqlitePool::connect_with(opts).await?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| StoreError::Migration(e.to_string()))?;

        Ok(Self { pool })
    }

    /// Replay-record store backed by this database.
    pub fn replay(&self) -> SqliteReplayStore {
        SqliteReplayStore::new(self.pool.clone())
    }

    /// Contact store backed by this database.
    pub fn contacts(&self) -> SqliteContactStore {
        SqliteContactStore::new(self.pool.clone())
    }
}
