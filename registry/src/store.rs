//! Connection registry storage.
//!
//! Entries live in a single SQLite table keyed by alias. Every mutation is
//! written through before the call returns.

use std::str::FromStr;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};

use common::errors::{AppError, AppResult};
use common::models::{AliasSummary, ConnectionEntry, ConnectionParams, EngineKind};

/// Keyed persistent store of connection entries.
///
/// No validation happens here; callers build parameters first.
#[async_trait]
pub trait ConnectionStore: Send + Sync {
    /// Inserts `entry`, replacing any entry with the same alias. Last writer wins.
    async fn upsert(&self, entry: &ConnectionEntry) -> AppResult<()>;

    /// Deletes `alias`. Returns whether an entry existed.
    async fn remove(&self, alias: &str) -> AppResult<bool>;

    async fn get(&self, alias: &str) -> AppResult<Option<ConnectionEntry>>;

    /// All aliases with their stored engine type, ordered by alias.
    async fn list_all(&self) -> AppResult<Vec<AliasSummary>>;
}

/// Row from the `connections` table.
#[derive(sqlx::FromRow)]
struct ConnectionRow {
    alias: String,
    db_type: String,
    params_json: String,
}

impl ConnectionRow {
    fn into_entry(self) -> AppResult<ConnectionEntry> {
        let kind = EngineKind::from_str(&self.db_type)?;
        let parameters = ConnectionParams::from_json(kind, &self.params_json).map_err(|e| {
            AppError::Storage(format!(
                "Stored parameters for '{}' are not a valid {} entry: {}",
                self.alias, kind, e
            ))
        })?;
        ConnectionEntry::new(self.alias, kind, parameters)
    }
}

/// SQLite-backed [`ConnectionStore`].
pub struct SqliteConnectionStore {
    pool: SqlitePool,
}

impl SqliteConnectionStore {
    /// Opens (creating if absent) the registry database at `url` and ensures
    /// the schema exists.
    pub async fn open(url: &str) -> AppResult<Self> {
        let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);

        // A single long-lived connection serialises writes and keeps an
        // in-memory database alive for the lifetime of the store.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        let store = Self { pool };
        store.ensure_table().await?;
        tracing::debug!(url = %url, "Connection registry opened");
        Ok(store)
    }

    /// Opens a throwaway in-memory registry.
    pub async fn in_memory() -> AppResult<Self> {
        Self::open("sqlite::memory:").await
    }

    async fn ensure_table(&self) -> AppResult<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS connections (
                alias       TEXT PRIMARY KEY,
                db_type     TEXT NOT NULL,
                params_json TEXT NOT NULL
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::Storage(format!("Failed to create connections table: {}", e)))?;
        Ok(())
    }
}

#[async_trait]
impl ConnectionStore for SqliteConnectionStore {
    async fn upsert(&self, entry: &ConnectionEntry) -> AppResult<()> {
        let params_json = entry
            .parameters
            .to_json()
            .map_err(|e| AppError::Storage(format!("Failed to encode parameters: {}", e)))?;

        sqlx::query(
            "INSERT OR REPLACE INTO connections (alias, db_type, params_json) VALUES (?, ?, ?)",
        )
        .bind(&entry.alias)
        .bind(entry.engine_kind.as_str())
        .bind(params_json)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::Storage(format!("Failed to save connection: {}", e)))?;
        Ok(())
    }

    async fn remove(&self, alias: &str) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM connections WHERE alias = ?")
            .bind(alias)
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::Storage(format!("Failed to delete connection: {}", e)))?;
        Ok(result.rows_affected() > 0)
    }

    async fn get(&self, alias: &str) -> AppResult<Option<ConnectionEntry>> {
        let row = sqlx::query_as::<_, ConnectionRow>(
            "SELECT alias, db_type, params_json FROM connections WHERE alias = ?",
        )
        .bind(alias)
        .fetch_optional(&self.pool)
        .await?;

        row.map(ConnectionRow::into_entry).transpose()
    }

    async fn list_all(&self) -> AppResult<Vec<AliasSummary>> {
        let rows: Vec<(String, String)> =
            sqlx::query_as("SELECT alias, db_type FROM connections ORDER BY alias")
                .fetch_all(&self.pool)
                .await?;

        Ok(rows
            .into_iter()
            .map(|(alias, engine_kind)| AliasSummary { alias, engine_kind })
            .collect())
    }
}
