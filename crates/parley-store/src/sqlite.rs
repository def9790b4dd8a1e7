//! `SQLite`-backed store: one JSON-document table over an `r2d2` pool.
//!
//! Documents live in a single `records` table keyed by the scheme in
//! [`crate::keys`]; attribute queries use `json_extract` over the document
//! body. WAL mode and a busy timeout are applied to every pooled
//! connection. All database work runs on the blocking thread pool.

use async_trait::async_trait;
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;

use crate::errors::{Result, StoreError};
use crate::merge::deep_merge;
use crate::store::Store;

/// Alias for the connection pool type.
pub type ConnectionPool = Pool<SqliteConnectionManager>;

/// Configuration for the connection pool.
#[derive(Clone, Debug)]
pub struct SqliteConfig {
    /// Maximum pool size.
    pub pool_size: u32,
    /// Busy timeout in milliseconds.
    pub busy_timeout_ms: u32,
}

impl Default for SqliteConfig {
    fn default() -> Self {
        Self {
            pool_size: 8,
            busy_timeout_ms: 30_000,
        }
    }
}

#[derive(Debug)]
struct PragmaCustomizer {
    busy_timeout_ms: u32,
}

impl r2d2::CustomizeConnection<Connection, rusqlite::Error> for PragmaCustomizer {
    fn on_acquire(&self, conn: &mut Connection) -> std::result::Result<(), rusqlite::Error> {
        conn.execute_batch(&format!(
            "PRAGMA journal_mode = WAL;\
             PRAGMA busy_timeout = {};\
             PRAGMA synchronous = NORMAL;",
            self.busy_timeout_ms
        ))?;
        Ok(())
    }
}

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS records (\
                      key TEXT PRIMARY KEY,\
                      value TEXT NOT NULL\
                      )";

/// `Store` backed by a pooled `SQLite` database.
#[derive(Clone)]
pub struct SqliteStore {
    pool: ConnectionPool,
}

impl SqliteStore {
    /// Open an in-memory database (tests and development).
    pub fn in_memory(config: &SqliteConfig) -> Result<Self> {
        // A shared in-memory db would vanish per-connection; pin the pool
        // to a single connection instead.
        let manager = SqliteConnectionManager::memory();
        Self::build(manager, 1, config.busy_timeout_ms)
    }

    /// Open a file-backed database.
    pub fn open(path: &str, config: &SqliteConfig) -> Result<Self> {
        let manager = SqliteConnectionManager::file(path);
        Self::build(manager, config.pool_size, config.busy_timeout_ms)
    }

    fn build(manager: SqliteConnectionManager, pool_size: u32, busy_timeout_ms: u32) -> Result<Self> {
        let pool = Pool::builder()
            .max_size(pool_size)
            .connection_timeout(std::time::Duration::from_secs(5))
            .connection_customizer(Box::new(PragmaCustomizer { busy_timeout_ms }))
            .build(manager)?;
        let _ = pool.get()?.execute(SCHEMA, [])?;
        Ok(Self { pool })
    }

    async fn with_conn<T, F>(&self, op: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let conn = pool.get()?;
            op(&conn)
        })
        .await
        .map_err(|e| StoreError::Unavailable(format!("blocking task failed: {e}")))?
    }
}

#[async_trait]
impl Store for SqliteStore {
    async fn get(&self, key: &str) -> Result<Option<Value>> {
        let key = key.to_owned();
        self.with_conn(move |conn| {
            let raw: Option<String> = conn
                .query_row("SELECT value FROM records WHERE key = ?1", [&key], |row| {
                    row.get(0)
                })
                .optional()?;
            match raw {
                Some(text) => Ok(Some(serde_json::from_str(&text)?)),
                None => Ok(None),
            }
        })
        .await
    }

    async fn put(&self, key: &str, value: Value) -> Result<()> {
        let key = key.to_owned();
        self.with_conn(move |conn| {
            let text = serde_json::to_string(&value)?;
            let _ = conn.execute(
                "INSERT INTO records (key, value) VALUES (?1, ?2) \
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value",
                params![key, text],
            )?;
            Ok(())
        })
        .await
    }

    async fn update(&self, key: &str, patch: Value) -> Result<Value> {
        let key = key.to_owned();
        self.with_conn(move |conn| {
            let raw: Option<String> = conn
                .query_row("SELECT value FROM records WHERE key = ?1", [&key], |row| {
                    row.get(0)
                })
                .optional()?;
            let Some(text) = raw else {
                return Err(StoreError::KeyNotFound(key));
            };
            let existing: Value = serde_json::from_str(&text)?;
            let merged = deep_merge(existing, patch);
            let _ = conn.execute(
                "UPDATE records SET value = ?2 WHERE key = ?1",
                params![key, serde_json::to_string(&merged)?],
            )?;
            Ok(merged)
        })
        .await
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let key = key.to_owned();
        self.with_conn(move |conn| {
            let affected = conn.execute("DELETE FROM records WHERE key = ?1", [&key])?;
            if affected == 0 {
                return Err(StoreError::KeyNotFound(key));
            }
            Ok(())
        })
        .await
    }

    async fn query_by_attribute(&self, attr: &str, value: &str) -> Result<Vec<Value>> {
        let attr = attr.to_owned();
        let value = value.to_owned();
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT value FROM records \
                 WHERE json_extract(value, '$.' || ?1) = ?2 \
                 ORDER BY key",
            )?;
            let rows = stmt.query_map(params![attr, value], |row| row.get::<_, String>(0))?;
            let mut out = Vec::new();
            for row in rows {
                out.push(serde_json::from_str(&row?)?);
            }
            Ok(out)
        })
        .await
    }
}
