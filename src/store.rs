use crate::types::{Result, SeenItemRecord};
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::collections::HashSet;
use std::path::Path;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Durable lookup over already-reported items. Keys are content hashes and
/// normalized URLs; `batch_insert` must be all-or-nothing so an interrupted
/// run never leaves partial seen-state behind.
#[async_trait]
pub trait SeenStore: Send + Sync {
    async fn contains(&self, key: &str) -> Result<bool>;

    async fn batch_insert(&self, records: &[SeenItemRecord]) -> Result<()>;
}

/// SQLite-backed store. One row per identity key; inserting the same key
/// twice is a no-op, so the record set only grows.
pub struct SqliteSeenStore {
    pool: SqlitePool,
}

impl SqliteSeenStore {
    pub async fn open(path: &Path) -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new().connect_with(options).await?;
        let store = Self { pool };
        store.init_schema().await?;
        info!("Seen store ready at {}", path.display());
        Ok(store)
    }

    /// In-process database, used by tests.
    pub async fn open_in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;
        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    async fn init_schema(&self) -> Result<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS seen_keys (
                key TEXT PRIMARY KEY,
                content_hash TEXT NOT NULL,
                url TEXT NOT NULL,
                first_seen_at TEXT NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl SeenStore for SqliteSeenStore {
    async fn contains(&self, key: &str) -> Result<bool> {
        let row = sqlx::query("SELECT 1 FROM seen_keys WHERE key = ?1 LIMIT 1")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }

    async fn batch_insert(&self, records: &[SeenItemRecord]) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        for record in records {
            for key in record.keys() {
                sqlx::query(
                    "INSERT OR IGNORE INTO seen_keys (key, content_hash, url, first_seen_at)
                     VALUES (?1, ?2, ?3, ?4)",
                )
                .bind(key)
                .bind(&record.content_hash)
                .bind(&record.url)
                .bind(record.first_seen_at.to_rfc3339())
                .execute(&mut *tx)
                .await?;
            }
        }
        tx.commit().await?;
        debug!("Committed {} seen records", records.len());
        Ok(())
    }
}

/// In-memory store for tests and dry runs without a database file.
#[derive(Default)]
pub struct MemorySeenStore {
    keys: RwLock<HashSet<String>>,
    records: RwLock<Vec<SeenItemRecord>>,
}

impl MemorySeenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn record_count(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn key_count(&self) -> usize {
        self.keys.read().await.len()
    }
}

#[async_trait]
impl SeenStore for MemorySeenStore {
    async fn contains(&self, key: &str) -> Result<bool> {
        Ok(self.keys.read().await.contains(key))
    }

    async fn batch_insert(&self, records: &[SeenItemRecord]) -> Result<()> {
        let mut keys = self.keys.write().await;
        let mut stored = self.records.write().await;
        for record in records {
            for key in record.keys() {
                keys.insert(key.to_string());
            }
            stored.push(record.clone());
        }
        Ok(())
    }
}
