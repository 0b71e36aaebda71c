//! SQLite storage backend.
//!
//! Persists checkpoints and the deduplicated event log to a single SQLite
//! file. Uses `sqlx` with WAL mode for concurrent read performance; the
//! (tx_hash, log_index) unique constraint backs the idempotent insert.
//!
//! # Usage
//! ```rust,no_run
//! use stakeindex_storage::sqlite::SqliteStorage;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! // File-backed (persistent)
//! let store = SqliteStorage::open("./stakeindex.db").await?;
//!
//! // In-memory (tests / ephemeral)
//! let store = SqliteStorage::in_memory().await?;
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Row, SqlitePool};
use tracing::debug;

use stakeindex_core::checkpoint::{CheckpointStore, SyncCheckpoint};
use stakeindex_core::error::IndexError;
use stakeindex_core::record::{ArgumentPayload, EventRecord, EventStore, InsertOutcome};

/// SQLite-backed storage for checkpoints and event records.
pub struct SqliteStorage {
    pool: SqlitePool,
}

impl SqliteStorage {
    /// Open (or create) a SQLite database at `path`.
    ///
    /// The path may be a plain file path (`"./stakeindex.db"`) or a full
    /// SQLite URL (`"sqlite:./stakeindex.db?mode=rwc"`).
    pub async fn open(path: &str) -> Result<Self, IndexError> {
        let url = if path.starts_with("sqlite:") {
            path.to_string()
        } else {
            format!("sqlite:{path}?mode=rwc")
        };

        let pool = SqlitePool::connect(&url)
            .await
            .map_err(|e| IndexError::Storage(e.to_string()))?;

        let storage = Self { pool };
        storage.init_schema().await?;
        Ok(storage)
    }

    /// Open an in-memory SQLite database.
    ///
    /// All data is lost when the pool is dropped. Ideal for tests. Limited
    /// to one connection: each in-memory connection is its own database.
    pub async fn in_memory() -> Result<Self, IndexError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .map_err(|e| IndexError::Storage(e.to_string()))?;

        let storage = Self { pool };
        storage.init_schema().await?;
        Ok(storage)
    }

    /// Create tables and enable WAL mode.
    async fn init_schema(&self) -> Result<(), IndexError> {
        sqlx::query("PRAGMA journal_mode=WAL;")
            .execute(&self.pool)
            .await
            .map_err(|e| IndexError::Storage(e.to_string()))?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS sync_checkpoints (
                key          TEXT    PRIMARY KEY,
                block_number INTEGER NOT NULL,
                updated_at   INTEGER NOT NULL
            );",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| IndexError::Storage(e.to_string()))?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS event_log (
                id               INTEGER PRIMARY KEY AUTOINCREMENT,
                tx_hash          TEXT    NOT NULL,
                log_index        INTEGER NOT NULL,
                block_number     INTEGER NOT NULL,
                event_name       TEXT    NOT NULL,
                contract_address TEXT    NOT NULL,
                event_args       TEXT    NOT NULL,
                created_at       TEXT    NOT NULL,
                UNIQUE (tx_hash, log_index)
            );",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| IndexError::Storage(e.to_string()))?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_event_log_name ON event_log (event_name);")
            .execute(&self.pool)
            .await
            .map_err(|e| IndexError::Storage(e.to_string()))?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_event_log_block ON event_log (block_number);")
            .execute(&self.pool)
            .await
            .map_err(|e| IndexError::Storage(e.to_string()))?;

        Ok(())
    }

    // ─── Query helpers ───────────────────────────────────────────────────────────

    /// All stored checkpoints, sorted by key.
    pub async fn checkpoints(&self) -> Result<Vec<SyncCheckpoint>, IndexError> {
        let rows = sqlx::query(
            "SELECT key, block_number, updated_at FROM sync_checkpoints ORDER BY key",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| IndexError::Storage(e.to_string()))?;

        Ok(rows
            .into_iter()
            .map(|r| SyncCheckpoint {
                key: r.get("key"),
                block_number: r.get::<i64, _>("block_number") as u64,
                updated_at: r.get("updated_at"),
            })
            .collect())
    }

    /// All records for one event name, ordered by (block, log index).
    pub async fn events_by_name(&self, event_name: &str) -> Result<Vec<EventRecord>, IndexError> {
        let rows = sqlx::query(
            "SELECT tx_hash, log_index, block_number, event_name, contract_address,
                    event_args, created_at
             FROM event_log WHERE event_name = ? ORDER BY block_number, log_index",
        )
        .bind(event_name)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| IndexError::Storage(e.to_string()))?;

        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            let args: String = row.get("event_args");
            let payload: ArgumentPayload = serde_json::from_str(&args).unwrap_or_default();

            records.push(EventRecord {
                tx_hash: row.get("tx_hash"),
                log_index: row.get::<i64, _>("log_index") as u32,
                block_number: row.get::<i64, _>("block_number") as u64,
                event_name: row.get("event_name"),
                contract_address: row.get("contract_address"),
                payload,
                created_at: row.get::<DateTime<Utc>, _>("created_at"),
            });
        }
        Ok(records)
    }

    /// Total number of stored records.
    pub async fn event_count(&self) -> Result<u64, IndexError> {
        let row = sqlx::query("SELECT COUNT(*) AS cnt FROM event_log")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| IndexError::Storage(e.to_string()))?;

        let cnt: i64 = row.get("cnt");
        Ok(cnt as u64)
    }

    /// Per-event-name record counts, sorted by name.
    pub async fn event_counts(&self) -> Result<Vec<(String, u64)>, IndexError> {
        let rows = sqlx::query(
            "SELECT event_name, COUNT(*) AS cnt FROM event_log
             GROUP BY event_name ORDER BY event_name",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| IndexError::Storage(e.to_string()))?;

        Ok(rows
            .into_iter()
            .map(|r| (r.get("event_name"), r.get::<i64, _>("cnt") as u64))
            .collect())
    }
}

// ─── CheckpointStore impl ────────────────────────────────────────────────────

#[async_trait]
impl CheckpointStore for SqliteStorage {
    async fn get(&self, key: &str) -> Result<Option<u64>, IndexError> {
        let row = sqlx::query("SELECT block_number FROM sync_checkpoints WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| IndexError::Storage(e.to_string()))?;

        Ok(row.map(|r| r.get::<i64, _>("block_number") as u64))
    }

    async fn set(&self, key: &str, block_number: u64) -> Result<(), IndexError> {
        sqlx::query(
            "INSERT OR REPLACE INTO sync_checkpoints (key, block_number, updated_at)
             VALUES (?, ?, ?)",
        )
        .bind(key)
        .bind(block_number as i64)
        .bind(Utc::now().timestamp())
        .execute(&self.pool)
        .await
        .map_err(|e| IndexError::Storage(e.to_string()))?;

        debug!(key, block = block_number, "checkpoint saved");
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), IndexError> {
        sqlx::query("DELETE FROM sync_checkpoints WHERE key = ?")
            .bind(key)
            .execute(&self.pool)
            .await
            .map_err(|e| IndexError::Storage(e.to_string()))?;

        Ok(())
    }
}

// ─── EventStore impl ─────────────────────────────────────────────────────────

#[async_trait]
impl EventStore for SqliteStorage {
    async fn insert_if_absent(&self, record: &EventRecord) -> Result<InsertOutcome, IndexError> {
        let args = serde_json::to_string(&record.payload)
            .map_err(|e| IndexError::Storage(e.to_string()))?;

        let result = sqlx::query(
            "INSERT OR IGNORE INTO event_log
             (tx_hash, log_index, block_number, event_name, contract_address,
              event_args, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&record.tx_hash)
        .bind(record.log_index as i64)
        .bind(record.block_number as i64)
        .bind(&record.event_name)
        .bind(&record.contract_address)
        .bind(&args)
        .bind(record.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| IndexError::Storage(e.to_string()))?;

        if result.rows_affected() == 1 {
            debug!(
                event = %record.event_name,
                block = record.block_number,
                tx = %record.tx_hash,
                log_index = record.log_index,
                "event stored"
            );
            Ok(InsertOutcome::Inserted)
        } else {
            Ok(InsertOutcome::AlreadyPresent)
        }
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
