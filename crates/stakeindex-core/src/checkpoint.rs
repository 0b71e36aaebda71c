//! Sync checkpoints — durable per-(event-family, contract) replay positions.
//!
//! A checkpoint records the last block whose full event set for one family
//! has been durably recorded. On restart the engine resumes from
//! `block_number + 1` rather than re-scanning from the configured start.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::IndexError;

/// Builds the store key for one (event-family, contract) pair.
///
/// The contract address is lowercased so differently-checksummed inputs map
/// to the same key.
pub fn checkpoint_key(family: &str, contract_address: &str) -> String {
    format!("{family}:{}", contract_address.to_lowercase())
}

/// A persisted replay position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncCheckpoint {
    /// Composite key, see [`checkpoint_key`].
    pub key: String,
    /// Last block whose events for this family are fully recorded.
    pub block_number: u64,
    /// Unix timestamp of the last advance.
    pub updated_at: i64,
}

/// Trait for storing and loading replay positions.
///
/// `set` must be safe under concurrent calls with distinct keys; the engine
/// never runs two concurrent passes for the same key. `block_number` only
/// ever moves forward during normal operation — `delete` exists for the
/// explicit replay-from-scratch path.
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// Last recorded block for `key`, or `None` for a fresh key.
    async fn get(&self, key: &str) -> Result<Option<u64>, IndexError>;

    /// Record `block_number` as the new position for `key` (upsert).
    async fn set(&self, key: &str, block_number: u64) -> Result<(), IndexError>;

    /// Remove the position for `key`, forcing the next pass to start over
    /// from the configured start block.
    async fn delete(&self, key: &str) -> Result<(), IndexError>;
}

// ─── In-memory store (for testing) ────────────────────────────────────────────

use std::collections::HashMap;
use std::sync::Mutex;

/// In-memory checkpoint store for tests and ephemeral runs.
#[derive(Default)]
pub struct MemoryCheckpointStore {
    data: Mutex<HashMap<String, u64>>,
}

impl MemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CheckpointStore for MemoryCheckpointStore {
    async fn get(&self, key: &str) -> Result<Option<u64>, IndexError> {
        Ok(self.data.lock().unwrap().get(key).copied())
    }

    async fn set(&self, key: &str, block_number: u64) -> Result<(), IndexError> {
        self.data.lock().unwrap().insert(key.to_string(), block_number);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), IndexError> {
        self.data.lock().unwrap().remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_lowercases_address() {
        let key = checkpoint_key("staking", "0xAbC1230000000000000000000000000000000DEF");
        assert_eq!(key, "staking:0xabc1230000000000000000000000000000000def");

        // Checksummed and lowercased inputs agree
        assert_eq!(
            checkpoint_key("erc20", "0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48"),
            checkpoint_key("erc20", "0xa0b86991c6218b36c1d19d4a2e9eb0ce3606eb48"),
        );
    }

    #[test]
    fn keys_distinct_per_family() {
        let addr = "0xa0b86991c6218b36c1d19d4a2e9eb0ce3606eb48";
        assert_ne!(checkpoint_key("staking", addr), checkpoint_key("erc20", addr));
    }

    #[tokio::test]
    async fn memory_store_roundtrip() {
        let store = MemoryCheckpointStore::new();
        let key = checkpoint_key("staking", "0xabc");

        assert!(store.get(&key).await.unwrap().is_none());

        store.set(&key, 106).await.unwrap();
        assert_eq!(store.get(&key).await.unwrap(), Some(106));

        store.set(&key, 200).await.unwrap();
        assert_eq!(store.get(&key).await.unwrap(), Some(200));
    }

    #[tokio::test]
    async fn memory_store_delete() {
        let store = MemoryCheckpointStore::new();
        store.set("staking:0xabc", 50).await.unwrap();
        store.delete("staking:0xabc").await.unwrap();
        assert!(store.get("staking:0xabc").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn memory_store_keys_are_independent() {
        let store = MemoryCheckpointStore::new();
        store.set("staking:0xaaa", 10).await.unwrap();
        store.set("erc20:0xaaa", 20).await.unwrap();

        assert_eq!(store.get("staking:0xaaa").await.unwrap(), Some(10));
        assert_eq!(store.get("erc20:0xaaa").await.unwrap(), Some(20));
    }
}
