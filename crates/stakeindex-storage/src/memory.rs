//! In-memory storage backend.
//!
//! Keeps checkpoints and event records in RAM. Useful for tests and
//! short-lived runs that do not need persistence.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

use stakeindex_core::checkpoint::{CheckpointStore, SyncCheckpoint};
use stakeindex_core::error::IndexError;
use stakeindex_core::record::{EventRecord, EventStore, InsertOutcome};

/// In-memory backend implementing both store boundaries.
///
/// All data is lost when the value is dropped.
#[derive(Default)]
pub struct InMemoryStorage {
    checkpoints: Mutex<HashMap<String, SyncCheckpoint>>,
    events: Mutex<Vec<EventRecord>>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// All stored checkpoints, sorted by key.
    pub fn checkpoints(&self) -> Vec<SyncCheckpoint> {
        let mut rows: Vec<_> = self.checkpoints.lock().unwrap().values().cloned().collect();
        rows.sort_by(|a, b| a.key.cmp(&b.key));
        rows
    }

    /// All records for one event name, ordered by (block, log index).
    pub fn events_by_name(&self, event_name: &str) -> Vec<EventRecord> {
        let mut rows: Vec<_> = self
            .events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.event_name == event_name)
            .cloned()
            .collect();
        rows.sort_by_key(|e| (e.block_number, e.log_index));
        rows
    }

    /// Total number of stored records.
    pub fn event_count(&self) -> usize {
        self.events.lock().unwrap().len()
    }
}

#[async_trait]
impl CheckpointStore for InMemoryStorage {
    async fn get(&self, key: &str) -> Result<Option<u64>, IndexError> {
        Ok(self.checkpoints.lock().unwrap().get(key).map(|c| c.block_number))
    }

    async fn set(&self, key: &str, block_number: u64) -> Result<(), IndexError> {
        let cp = SyncCheckpoint {
            key: key.to_string(),
            block_number,
            updated_at: chrono::Utc::now().timestamp(),
        };
        self.checkpoints.lock().unwrap().insert(cp.key.clone(), cp);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), IndexError> {
        self.checkpoints.lock().unwrap().remove(key);
        Ok(())
    }
}

#[async_trait]
impl EventStore for InMemoryStorage {
    async fn insert_if_absent(&self, record: &EventRecord) -> Result<InsertOutcome, IndexError> {
        let mut events = self.events.lock().unwrap();
        let exists = events
            .iter()
            .any(|e| e.tx_hash == record.tx_hash && e.log_index == record.log_index);
        if exists {
            return Ok(InsertOutcome::AlreadyPresent);
        }
        events.push(record.clone());
        Ok(InsertOutcome::Inserted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stakeindex_core::record::ArgumentPayload;

    fn sample_record(tx: &str, log_index: u32, block: u64, name: &str) -> EventRecord {
        let mut payload = ArgumentPayload::new();
        payload.insert("user".into(), "0x1111111111111111111111111111111111111111".into());
        payload.insert("amount".into(), block.to_string());
        payload.insert("signature".into(), "0xdead".into());
        EventRecord::new(
            tx,
            log_index,
            block,
            name,
            "0x2222222222222222222222222222222222222222",
            payload,
        )
    }

    #[tokio::test]
    async fn insert_if_absent_deduplicates() {
        let store = InMemoryStorage::new();
        let record = sample_record("0xaaa", 0, 100, "staked");

        assert_eq!(store.insert_if_absent(&record).await.unwrap(), InsertOutcome::Inserted);
        assert_eq!(
            store.insert_if_absent(&record).await.unwrap(),
            InsertOutcome::AlreadyPresent
        );
        assert_eq!(store.event_count(), 1);
    }

    #[tokio::test]
    async fn same_tx_distinct_log_indices_both_stored() {
        let store = InMemoryStorage::new();
        let first = sample_record("0xaaa", 0, 100, "staked");
        let second = sample_record("0xaaa", 1, 100, "withdrawn");

        assert_eq!(store.insert_if_absent(&first).await.unwrap(), InsertOutcome::Inserted);
        assert_eq!(store.insert_if_absent(&second).await.unwrap(), InsertOutcome::Inserted);
        assert_eq!(store.event_count(), 2);
    }

    #[tokio::test]
    async fn events_by_name_ordered_by_block_then_index() {
        let store = InMemoryStorage::new();
        store.insert_if_absent(&sample_record("0xccc", 2, 102, "staked")).await.unwrap();
        store.insert_if_absent(&sample_record("0xaaa", 1, 100, "staked")).await.unwrap();
        store.insert_if_absent(&sample_record("0xbbb", 0, 100, "staked")).await.unwrap();
        store.insert_if_absent(&sample_record("0xddd", 0, 101, "withdrawn")).await.unwrap();

        let staked = store.events_by_name("staked");
        assert_eq!(staked.len(), 3);
        assert_eq!(
            staked.iter().map(|e| (e.block_number, e.log_index)).collect::<Vec<_>>(),
            [(100, 0), (100, 1), (102, 2)]
        );
    }

    #[tokio::test]
    async fn checkpoint_listing_sorted() {
        let store = InMemoryStorage::new();
        store.set("staking:0xbbb", 10).await.unwrap();
        store.set("erc20:0xaaa", 20).await.unwrap();

        let rows = store.checkpoints();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].key, "erc20:0xaaa");
        assert_eq!(rows[1].key, "staking:0xbbb");
    }
}
