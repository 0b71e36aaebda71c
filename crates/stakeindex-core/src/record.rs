//! Decoded event records and the deduplicating store boundary.
//!
//! Records are append-only: created exactly once per unique on-chain log,
//! never updated or deleted by the engine. Dedup is enforced by the store's
//! insert-if-absent operation on the (tx_hash, log_index) natural key, not
//! by a read-then-write.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::IndexError;

/// Ordered decoded-field map persisted with each record.
///
/// Insertion order is preserved end to end, so stored payloads read the way
/// the decoders emit them: named arguments first, `signature` last.
pub type ArgumentPayload = IndexMap<String, String>;

/// One decoded on-chain event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    /// Transaction hash (`0x…`).
    pub tx_hash: String,
    /// Position of the log within its block.
    pub log_index: u32,
    /// Block containing the log.
    pub block_number: u64,
    /// Canonical event name (e.g. `staked`, `erc20_transfer`).
    pub event_name: String,
    /// Checksummed address of the emitting contract.
    pub contract_address: String,
    /// Decoded arguments plus the `signature` topic hash.
    pub payload: ArgumentPayload,
    /// Insertion timestamp; informational only, never used for ordering.
    pub created_at: DateTime<Utc>,
}

impl EventRecord {
    pub fn new(
        tx_hash: impl Into<String>,
        log_index: u32,
        block_number: u64,
        event_name: impl Into<String>,
        contract_address: impl Into<String>,
        payload: ArgumentPayload,
    ) -> Self {
        Self {
            tx_hash: tx_hash.into(),
            log_index,
            block_number,
            event_name: event_name.into(),
            contract_address: contract_address.into(),
            payload,
            created_at: Utc::now(),
        }
    }
}

/// Result of an idempotent insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    /// The record was new and has been stored.
    Inserted,
    /// A record with the same (tx_hash, log_index) already existed; nothing
    /// was written.
    AlreadyPresent,
}

/// Trait for the append-only deduplicated event log.
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Insert `record` unless a row with the same (tx_hash, log_index)
    /// already exists. Never updates an existing row.
    async fn insert_if_absent(&self, record: &EventRecord) -> Result<InsertOutcome, IndexError>;
}
