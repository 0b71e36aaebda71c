//! Replay orchestrator — one confirmed-range pass for one (contract, family)
//! pair.
//!
//! A pass reads the head and the pair's checkpoint, derives the confirmed
//! range, drains every family decoder's log stream over that range, and only
//! then advances the checkpoint to the range end. Any RPC, decode, or storage
//! error aborts the pass before the checkpoint moves, so the next pass
//! re-scans the same range and the idempotent insert absorbs the overlap.

use std::sync::Arc;

use alloy_primitives::Address;
use futures::StreamExt;
use tracing::{debug, info};

use stakeindex_core::checkpoint::{checkpoint_key, CheckpointStore};
use stakeindex_core::error::IndexError;
use stakeindex_core::range::{next_scan_range, ScanRange};
use stakeindex_core::record::{EventStore, InsertOutcome};

use crate::client::ChainClient;
use crate::decode::{DecodeOutcome, EventDecoder};

/// One (contract, event-family) replay target.
#[derive(Debug, Clone)]
pub struct ReplayConfig {
    /// Event-family name; forms the checkpoint key together with the
    /// contract address.
    pub family: String,
    /// Contract whose logs are scanned.
    pub contract: Address,
    /// First block to scan when the pair has no checkpoint. Zero means the
    /// genesis block, not "latest".
    pub start_block: u64,
    /// Confirmation depth; 0 and 1 both mean "scan up to the head".
    pub confirmations: u64,
}

/// Counters from one pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassSummary {
    /// The range scanned, or `None` when there was nothing confirmed to do.
    pub scanned: Option<ScanRange>,
    /// Records written for the first time.
    pub inserted: u64,
    /// Records already present from an earlier pass.
    pub duplicates: u64,
    /// Logs whose topic layout did not match an indexed-event decoder.
    pub skipped: u64,
}

/// Runs confirmed-range passes for one pair against injected stores.
pub struct Replayer<C: ChainClient> {
    client: Arc<C>,
    checkpoints: Arc<dyn CheckpointStore>,
    events: Arc<dyn EventStore>,
    config: ReplayConfig,
    decoders: Vec<EventDecoder>,
}

impl<C: ChainClient> Replayer<C> {
    pub fn new(
        client: Arc<C>,
        checkpoints: Arc<dyn CheckpointStore>,
        events: Arc<dyn EventStore>,
        config: ReplayConfig,
        decoders: Vec<EventDecoder>,
    ) -> Self {
        Self {
            client,
            checkpoints,
            events,
            config,
            decoders,
        }
    }

    /// The checkpoint key this pair reads and advances.
    pub fn key(&self) -> String {
        checkpoint_key(&self.config.family, &self.config.contract.to_checksum(None))
    }

    /// Run one pass: scan the currently confirmed range and advance the
    /// checkpoint. Returns without scanning when no confirmed blocks are
    /// pending.
    pub async fn run_pass(&self) -> Result<PassSummary, IndexError> {
        let key = self.key();
        let head = self.client.head_block_number().await?;
        let checkpoint = self.checkpoints.get(&key).await?;

        let Some(range) = next_scan_range(
            checkpoint,
            self.config.start_block,
            self.config.confirmations,
            head,
        ) else {
            debug!(key = %key, head, "no confirmed blocks pending");
            return Ok(PassSummary::default());
        };

        let mut summary = PassSummary {
            scanned: Some(range),
            ..Default::default()
        };

        for decoder in &self.decoders {
            let mut logs = self
                .client
                .filter_logs(self.config.contract, decoder.signature(), range.from, range.to)
                .await?;

            while let Some(log) = logs.next().await {
                let log = log?;
                if log.is_removed() {
                    debug!(tx_hash = %log.tx_hash, "ignoring removed log");
                    continue;
                }

                match decoder.decode(&log)? {
                    DecodeOutcome::Decoded(record) => {
                        match self.events.insert_if_absent(&record).await? {
                            InsertOutcome::Inserted => summary.inserted += 1,
                            InsertOutcome::AlreadyPresent => summary.duplicates += 1,
                        }
                    }
                    DecodeOutcome::Skipped => summary.skipped += 1,
                }
            }
        }

        // Every decoder drained without error; the range is fully recorded.
        self.checkpoints.set(&key, range.to).await?;

        info!(
            key = %key,
            from = range.from,
            to = range.to,
            inserted = summary.inserted,
            duplicates = summary.duplicates,
            skipped = summary.skipped,
            "pass complete"
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use alloy_primitives::{B256, U256};
    use async_trait::async_trait;
    use futures::stream;

    use stakeindex_core::checkpoint::MemoryCheckpointStore;
    use stakeindex_core::record::EventRecord;
    use stakeindex_storage::InMemoryStorage;

    use crate::client::LogStream;
    use crate::decode::{erc20_decoders, staking_decoders, ERC20_FAMILY, STAKING_FAMILY};
    use crate::log::RawLog;

    const CONTRACT: &str = "0xa0b86991c6218b36c1d19d4a2e9eb0ce3606eb48";
    const USER: &str = "0x1111111111111111111111111111111111111111";

    // ─── Scripted chain ──────────────────────────────────────────────────────

    struct MockChain {
        head: u64,
        logs: Vec<RawLog>,
    }

    #[async_trait]
    impl ChainClient for MockChain {
        async fn head_block_number(&self) -> Result<u64, IndexError> {
            Ok(self.head)
        }

        async fn filter_logs(
            &self,
            _contract: Address,
            signature: B256,
            from: u64,
            to: u64,
        ) -> Result<LogStream, IndexError> {
            let matching: Vec<RawLog> = self
                .logs
                .iter()
                .filter(|log| log.topic_b256(0) == Some(signature))
                .filter(|log| (from..=to).contains(&log.block_number_u64()))
                .cloned()
                .collect();
            Ok(stream::iter(matching.into_iter().map(Ok)).boxed())
        }
    }

    struct FailingEventStore;

    #[async_trait]
    impl EventStore for FailingEventStore {
        async fn insert_if_absent(
            &self,
            _record: &EventRecord,
        ) -> Result<InsertOutcome, IndexError> {
            Err(IndexError::Storage("injected write failure".into()))
        }
    }

    // ─── Log builders ────────────────────────────────────────────────────────

    fn address_topic(addr: &str) -> String {
        let addr: Address = addr.parse().unwrap();
        B256::left_padding_from(addr.as_slice()).to_string()
    }

    fn amount_topic(amount: u64) -> String {
        B256::from(U256::from(amount).to_be_bytes::<32>()).to_string()
    }

    fn raw_log(topics: Vec<String>, data: &str, block: u64, tx: &str, index: u32) -> RawLog {
        RawLog {
            address: CONTRACT.into(),
            topics,
            data: data.into(),
            block_number: format!("0x{block:x}"),
            block_hash: "0x0".into(),
            tx_hash: tx.into(),
            log_index: format!("0x{index:x}"),
            removed: Some(false),
        }
    }

    fn staked_log(block: u64, tx: &str, index: u32) -> RawLog {
        raw_log(
            vec![
                EventDecoder::staked().signature().to_string(),
                address_topic(USER),
                amount_topic(1_000),
            ],
            "0x",
            block,
            tx,
            index,
        )
    }

    fn transfer_log(block: u64, tx: &str, index: u32) -> RawLog {
        raw_log(
            vec![
                EventDecoder::erc20_transfer().signature().to_string(),
                address_topic(USER),
                address_topic("0x2222222222222222222222222222222222222222"),
            ],
            "0x0000000000000000000000000000000000000000000000000000000000000064",
            block,
            tx,
            index,
        )
    }

    fn staking_replayer(
        chain: MockChain,
        storage: &Arc<InMemoryStorage>,
        confirmations: u64,
    ) -> Replayer<MockChain> {
        Replayer::new(
            Arc::new(chain),
            storage.clone(),
            storage.clone(),
            ReplayConfig {
                family: STAKING_FAMILY.into(),
                contract: CONTRACT.parse().unwrap(),
                start_block: 100,
                confirmations,
            },
            staking_decoders(),
        )
    }

    // ─── Passes ──────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn fresh_pair_scans_confirmed_range_and_checkpoints() {
        let storage = Arc::new(InMemoryStorage::new());
        let chain = MockChain {
            head: 110,
            logs: vec![
                staked_log(100, "0xa", 0),
                staked_log(106, "0xb", 0),
                // beyond the confirmed range; must wait for a later pass
                staked_log(108, "0xc", 0),
            ],
        };
        let replayer = staking_replayer(chain, &storage, 5);

        let summary = replayer.run_pass().await.unwrap();

        assert_eq!(summary.scanned, Some(ScanRange { from: 100, to: 106 }));
        assert_eq!(summary.inserted, 2);
        assert_eq!(summary.duplicates, 0);
        assert_eq!(storage.event_count(), 2);
        assert_eq!(
            storage.checkpoints().first().map(|c| c.block_number),
            Some(106)
        );
        assert_eq!(replayer.key(), format!("staking:{CONTRACT}"));
    }

    #[tokio::test]
    async fn caught_up_pair_is_a_noop() {
        let storage = Arc::new(InMemoryStorage::new());
        storage.set(&checkpoint_key("staking", CONTRACT), 106).await.unwrap();

        let chain = MockChain { head: 106, logs: vec![] };
        let replayer = staking_replayer(chain, &storage, 5);

        let summary = replayer.run_pass().await.unwrap();

        assert_eq!(summary, PassSummary::default());
        assert_eq!(
            storage.checkpoints().first().map(|c| c.block_number),
            Some(106)
        );
    }

    #[tokio::test]
    async fn rescan_after_checkpoint_reset_inserts_nothing_new() {
        let storage = Arc::new(InMemoryStorage::new());
        let chain = MockChain {
            head: 110,
            logs: vec![staked_log(100, "0xa", 0), staked_log(103, "0xb", 1)],
        };
        let replayer = staking_replayer(chain, &storage, 5);

        let first = replayer.run_pass().await.unwrap();
        assert_eq!(first.inserted, 2);

        storage.delete(&replayer.key()).await.unwrap();

        let second = replayer.run_pass().await.unwrap();
        assert_eq!(second.inserted, 0);
        assert_eq!(second.duplicates, 2);
        assert_eq!(storage.event_count(), 2);
    }

    #[tokio::test]
    async fn same_tx_distinct_log_indices_both_insert() {
        let storage = Arc::new(InMemoryStorage::new());
        let chain = MockChain {
            head: 110,
            logs: vec![staked_log(100, "0xsame", 0), staked_log(100, "0xsame", 1)],
        };
        let replayer = staking_replayer(chain, &storage, 1);

        let summary = replayer.run_pass().await.unwrap();
        assert_eq!(summary.inserted, 2);
    }

    #[tokio::test]
    async fn shape_mismatch_skips_without_failing() {
        let storage = Arc::new(InMemoryStorage::new());
        let chain = MockChain {
            head: 110,
            logs: vec![raw_log(
                vec![EventDecoder::staked().signature().to_string(), address_topic(USER)],
                "0x",
                100,
                "0xa",
                0,
            )],
        };
        let replayer = staking_replayer(chain, &storage, 5);

        let summary = replayer.run_pass().await.unwrap();
        assert_eq!(summary.inserted, 0);
        assert_eq!(summary.skipped, 1);
        assert_eq!(
            storage.checkpoints().first().map(|c| c.block_number),
            Some(106)
        );
    }

    #[tokio::test]
    async fn removed_logs_are_ignored() {
        let storage = Arc::new(InMemoryStorage::new());
        let mut log = staked_log(100, "0xa", 0);
        log.removed = Some(true);

        let chain = MockChain { head: 110, logs: vec![log] };
        let replayer = staking_replayer(chain, &storage, 5);

        let summary = replayer.run_pass().await.unwrap();
        assert_eq!(summary.inserted, 0);
        assert_eq!(summary.skipped, 0);
        assert_eq!(storage.event_count(), 0);
    }

    #[tokio::test]
    async fn decode_error_aborts_before_checkpoint() {
        let storage = Arc::new(InMemoryStorage::new());
        let chain = MockChain {
            head: 110,
            logs: vec![raw_log(
                vec![EventDecoder::reward_rate_updated().signature().to_string()],
                "0x",
                100,
                "0xa",
                0,
            )],
        };
        let replayer = staking_replayer(chain, &storage, 5);

        let err = replayer.run_pass().await.unwrap_err();
        assert!(matches!(err, IndexError::Decode { .. }), "{err}");
        assert!(storage.checkpoints().is_empty());
    }

    #[tokio::test]
    async fn storage_error_aborts_before_checkpoint() {
        let checkpoints = Arc::new(MemoryCheckpointStore::default());
        let chain = MockChain {
            head: 110,
            logs: vec![staked_log(100, "0xa", 0)],
        };
        let replayer = Replayer::new(
            Arc::new(chain),
            checkpoints.clone(),
            Arc::new(FailingEventStore),
            ReplayConfig {
                family: STAKING_FAMILY.into(),
                contract: CONTRACT.parse().unwrap(),
                start_block: 100,
                confirmations: 5,
            },
            staking_decoders(),
        );

        let err = replayer.run_pass().await.unwrap_err();
        assert!(matches!(err, IndexError::Storage(_)), "{err}");
        assert_eq!(checkpoints.get(&replayer.key()).await.unwrap(), None);
    }

    #[tokio::test]
    async fn erc20_pair_checkpoints_under_its_own_family() {
        let storage = Arc::new(InMemoryStorage::new());
        let chain = MockChain {
            head: 110,
            logs: vec![transfer_log(100, "0xa", 0)],
        };
        let replayer = Replayer::new(
            Arc::new(chain),
            storage.clone(),
            storage.clone(),
            ReplayConfig {
                family: ERC20_FAMILY.into(),
                contract: CONTRACT.parse().unwrap(),
                start_block: 100,
                confirmations: 5,
            },
            erc20_decoders(),
        );

        let summary = replayer.run_pass().await.unwrap();
        assert_eq!(summary.inserted, 1);

        let keys: Vec<String> = storage.checkpoints().into_iter().map(|c| c.key).collect();
        assert_eq!(keys, [format!("erc20:{CONTRACT}")]);
        assert_eq!(storage.events_by_name("erc20_transfer").len(), 1);
    }
}
