//! stakeindex-core — models, store boundaries, and scan-range math for the
//! confirmed-block replay engine.
//!
//! # Architecture
//!
//! ```text
//! PollScheduler → Replayer      (one task per contract + event family)
//!                    ├── next_scan_range  (confirmation-depth window)
//!                    ├── ChainClient      (head + scoped log stream)
//!                    ├── EventDecoder set (raw log → EventRecord)
//!                    ├── EventStore       (insert-if-absent dedup)
//!                    └── CheckpointStore  (advance after full drain)
//! ```

pub mod checkpoint;
pub mod error;
pub mod range;
pub mod record;

pub use checkpoint::{checkpoint_key, CheckpointStore, MemoryCheckpointStore, SyncCheckpoint};
pub use error::IndexError;
pub use range::{next_scan_range, ScanRange};
pub use record::{ArgumentPayload, EventRecord, EventStore, InsertOutcome};
