//! Scan-range math — decides which block range is safe to replay.
//!
//! The upper bound lags the chain head by `confirmations - 1` blocks so a
//! freshly mined block is never indexed before it has accumulated the
//! configured confirmations. A block just mined can still be orphaned by a
//! fork; the lag makes stale data exponentially unlikely without tracking
//! forks explicitly.

use serde::{Deserialize, Serialize};

/// An inclusive block range scheduled for one replay pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanRange {
    /// First block to scan (inclusive).
    pub from: u64,
    /// Last block to scan (inclusive).
    pub to: u64,
}

impl ScanRange {
    /// Number of blocks covered.
    pub fn block_count(&self) -> u64 {
        self.to - self.from + 1
    }
}

/// Computes the next safe scan range, or `None` when there is nothing to do.
///
/// The lower bound resumes one past `checkpoint`, or at `start_block` for a
/// fresh key (a configured start of 0 scans from block 0). The upper bound
/// is `head` itself when `confirmations <= 1`, otherwise
/// `head - (confirmations - 1)`; a head still inside the confirmation window
/// produces `None` rather than an underflowed range.
pub fn next_scan_range(
    checkpoint: Option<u64>,
    start_block: u64,
    confirmations: u64,
    head: u64,
) -> Option<ScanRange> {
    let from = match checkpoint {
        Some(last) => last.saturating_add(1),
        None => start_block,
    };

    // confirmations = 0 behaves as 1: no lag.
    let lag = confirmations.max(1) - 1;
    if head < lag {
        return None;
    }
    let to = head - lag;

    if from > to {
        return None;
    }
    Some(ScanRange { from, to })
}
