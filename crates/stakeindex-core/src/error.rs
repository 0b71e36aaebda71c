//! Error types for the replay engine.

use thiserror::Error;

/// Errors that can occur during a replay pass.
///
/// Everything here is retryable from the scheduler's point of view: a failed
/// pass leaves the checkpoint untouched and the next tick re-runs the range.
#[derive(Debug, Error)]
pub enum IndexError {
    #[error("RPC error: {0}")]
    Rpc(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Decode error for '{event}': {reason}")]
    Decode { event: String, reason: String },

    #[error("Config error: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}
