//! stakeindex-evm — chain client, event decoders, replay orchestrator, and
//! poll scheduler for the confirmed-block replay engine.

pub mod client;
pub mod decode;
pub mod log;
pub mod poller;
pub mod replay;

pub use client::{ChainClient, EthClientConfig, EthRpcClient, LogStream};
pub use decode::{
    erc20_decoders, staking_decoders, DecodeOutcome, EventDecoder, ERC20_FAMILY, STAKING_FAMILY,
};
pub use log::RawLog;
pub use poller::PollScheduler;
pub use replay::{PassSummary, ReplayConfig, Replayer};
