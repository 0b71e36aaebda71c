//! Raw EVM logs as returned by `eth_getLogs`, with typed accessors.

use alloy_primitives::{Address, B256};
use serde::{Deserialize, Serialize};

/// A raw EVM log in wire shape: all positional fields hex-encoded strings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawLog {
    pub address: String,
    pub topics: Vec<String>,
    pub data: String,
    #[serde(rename = "blockNumber")]
    pub block_number: String,
    #[serde(rename = "blockHash")]
    pub block_hash: String,
    #[serde(rename = "transactionHash")]
    pub tx_hash: String,
    #[serde(rename = "logIndex")]
    pub log_index: String,
    #[serde(rename = "removed")]
    pub removed: Option<bool>,
}

impl RawLog {
    /// Returns the block number as u64.
    pub fn block_number_u64(&self) -> u64 {
        parse_hex_u64(&self.block_number)
    }

    /// Returns the log index as u32.
    pub fn log_index_u32(&self) -> u32 {
        parse_hex_u64(&self.log_index) as u32
    }

    /// Returns `true` if this log was removed by a reorg.
    pub fn is_removed(&self) -> bool {
        self.removed.unwrap_or(false)
    }

    /// Topic at position `i` as a 32-byte word, if present and well-formed.
    pub fn topic_b256(&self, i: usize) -> Option<B256> {
        let raw = self.topics.get(i)?;
        let bytes = hex::decode(raw.strip_prefix("0x").unwrap_or(raw)).ok()?;
        if bytes.len() != 32 {
            return None;
        }
        Some(B256::from_slice(&bytes))
    }

    /// The non-indexed data section as bytes, if the hex is well-formed.
    pub fn data_bytes(&self) -> Option<Vec<u8>> {
        let raw = self.data.strip_prefix("0x").unwrap_or(&self.data);
        hex::decode(raw).ok()
    }

    /// The emitting contract address, if the wire string parses.
    pub fn emitter(&self) -> Option<Address> {
        let raw = self.address.strip_prefix("0x").unwrap_or(&self.address);
        let bytes = hex::decode(raw).ok()?;
        if bytes.len() != 20 {
            return None;
        }
        Some(Address::from_slice(&bytes))
    }
}

/// Parse a hex-encoded string (with or without `0x`) to u64.
pub fn parse_hex_u64(s: &str) -> u64 {
    let s = s.strip_prefix("0x").unwrap_or(s);
    u64::from_str_radix(s, 16).unwrap_or(0)
}
