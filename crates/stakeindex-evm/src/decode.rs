//! Event decoders — normalize raw logs into canonical event records.
//!
//! Two raw-log shapes occur. The staking contract emits its user events with
//! the address and amount as indexed topics; the reward-rate update and the
//! ERC-20 events carry their value in the data section. Amounts are always
//! rendered as decimal strings so full 256-bit values survive storage.
//!
//! Shape mismatches are handled differently per shape: an indexed event with
//! too few topics is skipped (the log belongs to another signature layout),
//! while a data-section mismatch is a hard error, since it means the decoder
//! is registered against the wrong ABI.

use alloy_primitives::{keccak256, Address, B256, U256};

use stakeindex_core::error::IndexError;
use stakeindex_core::record::{ArgumentPayload, EventRecord};

use crate::log::RawLog;

/// Canonical event-family names used in checkpoint keys.
pub const STAKING_FAMILY: &str = "staking";
pub const ERC20_FAMILY: &str = "erc20";

/// Result of decoding one raw log.
#[derive(Debug)]
pub enum DecodeOutcome {
    /// The log matched and produced a record.
    Decoded(EventRecord),
    /// The log shape did not match (indexed events only); ignored without
    /// failing the pass.
    Skipped,
}

/// How a decoder reads topics and data for its event type.
#[derive(Debug, Clone, Copy)]
enum EventShape {
    /// topics[1] = address (low 20 bytes), topics[2] = amount.
    IndexedAmount { actor: &'static str },
    /// Single uint256 in the data section.
    DataAmount { field: &'static str },
    /// topics[1] and topics[2] = addresses, uint256 value in data.
    AddressPair {
        first: &'static str,
        second: &'static str,
        value: &'static str,
    },
}

/// Decoder for one event type: the topic0 to match plus the shape to decode.
#[derive(Debug, Clone)]
pub struct EventDecoder {
    name: &'static str,
    signature: B256,
    shape: EventShape,
}

impl EventDecoder {
    fn new(name: &'static str, abi_signature: &str, shape: EventShape) -> Self {
        Self {
            name,
            signature: keccak256(abi_signature.as_bytes()),
            shape,
        }
    }

    pub fn staked() -> Self {
        Self::new(
            "staked",
            "Staked(address,uint256)",
            EventShape::IndexedAmount { actor: "user" },
        )
    }

    pub fn withdrawn() -> Self {
        Self::new(
            "withdrawn",
            "Withdrawn(address,uint256)",
            EventShape::IndexedAmount { actor: "user" },
        )
    }

    pub fn rewards_claimed() -> Self {
        Self::new(
            "rewards_claimed",
            "RewardsClaimed(address,uint256)",
            EventShape::IndexedAmount { actor: "user" },
        )
    }

    pub fn reward_rate_updated() -> Self {
        Self::new(
            "reward_rate_updated",
            "RewardRateUpdated(uint256)",
            EventShape::DataAmount {
                field: "new_reward_rate",
            },
        )
    }

    pub fn erc20_transfer() -> Self {
        Self::new(
            "erc20_transfer",
            "Transfer(address,address,uint256)",
            EventShape::AddressPair {
                first: "from",
                second: "to",
                value: "value",
            },
        )
    }

    pub fn erc20_approval() -> Self {
        Self::new(
            "erc20_approval",
            "Approval(address,address,uint256)",
            EventShape::AddressPair {
                first: "owner",
                second: "spender",
                value: "value",
            },
        )
    }

    /// Canonical event name recorded with each decoded log.
    pub fn event_name(&self) -> &'static str {
        self.name
    }

    /// The topic0 this decoder matches.
    pub fn signature(&self) -> B256 {
        self.signature
    }

    /// Decode one raw log into a record.
    pub fn decode(&self, log: &RawLog) -> Result<DecodeOutcome, IndexError> {
        let mut payload = match self.shape {
            EventShape::IndexedAmount { actor } => {
                if log.topics.len() < 3 {
                    return Ok(DecodeOutcome::Skipped);
                }
                let user = self.topic_address(log, 1)?;
                let amount = self.topic_u256(log, 2)?;

                let mut payload = ArgumentPayload::new();
                payload.insert(actor.to_string(), user.to_checksum(None));
                payload.insert("amount".to_string(), amount.to_string());
                payload
            }
            EventShape::DataAmount { field } => {
                let value = self.data_u256(log)?;

                let mut payload = ArgumentPayload::new();
                payload.insert(field.to_string(), value.to_string());
                payload
            }
            EventShape::AddressPair {
                first,
                second,
                value,
            } => {
                if log.topics.len() < 3 {
                    return Err(self.malformed(format!(
                        "expected 3 topics, got {}",
                        log.topics.len()
                    )));
                }
                let a = self.topic_address(log, 1)?;
                let b = self.topic_address(log, 2)?;
                let v = self.data_u256(log)?;

                let mut payload = ArgumentPayload::new();
                payload.insert(first.to_string(), a.to_checksum(None));
                payload.insert(second.to_string(), b.to_checksum(None));
                payload.insert(value.to_string(), v.to_string());
                payload
            }
        };
        payload.insert("signature".to_string(), self.signature.to_string());

        let contract = log
            .emitter()
            .ok_or_else(|| self.malformed("emitting address is not 20 bytes of hex".into()))?;

        Ok(DecodeOutcome::Decoded(EventRecord::new(
            log.tx_hash.clone(),
            log.log_index_u32(),
            log.block_number_u64(),
            self.name,
            contract.to_checksum(None),
            payload,
        )))
    }

    fn topic(&self, log: &RawLog, i: usize) -> Result<B256, IndexError> {
        log.topic_b256(i)
            .ok_or_else(|| self.malformed(format!("topic {i} is not 32 bytes of hex")))
    }

    fn topic_address(&self, log: &RawLog, i: usize) -> Result<Address, IndexError> {
        let topic = self.topic(log, i)?;
        Ok(Address::from_slice(&topic.as_slice()[12..]))
    }

    fn topic_u256(&self, log: &RawLog, i: usize) -> Result<U256, IndexError> {
        let topic = self.topic(log, i)?;
        Ok(U256::from_be_bytes(topic.0))
    }

    fn data_u256(&self, log: &RawLog) -> Result<U256, IndexError> {
        let data = log
            .data_bytes()
            .ok_or_else(|| self.malformed("data is not valid hex".into()))?;
        if data.len() < 32 {
            return Err(self.malformed(format!("expected 32 data bytes, got {}", data.len())));
        }
        let mut word = [0u8; 32];
        word.copy_from_slice(&data[..32]);
        Ok(U256::from_be_bytes(word))
    }

    fn malformed(&self, reason: String) -> IndexError {
        IndexError::Decode {
            event: self.name.to_string(),
            reason,
        }
    }
}

/// All staking-contract decoders; they share one checkpoint per contract.
pub fn staking_decoders() -> Vec<EventDecoder> {
    vec![
        EventDecoder::staked(),
        EventDecoder::withdrawn(),
        EventDecoder::rewards_claimed(),
        EventDecoder::reward_rate_updated(),
    ]
}

/// ERC-20 token decoders; one checkpoint per token contract.
pub fn erc20_decoders() -> Vec<EventDecoder> {
    vec![EventDecoder::erc20_transfer(), EventDecoder::erc20_approval()]
}
