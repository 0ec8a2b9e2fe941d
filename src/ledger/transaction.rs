use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::crypto;

/// Errors that can occur during ledger operations
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("Failed to serialize transaction payload: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// The kind of action a transaction records on the governance ledger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TxKind {
    /// Marker carried by the genesis block only
    Genesis,

    /// A governance proposal was submitted
    Proposal,

    /// A vote was cast on a proposal
    Vote,

    /// A proposal was executed
    Execution,

    /// Synthetic miner reward appended when a batch is sealed
    Reward,
}

/// Represents a transaction in the governance ledger
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    /// Unique identifier for the transaction
    pub id: String,

    /// What governance action this transaction records
    pub kind: TxKind,

    /// Arbitrary structured data describing the action
    pub payload: serde_json::Value,

    /// HMAC of the payload under the submitter's signing key
    pub signature: String,

    /// Timestamp when the transaction was created
    pub timestamp: DateTime<Utc>,

    /// Address derived from the submitter's signing key
    pub origin_address: String,
}

impl Transaction {
    /// Creates a new signed transaction from a payload and signing key.
    ///
    /// The signature is an HMAC over the serialized payload and the origin
    /// address is derived from the key, so the same key always produces the
    /// same address. Fails only if the payload cannot be serialized.
    pub fn new(
        kind: TxKind,
        payload: serde_json::Value,
        signing_key: &str,
    ) -> Result<Self, LedgerError> {
        let serialized = serde_json::to_vec(&payload)?;
        let signature = crypto::hmac_hex(signing_key.as_bytes(), &serialized);
        let origin_address = crypto::derive_address(signing_key);

        Ok(Transaction {
            id: Uuid::new_v4().to_string(),
            kind,
            payload,
            signature,
            timestamp: Utc::now(),
            origin_address,
        })
    }

    /// Creates the synthetic reward transaction appended when sealing a batch.
    ///
    /// Rewards are attributed directly to the miner's address and carry the
    /// system signature "0", mirroring how coinbase transactions are marked.
    pub fn new_reward(miner_address: &str) -> Self {
        Transaction {
            id: Uuid::new_v4().to_string(),
            kind: TxKind::Reward,
            payload: serde_json::json!({ "type": "mining-reward" }),
            signature: "0".to_string(),
            timestamp: Utc::now(),
            origin_address: miner_address.to_string(),
        }
    }

    /// Creates the fixed payload marker carried by the genesis block.
    pub fn genesis_marker() -> Self {
        Transaction {
            id: "genesis".to_string(),
            kind: TxKind::Genesis,
            payload: serde_json::json!({ "genesis": true }),
            signature: "0".to_string(),
            timestamp: Utc::now(),
            origin_address: "0".to_string(),
        }
    }
}
