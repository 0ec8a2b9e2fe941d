use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::transaction::Transaction;

/// Represents a block in the governance ledger
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Block {
    /// Index of the block in the chain (0 = genesis)
    pub index: u64,

    /// Timestamp when the block was created
    pub timestamp: DateTime<Utc>,

    /// List of transactions sealed into this block
    pub transactions: Vec<Transaction>,

    /// Hash of the previous block ("0" for genesis)
    pub previous_hash: String,

    /// Hash of the current block (calculated)
    pub hash: String,

    /// Proof-of-work nonce
    pub nonce: u64,
}

impl Block {
    /// Creates a new block with its hash calculated for nonce 0.
    ///
    /// The returned block is not yet sealed; `Ledger::seal_pending_batch`
    /// searches the nonce space until the hash meets the difficulty target.
    pub fn new(index: u64, transactions: Vec<Transaction>, previous_hash: String) -> Self {
        let mut block = Block {
            index,
            timestamp: Utc::now(),
            transactions,
            previous_hash,
            hash: String::new(),
            nonce: 0,
        };

        block.hash = block.calculate_hash();
        block
    }

    /// Creates the genesis block: index 0, previous hash "0", fixed marker payload.
    pub fn genesis() -> Self {
        Block::new(0, vec![Transaction::genesis_marker()], "0".to_string())
    }

    /// Calculates the hash of the block
    ///
    /// # Returns
    ///
    /// The SHA-256 hash of the block as a hexadecimal string
    pub fn calculate_hash(&self) -> String {
        let mut hasher = Sha256::new();

        // Convert the block to a JSON string (the stored hash is excluded)
        let block_data = serde_json::json!({
            "index": self.index,
            "timestamp": self.timestamp,
            "transactions": self.transactions,
            "previous_hash": self.previous_hash,
            "nonce": self.nonce,
        });

        let block_string = serde_json::to_string(&block_data).unwrap();

        hasher.update(block_string.as_bytes());

        format!("{:x}", hasher.finalize())
    }
}
