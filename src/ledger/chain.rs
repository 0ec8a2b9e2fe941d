use std::sync::{Arc, Mutex};

use log::{debug, info};

use super::block::Block;
use super::transaction::{LedgerError, Transaction, TxKind};

/// Default number of leading zero hex digits required of a sealed block's hash.
///
/// Kept small so that sealing terminates in well under a second; it runs
/// synchronously on the governance timer.
pub const DEFAULT_DIFFICULTY: usize = 2;

/// Chain and pending pool, guarded together as one critical section.
#[derive(Debug)]
struct LedgerInner {
    chain: Vec<Block>,
    pending: Vec<Transaction>,
}

/// Append-only, hash-linked transaction log with simulated proof-of-work.
///
/// Blocks are only ever appended, never mutated or removed; pending
/// transactions only ever move pool -> block. Cloning the `Ledger` shares
/// the underlying chain.
#[derive(Debug, Clone)]
pub struct Ledger {
    inner: Arc<Mutex<LedgerInner>>,

    /// Mining difficulty (number of leading zeros required in hash)
    difficulty: usize,
}

impl Ledger {
    /// Creates a new ledger containing only the genesis block.
    pub fn new() -> Self {
        Ledger::with_difficulty(DEFAULT_DIFFICULTY)
    }

    /// Creates a new ledger with a custom mining difficulty.
    pub fn with_difficulty(difficulty: usize) -> Self {
        Ledger {
            inner: Arc::new(Mutex::new(LedgerInner {
                chain: vec![Block::genesis()],
                pending: Vec::new(),
            })),
            difficulty,
        }
    }

    /// Signs and appends a new transaction to the pending pool.
    ///
    /// Fails only if the payload cannot be serialized; the pool is left
    /// unchanged in that case.
    pub fn submit_transaction(
        &self,
        kind: TxKind,
        payload: serde_json::Value,
        signing_key: &str,
    ) -> Result<Transaction, LedgerError> {
        let transaction = Transaction::new(kind, payload, signing_key)?;

        let mut inner = self.inner.lock().unwrap();
        inner.pending.push(transaction.clone());

        debug!(
            "Transaction {} ({:?}) queued, pool size {}",
            transaction.id,
            transaction.kind,
            inner.pending.len()
        );

        Ok(transaction)
    }

    /// Seals the pending pool into a new block via proof-of-work.
    ///
    /// A synthetic reward transaction attributed to `miner_address` is
    /// appended to the batch, so the resulting block is never empty. The
    /// nonce search always terminates: the nonce space is unbounded and the
    /// difficulty target is small.
    pub fn seal_pending_batch(&self, miner_address: &str) -> Block {
        let mut inner = self.inner.lock().unwrap();

        let mut transactions = std::mem::take(&mut inner.pending);
        transactions.push(Transaction::new_reward(miner_address));

        let last_block = inner.chain.last().unwrap();
        let index = last_block.index + 1;
        let previous_hash = last_block.hash.clone();

        let block = self.proof_of_work(index, transactions, previous_hash);

        info!(
            "Sealed block {} with {} transactions (nonce {})",
            block.index,
            block.transactions.len(),
            block.nonce
        );

        inner.chain.push(block.clone());
        block
    }

    /// Performs proof of work to find a valid hash
    ///
    /// Increments the nonce from 0 until the block hash has the required
    /// number of leading zero hex digits.
    fn proof_of_work(
        &self,
        index: u64,
        transactions: Vec<Transaction>,
        previous_hash: String,
    ) -> Block {
        let target = "0".repeat(self.difficulty);
        let mut block = Block::new(index, transactions, previous_hash);

        loop {
            let hash = block.calculate_hash();

            if hash.starts_with(&target) {
                block.hash = hash;
                return block;
            }

            block.nonce += 1;
        }
    }

    /// Validates the whole chain.
    ///
    /// Recomputes every block's hash from its fields and checks the
    /// previous-hash linkage. Returns false on the first mismatch. An
    /// invalid chain is reported, never repaired; the ledger keeps
    /// accepting writes.
    pub fn is_chain_valid(&self) -> bool {
        let inner = self.inner.lock().unwrap();

        for i in 1..inner.chain.len() {
            let current_block = &inner.chain[i];
            let previous_block = &inner.chain[i - 1];

            // Check if the hash is correct
            if current_block.hash != current_block.calculate_hash() {
                return false;
            }

            // Check if the previous hash is correct
            if current_block.previous_hash != previous_block.hash {
                return false;
            }
        }

        true
    }

    /// Finds a sealed transaction by id (linear scan over all blocks).
    pub fn find_transaction(&self, id: &str) -> Option<Transaction> {
        let inner = self.inner.lock().unwrap();

        inner
            .chain
            .iter()
            .flat_map(|block| block.transactions.iter())
            .find(|transaction| transaction.id == id)
            .cloned()
    }

    /// All sealed transactions in chain order, insertion order within blocks.
    pub fn all_transactions(&self) -> Vec<Transaction> {
        let inner = self.inner.lock().unwrap();

        inner
            .chain
            .iter()
            .flat_map(|block| block.transactions.iter())
            .cloned()
            .collect()
    }

    /// All sealed transactions originating from the given address.
    pub fn transactions_by_address(&self, address: &str) -> Vec<Transaction> {
        self.all_transactions()
            .into_iter()
            .filter(|transaction| transaction.origin_address == address)
            .collect()
    }

    /// Number of sealed transactions of the given kind.
    pub fn count_by_kind(&self, kind: TxKind) -> usize {
        let inner = self.inner.lock().unwrap();

        inner
            .chain
            .iter()
            .flat_map(|block| block.transactions.iter())
            .filter(|transaction| transaction.kind == kind)
            .count()
    }

    /// Snapshot of the full chain.
    pub fn chain(&self) -> Vec<Block> {
        self.inner.lock().unwrap().chain.clone()
    }

    /// Current chain length, including genesis.
    pub fn chain_len(&self) -> usize {
        self.inner.lock().unwrap().chain.len()
    }

    /// Snapshot of the pending pool.
    pub fn pending_transactions(&self) -> Vec<Transaction> {
        self.inner.lock().unwrap().pending.clone()
    }

    /// Overwrites a sealed block's stored hash to simulate tampering.
    #[cfg(test)]
    pub(crate) fn corrupt_block_hash(&self, index: usize, hash: &str) {
        let mut inner = self.inner.lock().unwrap();
        inner.chain[index].hash = hash.to_string();
    }

    /// Rewires a sealed block's previous-hash link to simulate tampering.
    #[cfg(test)]
    pub(crate) fn corrupt_previous_hash(&self, index: usize, previous_hash: &str) {
        let mut inner = self.inner.lock().unwrap();
        let block = &mut inner.chain[index];
        block.previous_hash = previous_hash.to_string();
        // Keep the block self-consistent so only the linkage check can fail
        block.hash = block.calculate_hash();
    }
}

impl Default for Ledger {
    fn default() -> Self {
        Ledger::new()
    }
}
