// Ledger module
//
// This module contains the governance ledger implementation including:
// - Block structure
// - Ledger (chain + pending pool)
// - Transaction structure
// - Proof of work algorithm

pub mod block;
pub mod chain;
pub mod transaction;

// Re-export main components for easier access
pub use block::Block;
pub use chain::Ledger;
pub use transaction::{LedgerError, Transaction, TxKind};
