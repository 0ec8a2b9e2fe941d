//! Simulation engines behind the compute-mesh dashboard: a governance ledger
//! with proof-of-work block sealing and a quantum-teleportation-flavored
//! cross-region transfer protocol.
//!
//! Neither engine is cryptographically sound and neither pretends to be. The
//! ledger hashes and links blocks like a blockchain, and the teleportation
//! proof has the commitment/challenge/response shape of a zero-knowledge
//! protocol, but verification is structural only. The shapes are the product;
//! the HTTP layer and the relational store that consume these engines live
//! elsewhere.

pub mod crypto;
pub mod governance;
pub mod ledger;
pub mod teleport;

pub use governance::{Governance, GovernanceReceipt, TransactionCounts};
pub use ledger::{Block, Ledger, LedgerError, Transaction, TxKind};
pub use teleport::{
    EntangledPair, RegionSync, RegionSyncRecord, RegionSyncStore, TeleportConfig, TeleportEngine,
    TeleportProof, TeleportRequest, TeleportStatus,
};
