// Teleportation module
//
// This module contains the simulated quantum teleportation engine including:
// - Entangled pair generation and expiry
// - The per-request transfer state machine
// - The commitment/challenge/response proof artifact
// - The persistence seam for recording completed syncs

pub mod engine;
pub mod pair;
pub mod request;
pub mod sync;

// Re-export main components for easier access
pub use engine::{TeleportConfig, TeleportEngine, TeleportError};
pub use pair::EntangledPair;
pub use request::{TeleportProof, TeleportRequest, TeleportStatus};
pub use sync::{RegionSync, RegionSyncRecord, RegionSyncStore};
