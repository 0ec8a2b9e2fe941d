use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Phase of a teleportation request.
///
/// Transitions are strictly forward along
/// `pending -> entangled -> transmitted -> verified -> completed`; `failed`
/// is reachable from any non-terminal phase. `completed` and `failed` are
/// terminal: a request in either state never mutates again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TeleportStatus {
    Pending,
    Entangled,
    Transmitted,
    Verified,
    Completed,
    Failed,
}

impl TeleportStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TeleportStatus::Completed | TeleportStatus::Failed)
    }
}

/// The commitment/challenge/response artifact produced by the proof phase.
///
/// Not a real zero-knowledge proof: verification only checks that the digests
/// are well-formed (see `TeleportEngine::verify_proof`). The artifact exists
/// to give consumers something shaped like a proof to display.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeleportProof {
    pub commitment: String,
    pub challenge: String,
    pub response: String,
    pub verified: bool,
}

/// One teleportation attempt of a named resource between two regions.
///
/// Mutated in place by the engine's background task as it advances; retained
/// in memory indefinitely for historical queries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeleportRequest {
    pub id: String,
    pub source_region: String,
    pub target_region: String,
    pub resource_type: String,
    pub resource_id: i64,
    pub status: TeleportStatus,
    pub entanglement_id: Option<String>,
    pub proof: Option<TeleportProof>,
    pub error: Option<String>,
    pub start_time: DateTime<Utc>,
    pub completion_time: Option<DateTime<Utc>>,
}

impl TeleportRequest {
    pub fn new(
        source_region: &str,
        target_region: &str,
        resource_type: &str,
        resource_id: i64,
    ) -> Self {
        TeleportRequest {
            id: Uuid::new_v4().to_string(),
            source_region: source_region.to_string(),
            target_region: target_region.to_string(),
            resource_type: resource_type.to_string(),
            resource_id,
            status: TeleportStatus::Pending,
            entanglement_id: None,
            proof: None,
            error: None,
            start_time: Utc::now(),
            completion_time: None,
        }
    }
}
