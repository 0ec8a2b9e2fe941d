use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Write payload for a completed cross-region sync.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegionSync {
    pub source_region: String,
    pub target_region: String,
    pub resource_type: String,
    pub resource_id: i64,
    pub sync_status: String,
    pub retry_count: u32,
}

/// What the persistence layer hands back after recording a sync.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegionSyncRecord {
    pub source_region: String,
    pub target_region: String,
    pub resource_type: String,
    pub resource_id: i64,
    pub sync_status: String,
    pub sync_time: DateTime<Utc>,
    pub retry_count: u32,
}

impl RegionSyncRecord {
    pub fn from_sync(sync: &RegionSync) -> Self {
        RegionSyncRecord {
            source_region: sync.source_region.clone(),
            target_region: sync.target_region.clone(),
            resource_type: sync.resource_type.clone(),
            resource_id: sync.resource_id,
            sync_status: sync.sync_status.clone(),
            sync_time: Utc::now(),
            retry_count: sync.retry_count,
        }
    }
}

/// Persistence seam for recording completed teleportations.
///
/// Implementations live outside this crate (the relational store of the
/// dashboard); errors are surfaced as `anyhow::Error` so implementors are
/// not forced into this crate's error taxonomy.
#[async_trait]
pub trait RegionSyncStore: Send + Sync {
    async fn record_region_sync(&self, sync: RegionSync) -> anyhow::Result<RegionSyncRecord>;
}
