use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::crypto;

/// A short-lived pair of linked byte strings standing in for entangled particles.
///
/// Both shares are derived from the same random seed, so they are correlated
/// but not equal. Pairs expire independently of any request referencing them;
/// holders keep the id only and must tolerate the pair being swept.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntangledPair {
    pub id: String,
    pub share_a: Vec<u8>,
    pub share_b: Vec<u8>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl EntangledPair {
    /// Generates a fresh pair from a random 32-byte seed, valid for `ttl`.
    pub fn generate(ttl: std::time::Duration) -> Self {
        let seed = crypto::random_bytes::<32>();
        let created_at = Utc::now();
        let ttl = ChronoDuration::from_std(ttl).unwrap_or(ChronoDuration::seconds(300));

        EntangledPair {
            id: Uuid::new_v4().to_string(),
            share_a: crypto::hmac_hex(&seed, b"share-a").into_bytes(),
            share_b: crypto::hmac_hex(&seed, b"share-b").into_bytes(),
            created_at,
            expires_at: created_at + ttl,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}
