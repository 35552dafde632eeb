//! Cached query pages and their byte encoding.

use chrono::Utc;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use vitrine_core::{CacheError, Timestamp};

use super::fingerprint::QueryFingerprint;
use super::watermark::Watermark;

/// One page of query results plus the full match count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryPage<T> {
    pub records: Vec<T>,
    pub total_count: u64,
}

/// A cached query page, tagged with the collection watermark observed after
/// the page was read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry<T> {
    pub fingerprint: String,
    pub result: QueryPage<T>,
    pub watermark: Watermark,
    pub stored_at: Timestamp,
}

impl<T> CacheEntry<T> {
    pub fn new(fingerprint: &QueryFingerprint, result: QueryPage<T>, watermark: Watermark) -> Self {
        Self {
            fingerprint: fingerprint.as_str().to_string(),
            result,
            watermark,
            stored_at: Utc::now(),
        }
    }

    /// Whether this entry was written for `fingerprint`.
    pub fn belongs_to(&self, fingerprint: &QueryFingerprint) -> bool {
        self.fingerprint == fingerprint.as_str()
    }
}

impl<T: Serialize> CacheEntry<T> {
    /// Encode as JSON bytes.
    pub fn encode(&self) -> Result<Vec<u8>, CacheError> {
        serde_json::to_vec(self).map_err(|e| CacheError::Serialization {
            reason: e.to_string(),
        })
    }
}

impl<T: DeserializeOwned> CacheEntry<T> {
    /// Decode from JSON bytes.
    pub fn decode(bytes: &[u8]) -> Result<Self, CacheError> {
        serde_json::from_slice(bytes).map_err(|e| CacheError::Deserialization {
            reason: e.to_string(),
        })
    }
}
