use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::error::CacheError;
use crate::utils::now_ms;

/// The persisted unit: a computation result and the instant it was produced.
///
/// Entries are never mutated. A refresh writes a new entry over the old one
/// under the same key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry<V> {
    /// Unix timestamp in milliseconds at which the result was produced.
    pub timestamp: i64,

    /// The computation's return value.
    pub result: V,
}

/// How an entry of a given age relates to the freshness window and the
/// staleness bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    /// `age <= expires`: served as-is.
    Fresh,
    /// `expires < age < stale`: servable while a refresh is outstanding.
    Stale,
    /// `age >= stale`: must not be served in place of a live result.
    Expired,
}

impl Freshness {
    /// Classify an age in milliseconds.
    pub fn classify(age_ms: i64, expires_ms: i64, stale_ms: i64) -> Self {
        if age_ms <= expires_ms {
            Freshness::Fresh
        } else if age_ms < stale_ms {
            Freshness::Stale
        } else {
            Freshness::Expired
        }
    }
}

impl<V> CacheEntry<V> {
    /// Create an entry stamped with the current time.
    pub fn new(result: V) -> Self {
        CacheEntry {
            timestamp: now_ms(),
            result,
        }
    }

    /// Age of the entry at `now_ms`. Entries stamped in the future (clock
    /// skew between writers) count as age zero.
    pub fn age_ms(&self, now_ms: i64) -> i64 {
        now_ms.saturating_sub(self.timestamp).max(0)
    }
}

impl<V> CacheEntry<V>
where
    V: Serialize,
{
    /// Encode the entry as JSON bytes.
    pub fn encode(&self) -> Result<Vec<u8>, CacheError> {
        serde_json::to_vec(self)
            .map_err(|e| CacheError::Serialization(format!("Serialization failed: {}", e)))
    }
}

impl<V> CacheEntry<V>
where
    V: DeserializeOwned,
{
    /// Decode an entry from JSON bytes.
    pub fn decode(data: &[u8]) -> Result<Self, CacheError> {
        serde_json::from_slice(data)
            .map_err(|e| CacheError::Serialization(format!("Deserialization failed: {}", e)))
    }
}
