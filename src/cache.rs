//! Run-scoped cache of resolved credit facts.
//!
//! Entries are keyed by `LesseeIdentity` and stored as JSON with a SHA-256
//! checksum alongside:
//! 1. A checksum is generated when a resolution is cached
//! 2. The checksum is validated when the entry is read back
//! 3. A corrupted entry is dropped and treated as a miss
//!
//! Reads hand out deserialized copies; nobody shares an entry for writing.
//! Concurrent resolutions of the same identity collapse into one: moka runs a
//! single initializer per key and parks the other callers until it finishes.

use chrono::Utc;
use moka::future::Cache;
use sha2::{Digest, Sha256};
use std::future::Future;
use std::time::Duration;

use crate::models::LesseeIdentity;
use crate::resolver::Resolution;

/// Default time-to-live of a cached resolution.
pub const DEFAULT_TTL: Duration = Duration::from_secs(3600);

/// Default maximum number of cached identities.
pub const DEFAULT_CAPACITY: u64 = 10_000;

/// Wrapper for cached data with integrity validation
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ValidatedCacheEntry {
    /// The cached resolution (JSON string)
    pub data: String,
    /// SHA-256 checksum of the data (hex encoded)
    pub checksum: String,
}

impl ValidatedCacheEntry {
    /// Creates a new validated cache entry with computed checksum
    pub fn new(data: String) -> Self {
        let checksum = Self::compute_checksum(&data);
        Self { data, checksum }
    }

    fn compute_checksum(data: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(data.as_bytes());
        hex::encode(hasher.finalize())
    }

    /// Returns true if the checksum matches, false if tampered
    pub fn is_valid(&self) -> bool {
        Self::compute_checksum(&self.data) == self.checksum
    }

    /// Serializes the entry for storage in cache
    pub fn serialize(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }

    /// Deserializes and validates a cache entry
    ///
    /// Returns Some(data) if valid, None if corrupted or invalid JSON
    pub fn deserialize_and_validate(serialized: &str) -> Option<String> {
        let entry: ValidatedCacheEntry = serde_json::from_str(serialized).ok()?;

        if entry.is_valid() {
            Some(entry.data)
        } else {
            tracing::warn!(
                "Cache validation failed: checksum mismatch. Expected: {}, Data length: {}",
                entry.checksum,
                entry.data.len()
            );
            None
        }
    }
}

fn seal(resolution: &Resolution) -> Option<String> {
    let data = serde_json::to_string(resolution).ok()?;
    Some(ValidatedCacheEntry::new(data).serialize())
}

fn unseal(serialized: &str) -> Option<Resolution> {
    let data = ValidatedCacheEntry::deserialize_and_validate(serialized)?;
    serde_json::from_str(&data).ok()
}

/// Uncacheable resolutions travel through the initializer's error channel
/// so they reach every waiter without being stored.
#[derive(Debug)]
enum NotCached {
    Uncacheable(Resolution),
    Unserializable(Resolution),
}

/// TTL cache of resolutions keyed by lessee identity.
#[derive(Clone)]
pub struct FactCache {
    inner: Cache<LesseeIdentity, String>,
    ttl: Duration,
}

impl FactCache {
    pub fn new(ttl: Duration, capacity: u64) -> Self {
        let inner = Cache::builder()
            .time_to_live(ttl)
            .max_capacity(capacity)
            .build();
        Self { inner, ttl }
    }

    /// Cached resolution for `identity`, if present, intact and fresh.
    pub async fn get(&self, identity: &LesseeIdentity) -> Option<Resolution> {
        let serialized = self.inner.get(identity).await?;
        match unseal(&serialized) {
            Some(resolution) if self.is_fresh(&resolution) => Some(resolution),
            Some(_) => {
                tracing::debug!("Cache entry for '{}' is stale", identity);
                self.inner.invalidate(identity).await;
                None
            }
            None => {
                tracing::warn!("Dropping corrupted cache entry for '{}'", identity);
                self.inner.invalidate(identity).await;
                None
            }
        }
    }

    /// Store `resolution` under `identity`, unless it is not cacheable
    /// (see [`Resolution::is_cacheable`]).
    pub async fn put(&self, identity: &LesseeIdentity, resolution: &Resolution) {
        if !resolution.is_cacheable() {
            return;
        }
        if let Some(sealed) = seal(resolution) {
            self.inner.insert(identity.clone(), sealed).await;
        }
    }

    /// Return the cached resolution, or run `resolve` and cache its result.
    ///
    /// At most one `resolve` runs per identity at a time; concurrent callers
    /// for the same identity await that one and get a copy of its result.
    pub async fn get_or_resolve<F>(&self, identity: &LesseeIdentity, resolve: F) -> Resolution
    where
        F: Future<Output = Resolution>,
    {
        let init = async {
            let resolution = resolve.await;
            if !resolution.is_cacheable() {
                return Err(NotCached::Uncacheable(resolution));
            }
            match seal(&resolution) {
                Some(sealed) => Ok(sealed),
                None => Err(NotCached::Unserializable(resolution)),
            }
        };

        match self.inner.try_get_with(identity.clone(), init).await {
            Ok(serialized) => unseal(&serialized).unwrap_or_else(|| {
                tracing::error!("Freshly cached entry for '{}' failed validation", identity);
                Resolution::unknown(
                    vec!["cache: entry failed validation".to_string()],
                    Utc::now(),
                )
            }),
            Err(shared) => match shared.as_ref() {
                NotCached::Uncacheable(resolution) | NotCached::Unserializable(resolution) => {
                    resolution.clone()
                }
            },
        }
    }

    fn is_fresh(&self, resolution: &Resolution) -> bool {
        let age = Utc::now().signed_duration_since(resolution.resolved_at);
        age.to_std().map(|age| age <= self.ttl).unwrap_or(true)
    }

    #[cfg(test)]
    async fn insert_raw(&self, identity: &LesseeIdentity, raw: String) {
        self.inner.insert(identity.clone(), raw).await;
    }
}
