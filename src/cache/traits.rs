//! Core traits and types for the caching system.

use chrono::{DateTime, Utc};
use url::Url;

use super::key::CacheKey;

/// Something the cache knows how to key, gate and decode.
///
/// The cache never looks at payloads itself; implementors decide what the
/// stored bytes mean.
pub trait Cacheable {
  /// The typed value stored bytes decode to.
  type Value;

  /// URL the cache key is derived from.
  fn cache_url(&self) -> &Url;

  /// Whether responses for this request may be stored and served from cache.
  fn is_cacheable(&self) -> bool;

  /// Decode stored bytes. `None` means the bytes are not a valid `Value`.
  fn decode(&self, bytes: &[u8]) -> Option<Self::Value>;

  fn cache_key(&self) -> CacheKey {
    CacheKey::for_url(self.cache_url())
  }
}

/// One stored response, as reported by a store listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredEntry {
  pub key: String,
  /// Payload size in bytes
  pub size: u64,
  /// When the entry was last written, if the store tracks it
  pub stored_at: Option<DateTime<Utc>>,
}
