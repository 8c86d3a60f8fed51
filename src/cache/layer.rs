//! Typed, method-gated access to a byte store.

use color_eyre::Result;
use tracing::{debug, warn};

use super::storage::ByteStore;
use super::traits::{Cacheable, StoredEntry};

/// Cache over a byte store.
///
/// Only cacheable requests (GET) are read or written. Store failures are
/// logged and then treated as a miss or a dropped write; nothing here returns
/// an error to the load path.
pub struct Cache {
  store: Box<dyn ByteStore>,
}

impl Cache {
  /// Create a new cache with the given store backend.
  pub fn new(store: impl ByteStore + 'static) -> Self {
    Self::from_boxed(Box::new(store))
  }

  pub fn from_boxed(store: Box<dyn ByteStore>) -> Self {
    Self { store }
  }

  /// Look up and decode the stored response for `resource`.
  ///
  /// A missing entry and an entry that fails to decode both yield `None`.
  pub fn load<R: Cacheable>(&self, resource: &R) -> Option<R::Value> {
    if !resource.is_cacheable() {
      return None;
    }

    let key = resource.cache_key();
    let bytes = match self.store.get(key.as_str()) {
      Ok(Some(bytes)) => bytes,
      Ok(None) => return None,
      Err(e) => {
        warn!(%key, error = %e, "cache read failed");
        return None;
      }
    };

    let value = resource.decode(&bytes);
    if value.is_none() {
      debug!(%key, url = %resource.cache_url(), "cached entry did not decode");
    }
    value
  }

  /// Store raw response bytes for `resource`, replacing what was there.
  pub fn save<R: Cacheable>(&self, bytes: &[u8], resource: &R) {
    if !resource.is_cacheable() {
      return;
    }

    let key = resource.cache_key();
    if let Err(e) = self.store.set(key.as_str(), bytes) {
      warn!(%key, error = %e, "cache write failed");
    }
  }

  /// List what the underlying store holds.
  pub fn entries(&self) -> Result<Vec<StoredEntry>> {
    self.store.entries()
  }
}
