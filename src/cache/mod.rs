//! Generic caching layer for raw response persistence.
//!
//! This module knows nothing about HTTP. It:
//! - Derives stable keys from URLs
//! - Reads and writes only requests marked cacheable
//! - Decodes stored bytes through the request itself
//! - Treats store failures as misses

mod key;
mod layer;
mod storage;
mod traits;

pub use key::CacheKey;
pub use layer::Cache;
pub use storage::{open_store, ByteStore, FileStore, MemoryStore, NoopStore, SqliteStore};
pub use traits::{Cacheable, StoredEntry};
