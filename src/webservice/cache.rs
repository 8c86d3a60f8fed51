//! Caching implementation for resources.

use url::Url;

use crate::cache::Cacheable;

use super::resource::Resource;

impl<T> Cacheable for Resource<T> {
  type Value = T;

  fn cache_url(&self) -> &Url {
    &self.url
  }

  // Only GET responses are stored or served
  fn is_cacheable(&self) -> bool {
    Resource::is_cacheable(self)
  }

  fn decode(&self, bytes: &[u8]) -> Option<T> {
    Resource::decode(self, bytes)
  }
}
