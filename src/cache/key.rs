//! Cache keys derived from resource URLs.

use sha2::{Digest, Sha256};
use std::fmt;
use url::Url;

/// Store key for a cached response.
///
/// A SHA-256 digest of the URL's serialized form, so keys are stable across
/// runs, fixed-length, and safe to use as file names. The fragment is never
/// sent to the server and is left out.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
  pub fn for_url(url: &Url) -> Self {
    let mut url = url.clone();
    url.set_fragment(None);

    let mut hasher = Sha256::new();
    hasher.update(url.as_str().as_bytes());
    let digest = hasher.finalize();
    Self(format!("cache-{}", hex::encode(digest)))
  }

  pub fn as_str(&self) -> &str {
    &self.0
  }
}

impl fmt::Display for CacheKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn url(s: &str) -> Url {
    Url::parse(s).unwrap()
  }

  #[test]
  fn test_key_is_stable() {
    let a = CacheKey::for_url(&url("http://localhost:8000/episodes.json"));
    let b = CacheKey::for_url(&url("http://localhost:8000/episodes.json"));
    assert_eq!(a, b);
    assert_eq!(a.as_str().len(), "cache-".len() + 64);
  }

  #[test]
  fn test_distinct_urls_get_distinct_keys() {
    let a = CacheKey::for_url(&url("http://localhost:8000/episodes.json"));
    let b = CacheKey::for_url(&url("http://localhost:8000/episodes.json?page=2"));
    assert_ne!(a, b);
  }

  #[test]
  fn test_equivalent_urls_share_a_key() {
    // Url normalizes scheme and host case plus the empty path
    let a = CacheKey::for_url(&url("HTTP://LOCALHOST:8000"));
    let b = CacheKey::for_url(&url("http://localhost:8000/"));
    assert_eq!(a, b);
  }

  #[test]
  fn test_fragment_does_not_change_key() {
    let a = CacheKey::for_url(&url("http://localhost:8000/episodes.json"));
    let b = CacheKey::for_url(&url("http://localhost:8000/episodes.json#top"));
    assert_eq!(a, b);
  }

  #[test]
  fn test_known_digest() {
    let key = CacheKey::for_url(&url("http://example.com/"));
    let mut hasher = Sha256::new();
    hasher.update(b"http://example.com/");
    assert_eq!(
      key.to_string(),
      format!("cache-{}", hex::encode(hasher.finalize()))
    );
  }
}
