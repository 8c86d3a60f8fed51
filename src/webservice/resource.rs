//! Typed descriptions of fetchable endpoints.

use serde::de::DeserializeOwned;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use url::Url;

/// HTTP method of a resource. POST carries its request body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HttpMethod {
  Get,
  Post(Vec<u8>),
}

impl HttpMethod {
  pub fn is_get(&self) -> bool {
    matches!(self, Self::Get)
  }

  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Get => "GET",
      Self::Post(_) => "POST",
    }
  }
}

type DecodeFn<T> = Arc<dyn Fn(&[u8]) -> Option<T> + Send + Sync>;

/// A URL, a method, and how to turn the response body into a `T`.
///
/// The decode function must be pure: it runs once for a cache hit and again
/// for every network response.
pub struct Resource<T> {
  pub url: Url,
  pub method: HttpMethod,
  decode: DecodeFn<T>,
}

impl<T> Resource<T> {
  pub fn new<F>(url: Url, method: HttpMethod, decode: F) -> Self
  where
    F: Fn(&[u8]) -> Option<T> + Send + Sync + 'static,
  {
    Self {
      url,
      method,
      decode: Arc::new(decode),
    }
  }

  pub fn get<F>(url: Url, decode: F) -> Self
  where
    F: Fn(&[u8]) -> Option<T> + Send + Sync + 'static,
  {
    Self::new(url, HttpMethod::Get, decode)
  }

  /// Decode a response body. `None` if the bytes are not a valid `T`.
  pub fn decode(&self, bytes: &[u8]) -> Option<T> {
    (self.decode)(bytes)
  }

  /// Same URL and method, body passed through untouched.
  pub fn raw(&self) -> Resource<Vec<u8>> {
    Resource::new(self.url.clone(), self.method.clone(), |bytes| {
      Some(bytes.to_vec())
    })
  }

  pub fn is_cacheable(&self) -> bool {
    self.method.is_get()
  }
}

impl<T: DeserializeOwned> Resource<T> {
  /// GET resource whose body is JSON deserializing straight into `T`.
  pub fn json(url: Url) -> Self {
    Self::get(url, |bytes| serde_json::from_slice(bytes).ok())
  }
}

impl<E> Resource<Vec<E>> {
  /// GET resource whose body is a JSON array. Every element must parse for
  /// the resource to decode.
  pub fn json_elements<F>(url: Url, parse_element: F) -> Self
  where
    F: Fn(&Value) -> Option<E> + Send + Sync + 'static,
  {
    Self::get(url, move |bytes| {
      let value: Value = serde_json::from_slice(bytes).ok()?;
      value.as_array()?.iter().map(&parse_element).collect()
    })
  }
}

impl<T> Clone for Resource<T> {
  fn clone(&self) -> Self {
    Self {
      url: self.url.clone(),
      method: self.method.clone(),
      decode: Arc::clone(&self.decode),
    }
  }
}

impl<T> fmt::Debug for Resource<T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Resource")
      .field("url", &self.url.as_str())
      .field("method", &self.method.as_str())
      .finish_non_exhaustive()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde::Deserialize;

  fn url() -> Url {
    Url::parse("http://localhost:8000/episodes.json").unwrap()
  }

  #[derive(Debug, Deserialize, PartialEq)]
  struct Item {
    id: String,
  }

  #[test]
  fn test_json_resource_decodes() {
    let resource: Resource<Vec<Item>> = Resource::json(url());
    assert_eq!(
      resource.decode(br#"[{"id":"1"}]"#),
      Some(vec![Item {
        id: "1".to_string()
      }])
    );
    assert_eq!(resource.decode(b"not json"), None);
  }

  #[test]
  fn test_json_elements_requires_every_element() {
    let resource = Resource::json_elements(url(), |v| v.get("id")?.as_str().map(String::from));

    assert_eq!(
      resource.decode(br#"[{"id":"1"},{"id":"2"}]"#),
      Some(vec!["1".to_string(), "2".to_string()])
    );
    assert_eq!(resource.decode(br#"[{"id":"1"},{"name":"x"}]"#), None);
    assert_eq!(resource.decode(br#"{"id":"1"}"#), None);
    assert_eq!(resource.decode(b"[]"), Some(vec![]));
  }

  #[test]
  fn test_raw_keeps_url_and_method() {
    let post: Resource<Vec<Item>> = Resource::new(
      url(),
      HttpMethod::Post(b"{}".to_vec()),
      |b| serde_json::from_slice(b).ok(),
    );

    let raw = post.raw();
    assert_eq!(raw.url, post.url);
    assert_eq!(raw.method, HttpMethod::Post(b"{}".to_vec()));
    assert_eq!(raw.decode(b"anything"), Some(b"anything".to_vec()));
  }

  #[test]
  fn test_only_get_is_cacheable() {
    let get: Resource<Vec<u8>> = Resource::get(url(), |b| Some(b.to_vec()));
    let post: Resource<Vec<u8>> = Resource::new(url(), HttpMethod::Post(Vec::new()), |b| {
      Some(b.to_vec())
    });

    assert!(get.is_cacheable());
    assert!(!post.is_cacheable());
  }
}
