//! Error types surfaced to callers of the webservice.
//!
//! Store failures never show up here: the cache treats them as misses.

use thiserror::Error;
use url::Url;

/// Everything a load can end in besides a decoded value.
#[derive(Error, Debug)]
pub enum WebserviceError {
  /// The server answered 401.
  #[error("Not authenticated. Set READTHRU_AUTH_TOKEN to a valid token")]
  NotAuthenticated,

  #[error(transparent)]
  Transport(#[from] TransportError),

  /// Bytes arrived but did not decode to the expected type.
  #[error("Failed to decode response from {url}")]
  Decode { url: Url },
}

/// Failures below the application layer.
#[derive(Error, Debug)]
pub enum TransportError {
  #[error("Request failed: {0}")]
  Request(#[from] reqwest::Error),

  #[error("Unexpected status {status} from {url}")]
  Status { url: Url, status: u16 },

  /// The network task went away without reporting a result.
  #[error("Network task ended before delivering a result")]
  Interrupted,

  /// `load` was called outside a tokio runtime.
  #[error("No tokio runtime to run the network request on")]
  NoRuntime,
}

impl WebserviceError {
  pub fn decode(url: &Url) -> Self {
    Self::Decode { url: url.clone() }
  }

  /// Whether calling `load` again might succeed without changing anything.
  pub fn is_retryable(&self) -> bool {
    match self {
      Self::Transport(e) => e.is_retryable(),
      Self::NotAuthenticated | Self::Decode { .. } => false,
    }
  }
}

impl TransportError {
  /// Connection failures, lost tasks, server errors, timeouts and throttling.
  /// Other statuses (404, 400, ...) will keep failing.
  pub fn is_retryable(&self) -> bool {
    match self {
      Self::Request(_) | Self::Interrupted => true,
      Self::Status { status, .. } => matches!(*status, 408 | 429 | 500..=599),
      Self::NoRuntime => false,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_only_transport_errors_are_retryable() {
    let url = Url::parse("http://localhost/episodes.json").unwrap();

    assert!(WebserviceError::from(TransportError::Interrupted).is_retryable());
    assert!(!WebserviceError::NotAuthenticated.is_retryable());
    assert!(!WebserviceError::decode(&url).is_retryable());
  }

  #[test]
  fn test_client_error_statuses_are_not_retryable() {
    let url = Url::parse("http://localhost/episodes.json").unwrap();
    let status = |status: u16| {
      WebserviceError::from(TransportError::Status {
        url: url.clone(),
        status,
      })
    };

    assert!(!status(404).is_retryable());
    assert!(!status(400).is_retryable());
    assert!(status(408).is_retryable());
    assert!(status(429).is_retryable());
    assert!(status(503).is_retryable());
    assert!(!WebserviceError::from(TransportError::NoRuntime).is_retryable());
  }

  #[test]
  fn test_status_message_names_url() {
    let url = Url::parse("http://localhost/episodes.json").unwrap();
    let err = WebserviceError::from(TransportError::Status {
      url,
      status: 503,
    });

    assert_eq!(
      err.to_string(),
      "Unexpected status 503 from http://localhost/episodes.json"
    );
  }
}
