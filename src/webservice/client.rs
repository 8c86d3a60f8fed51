use async_trait::async_trait;
use color_eyre::{eyre::eyre, Result};
use reqwest::StatusCode;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use url::Url;

use crate::config::TransportConfig;
use crate::error::{TransportError, WebserviceError};

use super::resource::{HttpMethod, Resource};

/// Performs one network request and yields the raw response body.
///
/// Implementations must tell an authentication failure apart from other
/// failures (`WebserviceError::NotAuthenticated`).
#[async_trait]
pub trait Transport: Send + Sync {
  async fn fetch(&self, url: &Url, method: &HttpMethod) -> Result<Vec<u8>, WebserviceError>;
}

/// reqwest-backed transport.
#[derive(Clone)]
pub struct HttpTransport {
  client: reqwest::Client,
  auth_token: Option<String>,
}

impl HttpTransport {
  pub fn new(config: &TransportConfig) -> Result<Self> {
    let client = reqwest::Client::builder()
      .timeout(Duration::from_secs(config.timeout_secs))
      .user_agent(config.user_agent.clone())
      .build()
      .map_err(|e| eyre!("Failed to create HTTP client: {}", e))?;

    Ok(Self {
      client,
      auth_token: config.auth_token.clone(),
    })
  }
}

#[async_trait]
impl Transport for HttpTransport {
  async fn fetch(&self, url: &Url, method: &HttpMethod) -> Result<Vec<u8>, WebserviceError> {
    let request = match method {
      HttpMethod::Get => self.client.get(url.clone()),
      HttpMethod::Post(body) => self.client.post(url.clone()).body(body.clone()),
    };
    let request = match &self.auth_token {
      Some(token) => request.bearer_auth(token),
      None => request,
    };

    let response = request.send().await.map_err(TransportError::from)?;
    let status = response.status();
    debug!(method = method.as_str(), %url, %status, "response received");

    if status == StatusCode::UNAUTHORIZED {
      return Err(WebserviceError::NotAuthenticated);
    }
    if !status.is_success() {
      return Err(
        TransportError::Status {
          url: url.clone(),
          status: status.as_u16(),
        }
        .into(),
      );
    }

    let body = response.bytes().await.map_err(TransportError::from)?;
    Ok(body.to_vec())
  }
}

/// Uncached loads: fetch, then decode.
#[derive(Clone)]
pub struct Webservice {
  transport: Arc<dyn Transport>,
}

impl Webservice {
  pub fn new(transport: Arc<dyn Transport>) -> Self {
    Self { transport }
  }

  pub fn from_config(config: &TransportConfig) -> Result<Self> {
    Ok(Self::new(Arc::new(HttpTransport::new(config)?)))
  }

  /// Load a resource from the network.
  pub async fn load<T>(&self, resource: &Resource<T>) -> Result<T, WebserviceError> {
    let bytes = self.transport.fetch(&resource.url, &resource.method).await?;
    resource
      .decode(&bytes)
      .ok_or_else(|| WebserviceError::decode(&resource.url))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use tokio::io::{AsyncReadExt, AsyncWriteExt};
  use tokio::net::TcpListener;
  use tokio::task::JoinHandle;

  /// Serve one canned HTTP response and hand back the raw request text.
  async fn serve_once(status_line: &'static str, body: &'static str) -> (Url, JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let handle = tokio::spawn(async move {
      let (mut socket, _) = listener.accept().await.unwrap();
      let mut request = Vec::new();
      let mut buf = [0u8; 1024];
      while !request.windows(4).any(|w| w == b"\r\n\r\n") {
        let n = socket.read(&mut buf).await.unwrap();
        if n == 0 {
          break;
        }
        request.extend_from_slice(&buf[..n]);
      }

      let response = format!(
        "HTTP/1.1 {}\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
        status_line,
        body.len(),
        body
      );
      socket.write_all(response.as_bytes()).await.unwrap();
      socket.shutdown().await.unwrap();

      String::from_utf8_lossy(&request).into_owned()
    });

    let url = Url::parse(&format!("http://{}/episodes.json", addr)).unwrap();
    (url, handle)
  }

  fn transport(token: Option<&str>) -> HttpTransport {
    HttpTransport::new(&TransportConfig {
      timeout_secs: 5,
      auth_token: token.map(String::from),
      ..TransportConfig::default()
    })
    .unwrap()
  }

  #[tokio::test]
  async fn test_success_returns_body() {
    let (url, server) = serve_once("200 OK", "[]").await;

    let body = transport(None).fetch(&url, &HttpMethod::Get).await.unwrap();
    assert_eq!(body, b"[]");

    let request = server.await.unwrap();
    assert!(request.starts_with("GET /episodes.json"));
  }

  #[tokio::test]
  async fn test_unauthorized_is_distinct() {
    let (url, _server) = serve_once("401 Unauthorized", "").await;

    let err = transport(None)
      .fetch(&url, &HttpMethod::Get)
      .await
      .unwrap_err();
    assert!(matches!(err, WebserviceError::NotAuthenticated));
  }

  #[tokio::test]
  async fn test_other_failures_are_transport_errors() {
    let (url, _server) = serve_once("500 Internal Server Error", "oops").await;

    let err = transport(None)
      .fetch(&url, &HttpMethod::Get)
      .await
      .unwrap_err();
    assert!(matches!(
      err,
      WebserviceError::Transport(TransportError::Status { status: 500, .. })
    ));
  }

  #[tokio::test]
  async fn test_connection_refused_is_transport_error() {
    // Bind then drop to get a port nobody listens on
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let url = Url::parse(&format!("http://{}/", addr)).unwrap();
    let err = transport(None)
      .fetch(&url, &HttpMethod::Get)
      .await
      .unwrap_err();
    assert!(matches!(
      err,
      WebserviceError::Transport(TransportError::Request(_))
    ));
  }

  #[tokio::test]
  async fn test_token_sent_as_bearer() {
    let (url, server) = serve_once("200 OK", "{}").await;

    transport(Some("s3cret"))
      .fetch(&url, &HttpMethod::Get)
      .await
      .unwrap();

    let request = server.await.unwrap().to_lowercase();
    assert!(request.contains("authorization: bearer s3cret"));
  }

  #[tokio::test]
  async fn test_webservice_maps_decode_failure() {
    let (url, _server) = serve_once("200 OK", "not json").await;
    let webservice = Webservice::new(Arc::new(transport(None)));

    let resource: Resource<Vec<String>> = Resource::json(url);
    let err = webservice.load(&resource).await.unwrap_err();
    assert!(matches!(err, WebserviceError::Decode { .. }));
  }
}
