//! Webservice that serves cached responses while refreshing from the network.

use color_eyre::Result;
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::cache::{open_store, Cache};
use crate::config::Config;
use crate::error::{TransportError, WebserviceError};

use super::client::{Transport, Webservice};
use super::delivery::{Load, Update};
use super::resource::Resource;

/// Webservice with transparent read-through caching.
///
/// Every load checks the cache first and then always goes to the network,
/// storing the raw response for next time.
#[derive(Clone)]
pub struct CachedWebservice {
  inner: Webservice,
  cache: Arc<Cache>,
}

impl CachedWebservice {
  pub fn new(transport: Arc<dyn Transport>, cache: Cache) -> Self {
    Self {
      inner: Webservice::new(transport),
      cache: Arc::new(cache),
    }
  }

  /// Create a cached webservice from configuration.
  pub fn from_config(config: &Config) -> Result<Self> {
    let inner = Webservice::from_config(&config.transport)?;
    let store = open_store(&config.cache)?;

    Ok(Self {
      inner,
      cache: Arc::new(Cache::from_boxed(store)),
    })
  }

  pub fn cache(&self) -> &Cache {
    &self.cache
  }

  /// Load a resource, cache first.
  ///
  /// The returned handle already holds the cached value, if there is one.
  /// The network request is started on the current tokio runtime before this
  /// returns and runs to completion even if the handle is dropped. Outside a
  /// runtime the network outcome is `TransportError::NoRuntime`.
  pub fn load<T: Send + 'static>(&self, resource: Resource<T>) -> Load<T> {
    let cached = self.cache.load(&resource);
    if cached.is_some() {
      info!(url = %resource.url, "cache hit");
    }

    let (tx, rx) = oneshot::channel();
    match Handle::try_current() {
      Ok(runtime) => {
        let inner = self.inner.clone();
        let cache = Arc::clone(&self.cache);
        runtime.spawn(async move {
          let result = refresh(&inner, &cache, &resource).await;
          let _ = tx.send(result);
        });
      }
      Err(_) => {
        warn!(url = %resource.url, "load called outside a tokio runtime");
        let _ = tx.send(Err(TransportError::NoRuntime.into()));
      }
    }

    Load::new(cached, rx)
  }

  /// Callback form of `load`.
  ///
  /// `update` runs once for a cache hit, before this returns, and once more
  /// with the network outcome from the returned task. Outside a runtime there
  /// is no task: both calls happen before this returns and `None` comes back.
  pub fn load_with<T, F>(&self, resource: Resource<T>, mut update: F) -> Option<JoinHandle<()>>
  where
    T: Send + 'static,
    F: FnMut(Update<T>) + Send + 'static,
  {
    let mut load = self.load(resource);
    if let Some(value) = load.take_cached() {
      update(Update::Cached(value));
    }

    match Handle::try_current() {
      Ok(runtime) => Some(runtime.spawn(async move {
        update(Update::from_network(load.network().await));
      })),
      Err(_) => {
        update(Update::from_network(load.try_network()));
        None
      }
    }
  }
}

/// Network phase: fetch raw bytes, store them, then decode.
///
/// Bytes are stored before decoding, so a response that fails to decode
/// still replaces the cached entry.
async fn refresh<T>(
  webservice: &Webservice,
  cache: &Cache,
  resource: &Resource<T>,
) -> Result<T, WebserviceError> {
  let bytes = webservice.load(&resource.raw()).await?;
  debug!(url = %resource.url, len = bytes.len(), "network load succeeded");

  cache.save(&bytes, resource);
  resource
    .decode(&bytes)
    .ok_or_else(|| WebserviceError::decode(&resource.url))
}
