//! Two-phase delivery of a cached load.
//!
//! A load produces at most two updates: an optional cached value, available
//! as soon as `load` returns, and exactly one network outcome, available
//! later.

use futures::stream::{self, Stream, StreamExt};
use tokio::runtime::Handle;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::error::{TransportError, WebserviceError};

/// One delivery to the caller.
#[derive(Debug)]
pub enum Update<T> {
  /// Decoded from the local cache before the network answered
  Cached(T),
  /// Decoded from a fresh network response
  Fresh(T),
  /// The network phase failed. Earlier cached values stay valid.
  Failed(WebserviceError),
}

impl<T> Update<T> {
  pub fn from_network(result: Result<T, WebserviceError>) -> Self {
    match result {
      Ok(value) => Self::Fresh(value),
      Err(e) => Self::Failed(e),
    }
  }

  pub fn is_from_cache(&self) -> bool {
    matches!(self, Self::Cached(_))
  }

  /// Whether this is the network outcome, after which nothing else arrives.
  pub fn is_final(&self) -> bool {
    !self.is_from_cache()
  }

  pub fn value(&self) -> Option<&T> {
    match self {
      Self::Cached(v) | Self::Fresh(v) => Some(v),
      Self::Failed(_) => None,
    }
  }

  pub fn into_result(self) -> Result<T, WebserviceError> {
    match self {
      Self::Cached(v) | Self::Fresh(v) => Ok(v),
      Self::Failed(e) => Err(e),
    }
  }
}

/// Handle returned by `CachedWebservice::load`.
///
/// Slot one (`cached`) is filled synchronously. Slot two (`network`)
/// resolves exactly once. Dropping the handle does not cancel the network
/// phase; the cache is still refreshed.
#[derive(Debug)]
pub struct Load<T> {
  cached: Option<T>,
  network: oneshot::Receiver<Result<T, WebserviceError>>,
}

impl<T> Load<T> {
  pub(crate) fn new(
    cached: Option<T>,
    network: oneshot::Receiver<Result<T, WebserviceError>>,
  ) -> Self {
    Self { cached, network }
  }

  pub fn cached(&self) -> Option<&T> {
    self.cached.as_ref()
  }

  pub fn take_cached(&mut self) -> Option<T> {
    self.cached.take()
  }

  /// Wait for the network outcome.
  pub async fn network(self) -> Result<T, WebserviceError> {
    receive(self.network).await
  }

  /// The network outcome if it is already available, without waiting.
  /// A pending outcome reads as `TransportError::Interrupted`.
  pub(crate) fn try_network(mut self) -> Result<T, WebserviceError> {
    self
      .network
      .try_recv()
      .unwrap_or_else(|_| Err(TransportError::Interrupted.into()))
  }

  /// Both slots as a stream of at most two updates, cached first.
  pub fn into_stream(self) -> impl Stream<Item = Update<T>> {
    let Load { cached, network } = self;
    let network = stream::once(async move { Update::from_network(receive(network).await) });
    stream::iter(cached.map(Update::Cached)).chain(network)
  }

  /// Forward both slots into a delivery channel.
  ///
  /// The cached update, if any, is sent before this returns. The network
  /// update is sent from a spawned task once it arrives; outside a tokio
  /// runtime it is sent immediately and no task is returned. If the receiver
  /// is gone the updates are dropped.
  pub fn deliver<E, F>(self, tx: &mpsc::UnboundedSender<E>, wrap: F) -> Option<JoinHandle<()>>
  where
    T: Send + 'static,
    E: Send + 'static,
    F: Fn(Update<T>) -> E + Send + 'static,
  {
    let mut load = self;
    if let Some(value) = load.take_cached() {
      let _ = tx.send(wrap(Update::Cached(value)));
    }

    match Handle::try_current() {
      Ok(runtime) => {
        let tx = tx.clone();
        Some(runtime.spawn(async move {
          let update = Update::from_network(load.network().await);
          let _ = tx.send(wrap(update));
        }))
      }
      Err(_) => {
        let _ = tx.send(wrap(Update::from_network(load.try_network())));
        None
      }
    }
  }
}

async fn receive<T>(
  network: oneshot::Receiver<Result<T, WebserviceError>>,
) -> Result<T, WebserviceError> {
  network
    .await
    .unwrap_or_else(|_| Err(TransportError::Interrupted.into()))
}
