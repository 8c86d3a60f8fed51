use std::time::Duration;
use tokio::sync::mpsc;

use crate::webservice::Update;

/// Events handled on the delivery context
#[derive(Debug)]
pub enum Event<T> {
  /// A cached or network update for an outstanding load
  Update(Update<T>),
  /// Periodic tick while waiting
  Tick,
}

/// Single receiver every update is funneled through.
///
/// Whoever drains `next` is the delivery context: cache hits and network
/// results for all loads arrive here, in send order, so handlers need no
/// locking of their own.
pub struct EventHandler<T> {
  tx: mpsc::UnboundedSender<Event<T>>,
  rx: mpsc::UnboundedReceiver<Event<T>>,
}

impl<T: Send + 'static> EventHandler<T> {
  /// Create a new event handler with the given tick rate
  pub fn new(tick_rate: Duration) -> Self {
    let (tx, rx) = mpsc::unbounded_channel();

    // Spawn tick timer
    let tick_tx = tx.clone();
    tokio::spawn(async move {
      let mut interval = tokio::time::interval(tick_rate);
      // First tick completes immediately
      interval.tick().await;
      loop {
        interval.tick().await;
        if tick_tx.send(Event::Tick).is_err() {
          break;
        }
      }
    });

    Self { tx, rx }
  }

  /// Sender for handing to loads
  pub fn sender(&self) -> mpsc::UnboundedSender<Event<T>> {
    self.tx.clone()
  }

  /// Receive the next event
  pub async fn next(&mut self) -> Option<Event<T>> {
    self.rx.recv().await
  }
}
