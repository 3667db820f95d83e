//! Background catalog refresh on a cancellable timer.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::cache::CacheStore;
use crate::catalog::types::Product;

use super::coordinator::SyncCoordinator;

const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// Periodically refreshes the merged catalog while active and republishes
/// non-empty results to the subscribed holder.
///
/// Two states: inactive (no task) and active (timer task armed). `start`
/// runs one immediate refresh and then fires every interval; `stop` cancels
/// the timer deterministically and is safe to call in either state. A remote
/// call already in flight when `stop` lands is not aborted and may still
/// write its result into the cache; consumers tolerate that late write.
pub struct RefreshScheduler<S: CacheStore + 'static> {
  coordinator: Arc<SyncCoordinator<S>>,
  interval: Duration,
  handle: Option<JoinHandle<()>>,
}

impl<S: CacheStore + 'static> RefreshScheduler<S> {
  pub fn new(coordinator: Arc<SyncCoordinator<S>>) -> Self {
    Self {
      coordinator,
      interval: DEFAULT_REFRESH_INTERVAL,
      handle: None,
    }
  }

  /// Override the refresh interval.
  #[allow(dead_code)]
  pub fn with_interval(mut self, interval: Duration) -> Self {
    self.interval = interval;
    self
  }

  /// Arm the timer. No-op when already active.
  pub fn start(&mut self, tx: mpsc::UnboundedSender<Vec<Product>>) {
    if self.is_active() {
      return;
    }

    let coordinator = Arc::clone(&self.coordinator);
    let interval = self.interval;

    self.handle = Some(tokio::spawn(async move {
      let mut ticker = tokio::time::interval(interval);
      loop {
        // First tick completes immediately, covering the refresh owed on
        // activation.
        ticker.tick().await;

        let products = coordinator.merged_products().await;
        if products.is_empty() {
          debug!("background refresh returned no products, not republishing");
          continue;
        }
        if tx.send(products).is_err() {
          // Holder dropped its receiver; nothing left to publish to.
          break;
        }
      }
    }));
  }

  /// Cancel the timer. Idempotent; safe when no timer is armed.
  pub fn stop(&mut self) {
    if let Some(handle) = self.handle.take() {
      handle.abort();
    }
  }

  pub fn is_active(&self) -> bool {
    self.handle.is_some()
  }
}

impl<S: CacheStore + 'static> Drop for RefreshScheduler<S> {
  fn drop(&mut self) {
    self.stop();
  }
}
