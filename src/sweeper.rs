//! Background removal of dead in-process entries.
//!
//! One task per cache instance, started only when the in-process store is
//! selected. Each tick takes the store's write lock once and drops every
//! entry past its hard expiry. The task holds a weak reference to the store
//! and stops on an explicit signal, on drop of its handle, or once the store
//! is gone.

use std::sync::{Arc, Weak};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::Instrument;

use crate::stats::CacheStats;
use crate::storage::InProcessStore;

/// Handle to a running sweeper task.
#[derive(Debug)]
pub struct Sweeper {
    stop: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl Sweeper {
    /// Start sweeping `store` every `interval` on the current tokio runtime.
    ///
    /// Returns `None` outside a runtime; lazy removal on lookup still applies.
    pub fn spawn(
        store: &Arc<InProcessStore>,
        stats: Arc<CacheStats>,
        interval: Duration,
    ) -> Option<Self> {
        let runtime = match Handle::try_current() {
            Ok(handle) => handle,
            Err(_) => {
                tracing::warn!("no tokio runtime, cleanup sweeper not started");
                return None;
            }
        };

        let (stop_tx, stop_rx) = oneshot::channel();
        let span = tracing::info_span!("cache_sweeper", interval_ms = interval.as_millis() as u64);
        let task = runtime.spawn(
            sweep_loop(Arc::downgrade(store), stats, interval, stop_rx).instrument(span),
        );

        Some(Self {
            stop: Some(stop_tx),
            task: Some(task),
        })
    }

    /// Signal the task to stop and wait for it to exit.
    pub async fn stop(mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for Sweeper {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

async fn sweep_loop(
    store: Weak<InProcessStore>,
    stats: Arc<CacheStats>,
    interval: Duration,
    mut stop: oneshot::Receiver<()>,
) {
    let mut ticker = time::interval_at(Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = &mut stop => break,
            _ = ticker.tick() => {
                let Some(live) = store.upgrade() else { break };
                let removed = live.cleanup_expired();
                stats.record_sweep();
                if removed > 0 {
                    tracing::debug!(removed, remaining = live.len(), "swept dead entries");
                }
            }
        }
    }

    tracing::debug!("cleanup sweeper stopped");
}
