//! Response watcher: polls the capture region and relays output that changed.

use std::future::Future;
use std::sync::Arc;

use deskbridge_core::model::OutputSnapshot;
use deskbridge_core::now_ms;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::bridge::Bridge;

/// Result of a single poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    Disabled,
    CaptureFailed,
    /// Nothing long enough to count as output.
    NoOutput,
    Unchanged,
    Relayed,
    RelayFailed,
}

impl Bridge {
    /// One watcher iteration. Never fails; problems are logged and reported as an outcome.
    pub async fn run_cycle(&self) -> CycleOutcome {
        if !self.monitoring_enabled() {
            debug!("monitoring disabled; skipping cycle");
            return CycleOutcome::Disabled;
        }

        let previous = self.store.get_snapshot().await;

        let text = match self.capture.read_region().await {
            Ok(t) => t.trim().to_string(),
            Err(e) => {
                warn!(error = %e, "capture failed");
                return CycleOutcome::CaptureFailed;
            }
        };
        if text.chars().count() <= self.min_output_len {
            debug!(chars = text.chars().count(), "no output captured");
            return CycleOutcome::NoOutput;
        }
        if text == previous.text {
            debug!("output unchanged");
            return CycleOutcome::Unchanged;
        }

        info!(chars = text.chars().count(), "new output detected");
        let report = self.relay.relay(&text).await;
        if !report.is_success() {
            return CycleOutcome::RelayFailed;
        }

        let next = OutputSnapshot {
            text,
            captured_at_ms: now_ms(),
        };
        match self.store.compare_and_set_snapshot(&previous, next).await {
            Ok(true) => {}
            Ok(false) => warn!("snapshot changed underneath the watcher; keeping newer value"),
            Err(e) => warn!(error = %e, "failed to persist snapshot; keeping it in memory only"),
        }
        CycleOutcome::Relayed
    }
}

/// Runs [`Bridge::run_cycle`], then sleeps the full poll interval, until `shutdown` flips
/// to `true`. A slow relay pushes the next capture back rather than shortening the pause.
pub fn spawn_watcher(bridge: Arc<Bridge>, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let pause = bridge.poll_interval();
        info!(interval_ms = pause.as_millis() as u64, "watcher started");
        while !*shutdown.borrow() {
            let outcome = bridge.run_cycle().await;
            debug!(?outcome, "watcher cycle");
            tokio::select! {
                _ = sleep(pause) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        info!("watcher stopped");
    })
}

/// Waits for `signal`, then tells the watcher to stop. Used as the server's graceful
/// shutdown future so polling ends at the signal, not after open connections drain.
pub async fn stop_watcher_on<F>(signal: F, stop: watch::Sender<bool>)
where
    F: Future<Output = ()>,
{
    signal.await;
    let _ = stop.send(true);
}
