use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use deskbridge_core::auth::AuthorizationGate;
use deskbridge_core::config::{BridgeConfig, DesktopConfig};
use deskbridge_core::cooldown::Cooldown;
use deskbridge_core::loop_guard::LoopGuard;

use crate::adapters::{Actuator, Capture, Transport};
use crate::dispatcher::Dispatcher;
use crate::relay::Relay;
use crate::store::SnapshotStore;

/// Process-wide counters.
#[derive(Debug, Default)]
pub struct Stats {
    received: AtomicU64,
    sent: AtomicU64,
    errors: AtomicU64,
}

impl Stats {
    /// Each `record_*` returns the new total.
    pub fn record_received(&self) -> u64 {
        self.received.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn record_sent(&self) -> u64 {
        self.sent.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn record_error(&self) -> u64 {
        self.errors.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn received(&self) -> u64 {
        self.received.load(Ordering::Relaxed)
    }

    pub fn sent(&self) -> u64 {
        self.sent.load(Ordering::Relaxed)
    }

    pub fn errors(&self) -> u64 {
        self.errors.load(Ordering::Relaxed)
    }
}

/// The external collaborators a bridge is wired to.
pub struct Adapters {
    pub actuator: Arc<dyn Actuator>,
    pub capture: Arc<dyn Capture>,
    pub transport: Arc<dyn Transport>,
}

/// Shared state behind the HTTP handlers and the watcher task.
pub struct Bridge {
    pub(crate) gate: AuthorizationGate,
    pub(crate) guard: Mutex<LoopGuard>,
    pub(crate) inbound_cooldown: Mutex<Cooldown>,
    pub(crate) dispatcher: Dispatcher,
    pub(crate) relay: Relay,
    pub(crate) store: Arc<SnapshotStore>,
    pub(crate) capture: Arc<dyn Capture>,
    pub(crate) monitoring: AtomicBool,
    pub(crate) stats: Stats,
    pub(crate) min_text_len: usize,
    pub(crate) min_output_len: usize,
    pub(crate) poll_interval: Duration,
    pub(crate) desktop: DesktopConfig,
}

impl Bridge {
    pub fn new(cfg: &BridgeConfig, adapters: Adapters, store: Arc<SnapshotStore>) -> Self {
        Self {
            gate: cfg.gate(),
            guard: Mutex::new(LoopGuard::new(cfg.markers(), cfg.inbound.cooldown_ms)),
            inbound_cooldown: Mutex::new(Cooldown::new(cfg.inbound.min_interval_ms)),
            dispatcher: Dispatcher::new(adapters.actuator, &cfg.desktop),
            relay: Relay::new(adapters.transport, &cfg.relay),
            store,
            capture: adapters.capture,
            monitoring: AtomicBool::new(cfg.watcher.enabled),
            stats: Stats::default(),
            min_text_len: cfg.inbound.min_text_len,
            min_output_len: cfg.watcher.min_output_len,
            poll_interval: Duration::from_millis(cfg.watcher.poll_interval_ms),
            desktop: cfg.desktop.clone(),
        }
    }

    pub fn stats(&self) -> &Stats {
        &self.stats
    }

    pub fn gate(&self) -> &AuthorizationGate {
        &self.gate
    }

    pub fn store(&self) -> &SnapshotStore {
        &self.store
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    pub fn monitoring_enabled(&self) -> bool {
        self.monitoring.load(Ordering::SeqCst)
    }

    /// Flips the runtime monitoring toggle and returns the new value.
    pub fn toggle_monitoring(&self) -> bool {
        !self.monitoring.fetch_xor(true, Ordering::SeqCst)
    }

    pub(crate) fn guard(&self) -> MutexGuard<'_, LoopGuard> {
        self.guard.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub(crate) fn inbound_cooldown(&self) -> MutexGuard<'_, Cooldown> {
        self.inbound_cooldown
            .lock()
            .unwrap_or_else(|e| e.into_inner())
    }
}
