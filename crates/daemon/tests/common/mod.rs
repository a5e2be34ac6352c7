#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use deskbridge_core::config::BridgeConfig;
use deskbridge_core::error::Result;
use deskbridge_core::model::{Identity, OutputSnapshot, Point};
use deskbridge_core::BridgeError;
use deskbridge_daemon::adapters::{Actuator, Capture, Transport};
use deskbridge_daemon::store::SnapshotStore;
use deskbridge_daemon::{Adapters, Bridge};

pub const OWNER: Identity = Identity(42);
pub const STRANGER: Identity = Identity(7);

pub fn config() -> BridgeConfig {
    let mut cfg = BridgeConfig::default();
    cfg.transport.token = Some("123:test".into());
    cfg.security.allowed = vec![OWNER.id()];
    cfg
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Focus,
    Click(Point),
    Clear,
    Type(String),
    Shortcut(String),
}

#[derive(Default)]
pub struct FakeActuator {
    calls: Mutex<Vec<Call>>,
    unfocusable: bool,
    fail_typing: bool,
}

impl FakeActuator {
    pub fn working() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn unfocusable() -> Arc<Self> {
        Arc::new(Self {
            unfocusable: true,
            ..Self::default()
        })
    }

    pub fn failing_typing() -> Arc<Self> {
        Arc::new(Self {
            fail_typing: true,
            ..Self::default()
        })
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    fn push(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl Actuator for FakeActuator {
    async fn focus_target(&self) -> Result<bool> {
        self.push(Call::Focus);
        Ok(!self.unfocusable)
    }

    async fn click(&self, at: Point) -> Result<()> {
        self.push(Call::Click(at));
        Ok(())
    }

    async fn clear_input(&self) -> Result<()> {
        self.push(Call::Clear);
        Ok(())
    }

    async fn inject_text(&self, text: &str) -> Result<()> {
        self.push(Call::Type(text.to_string()));
        if self.fail_typing {
            return Err(BridgeError::actuation("xdotool exited with 1"));
        }
        Ok(())
    }

    async fn press_shortcut(&self, keys: &str) -> Result<()> {
        self.push(Call::Shortcut(keys.to_string()));
        Ok(())
    }
}

/// Returns scripted reads in order; the last entry repeats forever.
pub struct ScriptedCapture {
    script: Mutex<VecDeque<std::result::Result<String, String>>>,
    reads: AtomicUsize,
}

impl ScriptedCapture {
    pub fn new<I, S>(outputs: I) -> Arc<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::with_results(outputs.into_iter().map(|s| Ok(s.into())))
    }

    pub fn with_results(
        results: impl IntoIterator<Item = std::result::Result<String, String>>,
    ) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(results.into_iter().collect()),
            reads: AtomicUsize::new(0),
        })
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Capture for ScriptedCapture {
    async fn read_region(&self) -> Result<String> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        let mut script = self.script.lock().unwrap();
        let next = if script.len() > 1 {
            script.pop_front()
        } else {
            script.front().cloned()
        };
        match next {
            Some(Ok(text)) => Ok(text),
            Some(Err(e)) => Err(BridgeError::capture(e)),
            None => Ok(String::new()),
        }
    }
}

/// Records every send. The first `fail_first` sends fail.
pub struct FakeTransport {
    recipients: Vec<Identity>,
    fail_first: AtomicUsize,
    sent: Mutex<Vec<(Identity, String)>>,
    attempts: AtomicUsize,
}

impl FakeTransport {
    pub fn new(recipients: Vec<Identity>) -> Arc<Self> {
        Self::failing_first(recipients, 0)
    }

    pub fn failing_first(recipients: Vec<Identity>, n: usize) -> Arc<Self> {
        Arc::new(Self {
            recipients,
            fail_first: AtomicUsize::new(n),
            sent: Mutex::new(Vec::new()),
            attempts: AtomicUsize::new(0),
        })
    }

    pub fn sent(&self) -> Vec<(Identity, String)> {
        self.sent.lock().unwrap().clone()
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn send(&self, recipient: Identity, text: &str) -> bool {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let failing = self
            .fail_first
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return false;
        }
        self.sent.lock().unwrap().push((recipient, text.to_string()));
        true
    }

    fn recipients(&self) -> Vec<Identity> {
        self.recipients.clone()
    }
}

pub struct Harness {
    pub bridge: Arc<Bridge>,
    pub actuator: Arc<FakeActuator>,
    pub capture: Arc<ScriptedCapture>,
    pub transport: Arc<FakeTransport>,
    pub store: Arc<SnapshotStore>,
}

impl Harness {
    pub fn new(cfg: &BridgeConfig) -> Self {
        Self::build(
            cfg,
            FakeActuator::working(),
            ScriptedCapture::new(Vec::<String>::new()),
            FakeTransport::new(vec![OWNER]),
            OutputSnapshot::default(),
        )
    }

    pub fn build(
        cfg: &BridgeConfig,
        actuator: Arc<FakeActuator>,
        capture: Arc<ScriptedCapture>,
        transport: Arc<FakeTransport>,
        seed: OutputSnapshot,
    ) -> Self {
        Self::with_store(
            cfg,
            actuator,
            capture,
            transport,
            Arc::new(SnapshotStore::seeded(seed)),
        )
    }

    pub fn with_store(
        cfg: &BridgeConfig,
        actuator: Arc<FakeActuator>,
        capture: Arc<ScriptedCapture>,
        transport: Arc<FakeTransport>,
        store: Arc<SnapshotStore>,
    ) -> Self {
        let adapters = Adapters {
            actuator: actuator.clone(),
            capture: capture.clone(),
            transport: transport.clone(),
        };
        let bridge = Arc::new(Bridge::new(cfg, adapters, Arc::clone(&store)));
        Self {
            bridge,
            actuator,
            capture,
            transport,
            store,
        }
    }
}
