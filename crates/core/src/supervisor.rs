//! Restart supervisor state machine (pure).
//!
//! The machine never touches processes. The shell feeds it [`Event`]s (launch results,
//! liveness observations, timer expiry, stop signals) and carries out the returned
//! [`Action`]s in order. Every `TerminateWorker` action is acknowledged with
//! [`Event::WorkerStopped`] once the old worker is gone.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Starting,
    Running,
    Restarting,
    Stopping,
    /// Terminal: restart budget used up.
    Exhausted,
    /// Terminal: stopped on request.
    Stopped,
    /// Terminal: the very first launch failed.
    Failed,
}

impl Phase {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Exhausted | Self::Stopped | Self::Failed)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Launched,
    LaunchFailed(String),
    /// Liveness poll found the worker dead.
    WorkerExited { code: Option<i32> },
    BackoffElapsed,
    StopRequested,
    WorkerStopped,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Launch,
    WaitBackoff(Duration),
    /// Graceful termination with a bounded wait, then a forced kill.
    TerminateWorker,
    Halt(HaltReason),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HaltReason {
    Exhausted { restarts: u32 },
    LaunchFailed(String),
    Stopped,
}

/// Delay growth between restarts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BackoffPolicy {
    /// Same delay before every restart.
    Fixed,
    /// Delay doubles per restart, capped at `max_ms`.
    Exponential { max_ms: u64 },
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self::Fixed
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupervisorPolicy {
    pub max_restarts: u32,
    pub restart_delay: Duration,
    pub backoff: BackoffPolicy,
}

impl SupervisorPolicy {
    /// Delay before restart number `restart` (1-based).
    pub fn delay_for(&self, restart: u32) -> Duration {
        match self.backoff {
            BackoffPolicy::Fixed => self.restart_delay,
            BackoffPolicy::Exponential { max_ms } => {
                let shift = restart.saturating_sub(1).min(31);
                let base = self.restart_delay.as_millis() as u64;
                let ms = base.saturating_mul(1u64 << shift).min(max_ms.max(base));
                Duration::from_millis(ms)
            }
        }
    }
}

/// Snapshot of the machine for logging and tests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupervisorState {
    pub phase: Phase,
    pub restart_count: u32,
    pub max_restarts: u32,
    pub restart_delay_ms: u64,
    pub launches: u32,
}

#[derive(Debug, Clone)]
pub struct SupervisorMachine {
    policy: SupervisorPolicy,
    phase: Phase,
    restart_count: u32,
    launches: u32,
}

impl SupervisorMachine {
    pub fn new(policy: SupervisorPolicy) -> Self {
        Self {
            policy,
            phase: Phase::Starting,
            restart_count: 0,
            launches: 0,
        }
    }

    /// Initial actions: launch the first worker.
    pub fn start(&self) -> Vec<Action> {
        vec![Action::Launch]
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn restart_count(&self) -> u32 {
        self.restart_count
    }

    pub fn launches(&self) -> u32 {
        self.launches
    }

    pub fn state(&self) -> SupervisorState {
        SupervisorState {
            phase: self.phase,
            restart_count: self.restart_count,
            max_restarts: self.policy.max_restarts,
            restart_delay_ms: self.policy.restart_delay.as_millis() as u64,
            launches: self.launches,
        }
    }

    pub fn handle(&mut self, event: Event) -> Vec<Action> {
        use Phase::*;

        if event == Event::StopRequested {
            return match self.phase {
                Exhausted | Stopped | Failed | Stopping => vec![],
                _ => {
                    self.phase = Stopping;
                    vec![Action::TerminateWorker]
                }
            };
        }

        match (self.phase, event) {
            (Starting, Event::Launched) => {
                self.launches += 1;
                self.phase = Running;
                vec![]
            }
            (Starting, Event::LaunchFailed(reason)) if self.launches == 0 => {
                self.phase = Failed;
                vec![Action::Halt(HaltReason::LaunchFailed(reason))]
            }
            // A relaunch that fails burns a restart so a broken binary cannot storm.
            (Starting, Event::LaunchFailed(_)) => self.on_worker_death(),
            (Running, Event::WorkerExited { .. }) => self.on_worker_death(),
            (Restarting, Event::BackoffElapsed) => vec![Action::TerminateWorker],
            (Restarting, Event::WorkerStopped) => {
                self.phase = Starting;
                vec![Action::Launch]
            }
            (Stopping, Event::WorkerStopped) => {
                self.phase = Stopped;
                vec![Action::Halt(HaltReason::Stopped)]
            }
            (phase, event) => {
                debug!(?phase, ?event, "supervisor ignored event");
                vec![]
            }
        }
    }

    fn on_worker_death(&mut self) -> Vec<Action> {
        self.restart_count += 1;
        if self.restart_count >= self.policy.max_restarts {
            self.phase = Phase::Exhausted;
            return vec![Action::Halt(HaltReason::Exhausted {
                restarts: self.restart_count,
            })];
        }
        self.phase = Phase::Restarting;
        vec![Action::WaitBackoff(self.policy.delay_for(self.restart_count))]
    }
}
