#![forbid(unsafe_code)]

//! Keeps the bridge worker alive: launches it, polls liveness, restarts it with a bounded
//! budget and stops it cleanly on request.

use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use deskbridge_core::config::SupervisorConfig;
use deskbridge_core::supervisor::{
    Action, Event, HaltReason, Phase, SupervisorMachine, SupervisorPolicy, SupervisorState,
};
use deskbridge_core::BridgeError;
use tokio::sync::watch;
use tokio::time::{interval, sleep, MissedTickBehavior};
use tracing::{error, info, warn};

pub mod process;

/// A running worker.
#[async_trait]
pub trait WorkerHandle: Send {
    /// Exit code if the worker has exited (`Some(None)` when killed by a signal).
    fn try_exit(&mut self) -> anyhow::Result<Option<Option<i32>>>;

    /// Asks the worker to stop, waits up to `timeout`, then kills it.
    async fn terminate(&mut self, timeout: Duration) -> anyhow::Result<()>;
}

#[async_trait]
pub trait Launcher: Send + Sync {
    async fn launch(&self) -> anyhow::Result<Box<dyn WorkerHandle>>;
}

/// How the supervisor finished.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupervisorExit {
    pub reason: HaltReason,
    pub state: SupervisorState,
}

impl SupervisorExit {
    /// `Ok` only for a requested stop.
    pub fn into_result(self) -> Result<SupervisorState, BridgeError> {
        match self.reason {
            HaltReason::Stopped => Ok(self.state),
            HaltReason::Exhausted { restarts } => Err(BridgeError::RestartsExhausted(restarts)),
            HaltReason::LaunchFailed(reason) => {
                Err(BridgeError::WorkerCrash(format!("worker failed to start: {reason}")))
            }
        }
    }
}

pub struct Supervisor<L> {
    launcher: L,
    policy: SupervisorPolicy,
    poll_interval: Duration,
    stop_timeout: Duration,
}

impl<L: Launcher> Supervisor<L> {
    pub fn new(launcher: L, cfg: &SupervisorConfig) -> Self {
        Self {
            launcher,
            policy: cfg.policy(),
            poll_interval: Duration::from_millis(cfg.poll_interval_ms),
            stop_timeout: Duration::from_millis(cfg.stop_timeout_ms),
        }
    }

    /// Drives the restart state machine until it halts. A `true` on `stop` requests a
    /// graceful shutdown from any phase.
    pub async fn run(&self, mut stop: watch::Receiver<bool>) -> SupervisorExit {
        let mut machine = SupervisorMachine::new(self.policy.clone());
        let mut worker: Option<Box<dyn WorkerHandle>> = None;
        let mut pending: VecDeque<Action> = machine.start().into();

        info!(
            max_restarts = self.policy.max_restarts,
            restart_delay_ms = self.policy.restart_delay.as_millis() as u64,
            "supervisor started"
        );

        loop {
            let Some(action) = pending.pop_front() else {
                let event = self.await_event(machine.phase(), &mut worker, &mut stop).await;
                pending.extend(machine.handle(event));
                continue;
            };

            match action {
                Action::Launch => {
                    let event = match self.launcher.launch().await {
                        Ok(handle) => {
                            worker = Some(handle);
                            info!(launches = machine.launches() + 1, "worker launched");
                            Event::Launched
                        }
                        Err(e) => {
                            error!(error = %format!("{e:#}"), "worker launch failed");
                            Event::LaunchFailed(format!("{e:#}"))
                        }
                    };
                    pending.extend(machine.handle(event));
                }
                Action::WaitBackoff(delay) => {
                    info!(
                        restart = machine.restart_count(),
                        max_restarts = self.policy.max_restarts,
                        delay_ms = delay.as_millis() as u64,
                        "restarting worker after delay"
                    );
                    let event = tokio::select! {
                        _ = sleep(delay) => Event::BackoffElapsed,
                        _ = stop_requested(&mut stop) => Event::StopRequested,
                    };
                    pending.extend(machine.handle(event));
                }
                Action::TerminateWorker => {
                    self.reap(&mut worker).await;
                    pending.extend(machine.handle(Event::WorkerStopped));
                }
                Action::Halt(reason) => {
                    self.reap(&mut worker).await;
                    match &reason {
                        HaltReason::Stopped => info!("supervisor stopped"),
                        HaltReason::Exhausted { restarts } => {
                            error!(restarts, "restart budget exhausted; giving up")
                        }
                        HaltReason::LaunchFailed(r) => error!(reason = %r, "worker never started"),
                    }
                    return SupervisorExit {
                        reason,
                        state: machine.state(),
                    };
                }
            }
        }
    }

    /// Waits for the next externally caused event: a worker death or a stop request.
    async fn await_event(
        &self,
        phase: Phase,
        worker: &mut Option<Box<dyn WorkerHandle>>,
        stop: &mut watch::Receiver<bool>,
    ) -> Event {
        let mut tick = interval(self.poll_interval);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = tick.tick() => {
                    let Some(w) = worker.as_mut() else {
                        warn!(?phase, "no worker handle while waiting; treating as exited");
                        return Event::WorkerExited { code: None };
                    };
                    match w.try_exit() {
                        Ok(Some(code)) => {
                            warn!(?code, "worker exited");
                            return Event::WorkerExited { code };
                        }
                        Ok(None) => {}
                        Err(e) => warn!(error = %format!("{e:#}"), "liveness check failed"),
                    }
                }
                _ = stop_requested(stop) => {
                    info!("stop requested");
                    return Event::StopRequested;
                }
            }
        }
    }

    async fn reap(&self, worker: &mut Option<Box<dyn WorkerHandle>>) {
        if let Some(mut w) = worker.take() {
            if let Err(e) = w.terminate(self.stop_timeout).await {
                warn!(error = %format!("{e:#}"), "failed to terminate worker");
            }
        }
    }
}

/// Resolves once `stop` holds `true`. Never resolves if every sender is gone.
async fn stop_requested(stop: &mut watch::Receiver<bool>) {
    if stop.wait_for(|v| *v).await.is_err() {
        std::future::pending::<()>().await;
    }
}
