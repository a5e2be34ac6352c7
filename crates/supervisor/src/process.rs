use std::process::Stdio;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::process::{Child, Command};
use tracing::{info, warn};

use crate::{Launcher, WorkerHandle};

/// Launches the worker as a child process that inherits stdout/stderr.
#[derive(Debug, Clone)]
pub struct ProcessLauncher {
    argv: Vec<String>,
}

impl ProcessLauncher {
    pub fn new(argv: Vec<String>) -> Result<Self> {
        anyhow::ensure!(!argv.is_empty(), "worker command is empty");
        Ok(Self { argv })
    }

    pub fn argv(&self) -> &[String] {
        &self.argv
    }
}

#[async_trait]
impl Launcher for ProcessLauncher {
    async fn launch(&self) -> Result<Box<dyn WorkerHandle>> {
        let (program, args) = self.argv.split_first().context("worker command is empty")?;
        let child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("spawn {program}"))?;
        info!(pid = ?child.id(), program = %program, "spawned worker");
        Ok(Box::new(ProcessHandle { child }))
    }
}

pub struct ProcessHandle {
    child: Child,
}

#[async_trait]
impl WorkerHandle for ProcessHandle {
    fn try_exit(&mut self) -> Result<Option<Option<i32>>> {
        let status = self.child.try_wait().context("poll worker")?;
        Ok(status.map(|s| s.code()))
    }

    async fn terminate(&mut self, timeout: Duration) -> Result<()> {
        if self.child.try_wait()?.is_some() {
            return Ok(());
        }
        request_stop(&self.child);
        match tokio::time::timeout(timeout, self.child.wait()).await {
            Ok(status) => {
                let status = status.context("wait for worker")?;
                info!(%status, "worker stopped");
            }
            Err(_) => {
                warn!(timeout_ms = timeout.as_millis() as u64, "worker ignored stop request; killing");
                self.child.kill().await.context("kill worker")?;
            }
        }
        Ok(())
    }
}

/// SIGTERM on unix, so the worker can shut its server down cleanly.
#[cfg(unix)]
fn request_stop(child: &Child) {
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;

    let Some(pid) = child.id() else { return };
    let Ok(raw) = i32::try_from(pid) else {
        warn!(pid, "worker pid out of range; cannot send SIGTERM");
        return;
    };
    if let Err(e) = kill(Pid::from_raw(raw), Signal::SIGTERM) {
        warn!(error = %e, pid, "could not send SIGTERM");
    }
}

#[cfg(not(unix))]
fn request_stop(_child: &Child) {}
