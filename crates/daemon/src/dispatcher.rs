use std::sync::Arc;
use std::time::Duration;

use deskbridge_core::config::DesktopConfig;
use deskbridge_core::error::Result;
use deskbridge_core::model::{DispatchOutcome, Point, SubmitMethod};
use tokio::sync::Mutex;
use tokio::time::sleep;
use tracing::{error, info, warn};

use crate::adapters::Actuator;

/// Pause between clearing the field and typing.
const SETTLE_DELAY: Duration = Duration::from_millis(100);

/// Types text into the target application and submits it.
///
/// Runs are serialized: two callers never interleave keystrokes.
pub struct Dispatcher {
    actuator: Arc<dyn Actuator>,
    input_field: Point,
    submit: SubmitMethod,
    action_delay: Duration,
    lock: Mutex<()>,
}

impl Dispatcher {
    pub fn new(actuator: Arc<dyn Actuator>, cfg: &DesktopConfig) -> Self {
        Self {
            actuator,
            input_field: cfg.input_field,
            submit: cfg.submit_method(),
            action_delay: cfg.action_delay(),
            lock: Mutex::new(()),
        }
    }

    pub fn submit_method(&self) -> &SubmitMethod {
        &self.submit
    }

    pub async fn dispatch(&self, text: &str) -> DispatchOutcome {
        let _guard = self.lock.lock().await;
        let preview: String = text.chars().take(50).collect();
        info!(chars = text.chars().count(), %preview, "dispatching to desktop app");

        match self.run_steps(text).await {
            Ok(true) => {
                info!("dispatch complete");
                DispatchOutcome::Success
            }
            Ok(false) => {
                warn!("target application could not be focused; nothing sent");
                DispatchOutcome::Failure
            }
            Err(e) => {
                error!(error = %e, "dispatch failed");
                DispatchOutcome::Failure
            }
        }
    }

    async fn run_steps(&self, text: &str) -> Result<bool> {
        if !self.actuator.focus_target().await? {
            return Ok(false);
        }
        self.actuator.click(self.input_field).await?;
        sleep(self.action_delay).await;

        self.actuator.clear_input().await?;
        sleep(SETTLE_DELAY).await;

        self.actuator.inject_text(text).await?;
        sleep(self.action_delay).await;

        match &self.submit {
            SubmitMethod::Shortcut { keys } => self.actuator.press_shortcut(keys).await?,
            SubmitMethod::Click { target } => self.actuator.click(*target).await?,
        }
        sleep(self.action_delay / 2).await;
        Ok(true)
    }
}
