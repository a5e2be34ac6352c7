use std::fmt;
use std::str::FromStr;

use deskbridge_core::api::{
    CalibrationReport, CommandData, CommandResponse, MonitorStatus, StatusReport,
};
use deskbridge_core::error::Result;
use deskbridge_core::model::{Identity, SubmitMethod};
use deskbridge_core::{unix_secs, BridgeError};
use tracing::{info, warn};

use crate::bridge::Bridge;

pub const TEST_PAYLOAD: &str = "Automated test from the bridge";
pub const MONITOR_TEST_PAYLOAD: &str = "Monitoring self-test: relay path is working";

const HELP_TEXT: &str = "\
Commands:
  start           - welcome message
  status          - counters and configuration
  help            - this text
  test            - type a canned message into the desktop app
  test_monitoring - relay a canned message back to chat
  monitor_status  - output monitoring state
  monitor_toggle  - turn output monitoring on or off
  calibrate       - configured screen coordinates

Any other text is typed into the desktop app and submitted.";

const START_TEXT: &str = "\
Desktop bridge is running.
Send text and it will be typed into the desktop app; new output is relayed back here.
The app must be open and visible on screen. Send `help` for commands.";

/// Front-end commands. Names parse with or without a leading `/`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Start,
    Status,
    Help,
    Test,
    TestMonitoring,
    MonitorStatus,
    MonitorToggle,
    Calibrate,
}

impl Command {
    pub const ALL: [Command; 8] = [
        Command::Start,
        Command::Status,
        Command::Help,
        Command::Test,
        Command::TestMonitoring,
        Command::MonitorStatus,
        Command::MonitorToggle,
        Command::Calibrate,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Command::Start => "start",
            Command::Status => "status",
            Command::Help => "help",
            Command::Test => "test",
            Command::TestMonitoring => "test_monitoring",
            Command::MonitorStatus => "monitor_status",
            Command::MonitorToggle => "monitor_toggle",
            Command::Calibrate => "calibrate",
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownCommand(pub String);

impl fmt::Display for UnknownCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown command: {}", self.0)
    }
}

impl std::error::Error for UnknownCommand {}

impl FromStr for Command {
    type Err = UnknownCommand;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let name = s.trim().trim_start_matches('/');
        Command::ALL
            .into_iter()
            .find(|c| c.name().eq_ignore_ascii_case(name))
            .ok_or_else(|| UnknownCommand(s.to_string()))
    }
}

fn reply(ok: bool, reply: impl Into<String>, data: Option<CommandData>) -> CommandResponse {
    CommandResponse {
        ok,
        reply: reply.into(),
        data,
    }
}

impl Bridge {
    /// Runs a front-end command for `caller`. Unauthorized callers get
    /// [`BridgeError::AuthorizationDenied`] and bump the error counter.
    pub async fn run_command(&self, caller: Identity, cmd: Command) -> Result<CommandResponse> {
        if !self.gate.authorize(caller) {
            self.stats.record_error();
            warn!(caller = %caller, command = %cmd, "unauthorized command");
            return Err(BridgeError::AuthorizationDenied(caller));
        }
        info!(caller = %caller, command = %cmd, "command");

        let resp = match cmd {
            Command::Start => reply(true, START_TEXT, None),
            Command::Help => reply(true, HELP_TEXT, None),
            Command::Status => {
                let report = self.status_report();
                let text = format!(
                    "Bridge status\nreceived: {}\nsent: {}\nerrors: {}\nsecurity: {}\nallowed users: {}\nmonitoring: {} (every {} ms)",
                    report.messages_received,
                    report.messages_sent,
                    report.errors,
                    if report.security_mode { "on" } else { "off" },
                    report.allowed_users,
                    if report.monitoring_enabled { "on" } else { "off" },
                    report.poll_interval_ms,
                );
                reply(true, text, Some(CommandData::Status(report)))
            }
            Command::Test => {
                if self.dispatcher.dispatch(TEST_PAYLOAD).await.is_success() {
                    self.stats.record_sent();
                    reply(true, "Test passed: the message was sent to the desktop app.", None)
                } else {
                    self.stats.record_error();
                    reply(false, "Test failed: check that the desktop app is open and visible.", None)
                }
            }
            Command::TestMonitoring => {
                let report = self.relay.relay(MONITOR_TEST_PAYLOAD).await;
                let data = CommandData::Relay {
                    delivered: report.delivered,
                    attempted: report.attempts.len(),
                };
                if report.is_success() {
                    reply(true, "Monitoring test sent.", Some(data))
                } else {
                    reply(false, "Monitoring test failed: no recipient could be reached.", Some(data))
                }
            }
            Command::MonitorStatus => {
                let status = self.monitor_status().await;
                let last = status
                    .last_snapshot_at
                    .map_or_else(|| "never".to_string(), |t| format!("{t:.3}"));
                let text = format!(
                    "Monitoring: {}\ninterval: {} ms\ncapture region: {}\nlast relayed output: {}",
                    if status.enabled { "on" } else { "off" },
                    status.poll_interval_ms,
                    status.capture_region,
                    last,
                );
                reply(true, text, Some(CommandData::Monitor(status)))
            }
            Command::MonitorToggle => {
                let enabled = self.toggle_monitoring();
                info!(caller = %caller, enabled, "monitoring toggled");
                let text = if enabled {
                    "Monitoring enabled."
                } else {
                    "Monitoring disabled."
                };
                reply(true, text, Some(CommandData::Monitor(self.monitor_status().await)))
            }
            Command::Calibrate => {
                let report = self.calibration_report();
                let submit = match self.dispatcher.submit_method() {
                    SubmitMethod::Shortcut { keys } => format!("shortcut {keys}"),
                    SubmitMethod::Click { target } => format!("click at {target}"),
                };
                let text = format!(
                    "Input field: {}\nSubmit: {}\nResponse area: {}\nAdjust [desktop] in deskbridge.toml and restart to change these.",
                    report.input_field, submit, report.response_area,
                );
                reply(true, text, Some(CommandData::Calibration(report)))
            }
        };
        Ok(resp)
    }

    pub fn status_report(&self) -> StatusReport {
        StatusReport {
            messages_received: self.stats.received(),
            messages_sent: self.stats.sent(),
            errors: self.stats.errors(),
            security_mode: self.gate.security_mode(),
            allowed_users: self.gate.allowed_len(),
            monitoring_enabled: self.monitoring_enabled(),
            poll_interval_ms: self.poll_interval.as_millis() as u64,
        }
    }

    pub async fn monitor_status(&self) -> MonitorStatus {
        let snap = self.store.get_snapshot().await;
        MonitorStatus {
            enabled: self.monitoring_enabled(),
            poll_interval_ms: self.poll_interval.as_millis() as u64,
            capture_region: self.desktop.response_area,
            last_snapshot_at: (!snap.is_empty()).then(|| unix_secs(snap.captured_at_ms)),
        }
    }

    pub fn calibration_report(&self) -> CalibrationReport {
        CalibrationReport {
            input_field: self.desktop.input_field,
            submit_button: self.desktop.submit_button,
            response_area: self.desktop.response_area,
            submit_shortcut: self.desktop.submit_shortcut.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_parse_with_optional_slash() {
        assert_eq!("status".parse::<Command>(), Ok(Command::Status));
        assert_eq!("/monitor_toggle".parse::<Command>(), Ok(Command::MonitorToggle));
        assert_eq!(" HELP ".parse::<Command>(), Ok(Command::Help));
        assert!("reboot".parse::<Command>().is_err());
    }

    #[test]
    fn help_lists_every_command() {
        for c in Command::ALL {
            assert!(HELP_TEXT.contains(c.name()), "{c} missing from help");
        }
    }
}
