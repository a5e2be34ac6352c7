//! Seams to the outside world: synthetic input, screen capture and chat delivery.
//!
//! The traits are what the core loops depend on; the `Command*` implementations shell out
//! to configured argv templates (e.g. `xdotool`), and [`HttpTransport`] talks to a
//! Bot-API-style chat endpoint.

use std::process::Stdio;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use deskbridge_core::config::{DesktopConfig, TransportConfig};
use deskbridge_core::error::Result;
use deskbridge_core::model::{Identity, Point};
use deskbridge_core::BridgeError;
use serde::Serialize;
use tracing::{debug, warn};

/// Synthetic input directed at the target application.
#[async_trait]
pub trait Actuator: Send + Sync {
    /// Brings the target window to the foreground. `Ok(false)` means it could not be found.
    async fn focus_target(&self) -> Result<bool>;
    async fn click(&self, at: Point) -> Result<()>;
    async fn clear_input(&self) -> Result<()>;
    async fn inject_text(&self, text: &str) -> Result<()>;
    async fn press_shortcut(&self, keys: &str) -> Result<()>;
}

/// Reads the application's current output region as text.
#[async_trait]
pub trait Capture: Send + Sync {
    async fn read_region(&self) -> Result<String>;
}

/// Outbound chat delivery. Never fails loudly: a failed send is `false`.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, recipient: Identity, text: &str) -> bool;
    fn recipients(&self) -> Vec<Identity>;
}

/// Placeholder values substituted into an argv template.
#[derive(Debug, Default, Clone, Copy)]
pub struct Placeholders<'a> {
    pub text: Option<&'a str>,
    pub keys: Option<&'a str>,
    pub at: Option<Point>,
}

/// Expands `{text}`, `{keys}`, `{x}` and `{y}` in every argument.
///
/// Substitution is per argument, so injected text never gets re-split by a shell.
pub fn render_argv(template: &[String], vals: Placeholders<'_>) -> Vec<String> {
    template
        .iter()
        .map(|arg| {
            let mut out = arg.clone();
            if let Some(p) = vals.at {
                out = out.replace("{x}", &p.x.to_string()).replace("{y}", &p.y.to_string());
            }
            if let Some(keys) = vals.keys {
                out = out.replace("{keys}", keys);
            }
            // Text last so user input containing `{x}` is left alone.
            if let Some(text) = vals.text {
                out = out.replace("{text}", text);
            }
            out
        })
        .collect()
}

async fn run_argv_capture(argv: &[String]) -> anyhow::Result<String> {
    let (program, args) = argv.split_first().context("empty command")?;
    let out = tokio::process::Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .output()
        .await
        .with_context(|| format!("spawn {program}"))?;

    if !out.status.success() {
        anyhow::bail!(
            "command failed: {} {:?} ({}): {}",
            program,
            args,
            out.status,
            String::from_utf8_lossy(&out.stderr).trim()
        );
    }
    Ok(String::from_utf8_lossy(&out.stdout).into_owned())
}

/// [`Actuator`] backed by external commands.
#[derive(Debug, Clone)]
pub struct CommandActuator {
    focus_cmd: Vec<String>,
    click_cmd: Vec<String>,
    clear_cmd: Vec<String>,
    type_cmd: Vec<String>,
    key_cmd: Vec<String>,
}

impl CommandActuator {
    pub fn from_config(cfg: &DesktopConfig) -> Self {
        Self {
            focus_cmd: cfg.focus_cmd.clone(),
            click_cmd: cfg.click_cmd.clone(),
            clear_cmd: cfg.clear_cmd.clone(),
            type_cmd: cfg.type_cmd.clone(),
            key_cmd: cfg.key_cmd.clone(),
        }
    }

    async fn step(&self, name: &str, template: &[String], vals: Placeholders<'_>) -> Result<()> {
        if template.is_empty() {
            debug!(step = name, "actuation step not configured; skipping");
            return Ok(());
        }
        let argv = render_argv(template, vals);
        run_argv_capture(&argv)
            .await
            .map(|_| ())
            .map_err(|e| BridgeError::actuation(format!("{name}: {e:#}")))
    }
}

#[async_trait]
impl Actuator for CommandActuator {
    async fn focus_target(&self) -> Result<bool> {
        if self.focus_cmd.is_empty() {
            return Ok(true);
        }
        match run_argv_capture(&self.focus_cmd).await {
            Ok(_) => Ok(true),
            Err(e) => {
                warn!(error = %format!("{e:#}"), "target window not focused");
                Ok(false)
            }
        }
    }

    async fn click(&self, at: Point) -> Result<()> {
        let vals = Placeholders {
            at: Some(at),
            ..Default::default()
        };
        self.step("click", &self.click_cmd, vals).await
    }

    async fn clear_input(&self) -> Result<()> {
        self.step("clear", &self.clear_cmd, Placeholders::default()).await
    }

    async fn inject_text(&self, text: &str) -> Result<()> {
        let vals = Placeholders {
            text: Some(text),
            ..Default::default()
        };
        self.step("type", &self.type_cmd, vals).await
    }

    async fn press_shortcut(&self, keys: &str) -> Result<()> {
        let vals = Placeholders {
            keys: Some(keys),
            ..Default::default()
        };
        self.step("key", &self.key_cmd, vals).await
    }
}

/// [`Capture`] that runs a command and returns its trimmed stdout.
#[derive(Debug, Clone)]
pub struct CommandCapture {
    argv: Vec<String>,
}

impl CommandCapture {
    pub fn from_config(cfg: &DesktopConfig) -> Self {
        let vals = Placeholders {
            at: Some(cfg.response_area),
            ..Default::default()
        };
        Self {
            argv: render_argv(&cfg.capture_cmd, vals),
        }
    }
}

#[async_trait]
impl Capture for CommandCapture {
    async fn read_region(&self) -> Result<String> {
        if self.argv.is_empty() {
            return Err(BridgeError::capture("capture command not configured"));
        }
        let out = run_argv_capture(&self.argv)
            .await
            .map_err(|e| BridgeError::capture(format!("{e:#}")))?;
        Ok(out.trim().to_string())
    }
}

#[derive(Serialize)]
struct SendMessage<'a> {
    chat_id: i64,
    text: &'a str,
}

/// Bot-API `sendMessage` over HTTP.
#[derive(Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    endpoint: String,
    recipients: Vec<Identity>,
}

impl HttpTransport {
    pub fn new(cfg: &TransportConfig, recipients: Vec<Identity>) -> anyhow::Result<Self> {
        let token = cfg.token.as_deref().context("transport token is missing")?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(cfg.timeout_ms))
            .build()
            .context("build http client")?;
        Ok(Self {
            client,
            endpoint: format!(
                "{}/bot{}/sendMessage",
                cfg.api_base.trim_end_matches('/'),
                token
            ),
            recipients,
        })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, recipient: Identity, text: &str) -> bool {
        let body = SendMessage {
            chat_id: recipient.id(),
            text,
        };
        let res = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .and_then(|r| r.error_for_status());
        match res {
            Ok(_) => true,
            Err(e) => {
                // The endpoint embeds the token; log only the status/kind.
                let err = BridgeError::DeliveryFailure {
                    recipient,
                    reason: e.without_url().to_string(),
                };
                warn!(error = %err, "chat delivery failed");
                false
            }
        }
    }

    fn recipients(&self) -> Vec<Identity> {
        self.recipients.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn placeholders_expand_per_argument() {
        let argv = render_argv(
            &t(&["xdotool", "mousemove", "{x}", "{y}", "click", "1"]),
            Placeholders {
                at: Some(Point { x: 850, y: 800 }),
                ..Default::default()
            },
        );
        assert_eq!(argv, t(&["xdotool", "mousemove", "850", "800", "click", "1"]));
    }

    #[test]
    fn text_with_spaces_stays_one_argument() {
        let argv = render_argv(
            &t(&["xdotool", "type", "--", "{text}"]),
            Placeholders {
                text: Some("fix the {x} bug; rm -rf /"),
                ..Default::default()
            },
        );
        assert_eq!(argv.len(), 4);
        assert_eq!(argv[3], "fix the {x} bug; rm -rf /");
    }

    #[tokio::test]
    async fn unconfigured_steps_are_noops() {
        let cfg = DesktopConfig {
            focus_cmd: vec![],
            click_cmd: vec![],
            clear_cmd: vec![],
            type_cmd: vec![],
            key_cmd: vec![],
            ..DesktopConfig::default()
        };
        let act = CommandActuator::from_config(&cfg);
        assert!(act.focus_target().await.unwrap());
        act.inject_text("hello").await.unwrap();
        act.press_shortcut("ctrl+enter").await.unwrap();
    }

    #[tokio::test]
    async fn capture_without_command_fails() {
        let cfg = DesktopConfig {
            capture_cmd: vec![],
            ..DesktopConfig::default()
        };
        let cap = CommandCapture::from_config(&cfg);
        assert!(matches!(
            cap.read_region().await,
            Err(BridgeError::CaptureFailure(_))
        ));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn capture_trims_stdout() {
        let cfg = DesktopConfig {
            capture_cmd: t(&["printf", "  response at {x},{y}  \n"]),
            ..DesktopConfig::default()
        };
        let cap = CommandCapture::from_config(&cfg);
        assert_eq!(cap.read_region().await.unwrap(), "response at 600,700");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn failing_commands_map_to_outcomes() {
        let cfg = DesktopConfig {
            focus_cmd: t(&["false"]),
            type_cmd: t(&["false"]),
            ..DesktopConfig::default()
        };
        let act = CommandActuator::from_config(&cfg);
        assert!(!act.focus_target().await.unwrap());
        assert!(matches!(
            act.inject_text("hi").await,
            Err(BridgeError::ActuationFailure(_))
        ));
    }
}
