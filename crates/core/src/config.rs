//! `deskbridge.toml`: defaults, loading and startup validation.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::auth::AuthorizationGate;
use crate::error::BridgeError;
use crate::model::{Identity, Point, SubmitMethod};
use crate::payload::{DEFAULT_MAX_PAYLOAD_LEN, DEFAULT_SIGNATURE, TRUNCATION_MARKER};
use crate::supervisor::{BackoffPolicy, SupervisorPolicy};

/// Environment variable that overrides `transport.token`.
pub const TOKEN_ENV: &str = "DESKBRIDGE_TRANSPORT_TOKEN";

/// Default config file name, looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "deskbridge.toml";

/// Everything the daemon and the supervisor read from `deskbridge.toml`.
///
/// Every field has a default so a partial file (or none at all) is valid input; the
/// only value without a usable default is the transport token.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    pub server: ServerConfig,
    pub security: SecurityConfig,
    pub transport: TransportConfig,
    pub inbound: InboundConfig,
    pub relay: RelayConfig,
    pub watcher: WatcherConfig,
    pub desktop: DesktopConfig,
    pub supervisor: SupervisorConfig,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub listen: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: "127.0.0.1:8787".to_string(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// When off, every caller is authorized.
    pub enabled: bool,
    pub allowed: Vec<i64>,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            allowed: Vec::new(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    pub api_base: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    pub timeout_ms: u64,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            api_base: "https://api.telegram.org".to_string(),
            token: None,
            timeout_ms: 10_000,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct InboundConfig {
    /// Duplicate-text window of the loop guard.
    pub cooldown_ms: i64,
    /// Global anti-spam spacing between accepted messages.
    pub min_interval_ms: i64,
    pub min_text_len: usize,
    /// Extra echo markers; the relay signature is always added.
    pub markers: Vec<String>,
}

impl Default for InboundConfig {
    fn default() -> Self {
        Self {
            cooldown_ms: 2_000,
            min_interval_ms: 1_000,
            min_text_len: 2,
            markers: [
                "Relayed output",
                "✅ Task finished",
                "✅ Code fixed",
                "✅ Page created",
                "📋 Explanation",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    pub signature: String,
    pub max_payload_len: usize,
    pub send_spacing_ms: u64,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            signature: DEFAULT_SIGNATURE.to_string(),
            max_payload_len: DEFAULT_MAX_PAYLOAD_LEN,
            send_spacing_ms: 500,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct WatcherConfig {
    /// Initial value of the runtime monitoring toggle.
    pub enabled: bool,
    pub poll_interval_ms: u64,
    pub min_output_len: usize,
    pub state_file: PathBuf,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            poll_interval_ms: 3_000,
            min_output_len: 10,
            state_file: PathBuf::from(".deskbridge").join("last_response.json"),
        }
    }
}

/// Coordinates and external commands used to drive the desktop application.
///
/// Argv templates understand `{text}`, `{keys}`, `{x}` and `{y}`. An empty argv makes that
/// step a no-op.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct DesktopConfig {
    pub action_delay_ms: u64,
    /// `none` or empty selects the click path.
    pub submit_shortcut: Option<String>,
    pub submit_button: Point,
    pub input_field: Point,
    pub response_area: Point,
    pub focus_cmd: Vec<String>,
    pub click_cmd: Vec<String>,
    pub clear_cmd: Vec<String>,
    pub type_cmd: Vec<String>,
    pub key_cmd: Vec<String>,
    pub capture_cmd: Vec<String>,
}

fn argv(parts: &[&str]) -> Vec<String> {
    parts.iter().map(|s| s.to_string()).collect()
}

impl Default for DesktopConfig {
    fn default() -> Self {
        Self {
            action_delay_ms: 500,
            submit_shortcut: Some("ctrl+enter".to_string()),
            submit_button: Point { x: 850, y: 800 },
            input_field: Point { x: 500, y: 800 },
            response_area: Point { x: 600, y: 700 },
            focus_cmd: argv(&["xdotool", "search", "--onlyvisible", "--class", "code", "windowactivate"]),
            click_cmd: argv(&["xdotool", "mousemove", "{x}", "{y}", "click", "1"]),
            clear_cmd: argv(&["xdotool", "key", "ctrl+a", "Delete"]),
            type_cmd: argv(&["xdotool", "type", "--delay", "10", "--", "{text}"]),
            key_cmd: argv(&["xdotool", "key", "{keys}"]),
            capture_cmd: argv(&[
                "sh",
                "-c",
                "xdotool mousemove {x} {y} click 1 key ctrl+a ctrl+c && sleep 0.2 && xclip -o -selection clipboard",
            ]),
        }
    }
}

impl DesktopConfig {
    pub fn submit_method(&self) -> SubmitMethod {
        SubmitMethod::resolve(self.submit_shortcut.as_deref(), self.submit_button)
    }

    pub fn action_delay(&self) -> Duration {
        Duration::from_millis(self.action_delay_ms)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct SupervisorConfig {
    pub max_restarts: u32,
    pub restart_delay_ms: u64,
    pub backoff: BackoffPolicy,
    pub poll_interval_ms: u64,
    pub stop_timeout_ms: u64,
    /// Worker argv; empty means "run the daemon binary next to the supervisor".
    pub worker: Vec<String>,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            max_restarts: 5,
            restart_delay_ms: 10_000,
            backoff: BackoffPolicy::Fixed,
            poll_interval_ms: 2_000,
            stop_timeout_ms: 5_000,
            worker: Vec::new(),
        }
    }
}

impl SupervisorConfig {
    pub fn policy(&self) -> SupervisorPolicy {
        SupervisorPolicy {
            max_restarts: self.max_restarts,
            restart_delay: Duration::from_millis(self.restart_delay_ms),
            backoff: self.backoff,
        }
    }
}

impl BridgeConfig {
    pub fn load_from(path: &Path) -> Result<Self> {
        let s = std::fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
        let cfg: BridgeConfig =
            toml::from_str(&s).with_context(|| format!("parse {}", path.display()))?;
        Ok(cfg)
    }

    /// Loads `path` when it exists, otherwise starts from defaults.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load_from(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("create {}", parent.display()))?;
        }
        let s = toml::to_string_pretty(self).with_context(|| "serialize toml")?;
        std::fs::write(path, s).with_context(|| format!("write {}", path.display()))?;
        Ok(())
    }

    /// Replaces the token with `value` when it is set and non-empty.
    pub fn apply_token_override(&mut self, value: Option<String>) {
        if let Some(token) = value.filter(|t| !t.trim().is_empty()) {
            self.transport.token = Some(token);
        }
    }

    /// Reads [`TOKEN_ENV`] into the config.
    pub fn apply_env(&mut self) {
        self.apply_token_override(std::env::var(TOKEN_ENV).ok());
    }

    /// Startup checks. Any failure here is fatal.
    pub fn validate(&self) -> Result<(), BridgeError> {
        let invalid = |msg: &str| Err(BridgeError::ConfigurationInvalid(msg.to_string()));

        if self
            .transport
            .token
            .as_deref()
            .map_or(true, |t| t.trim().is_empty())
        {
            return invalid("transport token is missing (set transport.token or DESKBRIDGE_TRANSPORT_TOKEN)");
        }
        if self.security.enabled && self.security.allowed.is_empty() {
            return invalid("security mode is on but security.allowed is empty");
        }
        if self.watcher.poll_interval_ms == 0 {
            return invalid("watcher.poll_interval_ms must be > 0");
        }
        if self.relay.max_payload_len <= TRUNCATION_MARKER.len() {
            return invalid("relay.max_payload_len must be greater than 3");
        }
        if self.supervisor.max_restarts == 0 {
            return invalid("supervisor.max_restarts must be > 0");
        }
        if self.supervisor.poll_interval_ms == 0 {
            return invalid("supervisor.poll_interval_ms must be > 0");
        }
        Ok(())
    }

    pub fn gate(&self) -> AuthorizationGate {
        AuthorizationGate::new(
            self.security.enabled,
            self.security.allowed.iter().copied().map(Identity),
        )
    }

    /// Echo markers with the relay signature always first.
    pub fn markers(&self) -> Vec<String> {
        let mut out = vec![self.relay.signature.clone()];
        out.extend(self.inbound.markers.iter().cloned());
        out
    }
}
