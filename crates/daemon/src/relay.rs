use std::sync::Arc;
use std::time::Duration;

use deskbridge_core::config::RelayConfig;
use deskbridge_core::model::{DeliveryOutcome, RelayAttempt};
use deskbridge_core::payload::format_relay;
use tokio::time::sleep;
use tracing::{info, warn};

use crate::adapters::Transport;

/// Result of one relay to every recipient.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RelayReport {
    pub delivered: usize,
    pub attempts: Vec<RelayAttempt>,
}

impl RelayReport {
    /// At least one recipient got the message.
    pub fn is_success(&self) -> bool {
        self.delivered > 0
    }
}

/// Delivery throttle: formats output and fans it out with spacing between sends.
pub struct Relay {
    transport: Arc<dyn Transport>,
    signature: String,
    max_payload_len: usize,
    send_spacing: Duration,
}

impl Relay {
    pub fn new(transport: Arc<dyn Transport>, cfg: &RelayConfig) -> Self {
        Self {
            transport,
            signature: cfg.signature.clone(),
            max_payload_len: cfg.max_payload_len,
            send_spacing: Duration::from_millis(cfg.send_spacing_ms),
        }
    }

    pub fn signature(&self) -> &str {
        &self.signature
    }

    pub async fn relay(&self, text: &str) -> RelayReport {
        let message = format_relay(&self.signature, text, self.max_payload_len);
        let recipients = self.transport.recipients();
        let mut report = RelayReport::default();

        for target in recipients {
            let ok = self.transport.send(target, &message).await;
            let outcome = if ok {
                report.delivered += 1;
                DeliveryOutcome::Success
            } else {
                warn!(recipient = %target, "relay to recipient failed");
                DeliveryOutcome::Failure
            };
            report.attempts.push(RelayAttempt {
                target,
                text: message.clone(),
                outcome,
            });
            sleep(self.send_spacing).await;
        }

        if report.is_success() {
            info!(
                delivered = report.delivered,
                attempted = report.attempts.len(),
                "relayed output"
            );
        } else {
            warn!(attempted = report.attempts.len(), "relay reached no recipient");
        }
        report
    }
}
