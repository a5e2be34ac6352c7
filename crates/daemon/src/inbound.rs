use deskbridge_core::api::{InboundResponse, InboundStatus};
use deskbridge_core::loop_guard::Verdict;
use deskbridge_core::model::InboundMessage;
use tracing::{info, warn};

use crate::bridge::Bridge;

pub const REPLY_DENIED: &str = "Access denied.";
pub const REPLY_TOO_SHORT: &str = "Message too short, ignored.";
pub const REPLY_ACK: &str = "Message received, processing...";
pub const REPLY_SENT: &str = "Sent to the desktop app.";
pub const REPLY_FAILED: &str = "Could not reach the desktop app. Make sure it is open and visible.";

/// Receipt acks go out on the 1st, 6th, 11th... message.
const ACK_EVERY: u64 = 5;
/// Success and failure notices go out on the 1st, 4th, 7th... occurrence.
const NOTICE_EVERY: u64 = 3;

/// What the pipeline did with one message, plus what to tell the sender.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundOutcome {
    pub status: InboundStatus,
    pub replies: Vec<String>,
}

impl InboundOutcome {
    fn silent(status: InboundStatus) -> Self {
        Self {
            status,
            replies: Vec::new(),
        }
    }

    pub fn into_response(self) -> InboundResponse {
        InboundResponse {
            ok: self.status == InboundStatus::Dispatched,
            status: self.status,
            replies: self.replies,
        }
    }
}

fn on_cadence(count: u64, every: u64) -> bool {
    count % every == 1
}

impl Bridge {
    /// Runs one chat message through authorization, loop prevention, throttling and
    /// dispatch, in that order. Never fails; every path ends in an [`InboundOutcome`].
    pub async fn handle_inbound(&self, msg: InboundMessage) -> InboundOutcome {
        if !self.gate.authorize(msg.sender) {
            self.stats.record_error();
            warn!(sender = %msg.sender, "unauthorized inbound message");
            return InboundOutcome {
                status: InboundStatus::Denied,
                replies: vec![REPLY_DENIED.to_string()],
            };
        }

        if let Some(rejected) = self.admit(&msg) {
            return InboundOutcome::silent(rejected);
        }

        let received = self.stats.record_received();
        info!(sender = %msg.sender, received, chars = msg.text.chars().count(), "inbound message");

        if msg.text.chars().count() < self.min_text_len {
            return InboundOutcome {
                status: InboundStatus::TooShort,
                replies: vec![REPLY_TOO_SHORT.to_string()],
            };
        }

        let mut replies = Vec::new();
        if on_cadence(received, ACK_EVERY) {
            replies.push(REPLY_ACK.to_string());
        }

        let status = if self.dispatcher.dispatch(&msg.text).await.is_success() {
            if on_cadence(self.stats.record_sent(), NOTICE_EVERY) {
                replies.push(REPLY_SENT.to_string());
            }
            InboundStatus::Dispatched
        } else {
            if on_cadence(self.stats.record_error(), NOTICE_EVERY) {
                replies.push(REPLY_FAILED.to_string());
            }
            InboundStatus::DispatchFailed
        };

        InboundOutcome { status, replies }
    }
}

impl Bridge {
    /// Loop guard and throttle as one step. The message becomes the sender's latest text
    /// only once the throttle has let it through; both locks are released on return.
    fn admit(&self, msg: &InboundMessage) -> Option<InboundStatus> {
        let mut guard = self.guard();
        match guard.check(msg) {
            Verdict::Accept => {}
            Verdict::Echo => {
                info!(sender = %msg.sender, "ignoring relayed output echoed back");
                return Some(InboundStatus::Echo);
            }
            Verdict::Duplicate => {
                info!(sender = %msg.sender, "ignoring duplicate message");
                return Some(InboundStatus::Duplicate);
            }
        }
        if !self.inbound_cooldown().try_acquire(msg.received_at_ms) {
            info!(sender = %msg.sender, "inbound throttled");
            return Some(InboundStatus::Throttled);
        }
        guard.commit(msg);
        None
    }
}
