//! Echo suppression for inbound chat text.
//!
//! The relay step stamps every outbound payload with a signature banner. If that text
//! comes back in through the chat side (forwarded, quoted, or redelivered by the
//! transport) it must not be typed into the application again, or the two ends feed
//! each other forever.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::model::{Identity, InboundMessage};

/// Classification of an inbound message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    /// Genuine input; it is now the sender's latest message.
    Accept,
    /// Contains a relay signature marker.
    Echo,
    /// Same text as the sender's previous accepted message, inside the window.
    Duplicate,
}

impl Verdict {
    pub fn is_accept(self) -> bool {
        matches!(self, Self::Accept)
    }
}

#[derive(Debug, Clone)]
struct LastInbound {
    text: String,
    at_ms: i64,
}

#[derive(Debug, Clone)]
pub struct LoopGuard {
    markers: Vec<String>,
    window_ms: i64,
    last_by_sender: HashMap<Identity, LastInbound>,
}

impl LoopGuard {
    /// Empty markers are dropped; an empty marker would match every text.
    pub fn new(markers: impl IntoIterator<Item = String>, window_ms: i64) -> Self {
        let mut out: Vec<String> = Vec::new();
        for m in markers {
            if !m.is_empty() && !out.contains(&m) {
                out.push(m);
            }
        }
        Self {
            markers: out,
            window_ms,
            last_by_sender: HashMap::new(),
        }
    }

    pub fn markers(&self) -> &[String] {
        &self.markers
    }

    /// Content check only; independent of sender and timing.
    pub fn matches_signature(&self, text: &str) -> bool {
        self.markers.iter().any(|m| text.contains(m.as_str()))
    }

    /// True when `text` repeats the sender's previous accepted text inside the window.
    pub fn is_duplicate(&self, sender: Identity, text: &str, now_ms: i64) -> bool {
        match self.last_by_sender.get(&sender) {
            Some(last) => last.text == text && now_ms - last.at_ms < self.window_ms,
            None => false,
        }
    }

    /// Either check triggering means the text must not be dispatched.
    pub fn is_echo(&self, sender: Identity, text: &str, now_ms: i64) -> bool {
        self.matches_signature(text) || self.is_duplicate(sender, text, now_ms)
    }

    /// Classifies `msg` without recording anything.
    pub fn check(&self, msg: &InboundMessage) -> Verdict {
        if self.matches_signature(&msg.text) {
            return Verdict::Echo;
        }
        if self.is_duplicate(msg.sender, &msg.text, msg.received_at_ms) {
            return Verdict::Duplicate;
        }
        Verdict::Accept
    }

    /// Records `msg` as the sender's latest text. Call only once the message is
    /// actually going to be dispatched.
    pub fn commit(&mut self, msg: &InboundMessage) {
        self.last_by_sender.insert(
            msg.sender,
            LastInbound {
                text: msg.text.clone(),
                at_ms: msg.received_at_ms,
            },
        );
    }

    /// `check` followed by `commit` on `Accept`.
    ///
    /// Callers sharing a guard must hold one lock across check and commit so two
    /// near-simultaneous copies cannot both be accepted.
    pub fn check_and_record(&mut self, msg: &InboundMessage) -> Verdict {
        let verdict = self.check(msg);
        if verdict.is_accept() {
            self.commit(msg);
        }
        verdict
    }
}
