//! Minimum-interval throttle.

/// Minimum spacing between two accepted actions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cooldown {
    last_action_at_ms: Option<i64>,
    min_interval_ms: i64,
}

impl Cooldown {
    pub fn new(min_interval_ms: i64) -> Self {
        Self {
            last_action_at_ms: None,
            min_interval_ms,
        }
    }

    /// True while `now_ms` is still inside the window opened by the last action.
    ///
    /// A clock that went backwards counts as inside the window.
    pub fn is_cooling(&self, now_ms: i64) -> bool {
        match self.last_action_at_ms {
            Some(last) => now_ms - last < self.min_interval_ms,
            None => false,
        }
    }

    /// Records an action at `now_ms` unless the window is still open.
    pub fn try_acquire(&mut self, now_ms: i64) -> bool {
        if self.is_cooling(now_ms) {
            return false;
        }
        self.last_action_at_ms = Some(now_ms);
        true
    }

    pub fn last_action_at_ms(&self) -> Option<i64> {
        self.last_action_at_ms
    }

    pub fn min_interval_ms(&self) -> i64 {
        self.min_interval_ms
    }
}
