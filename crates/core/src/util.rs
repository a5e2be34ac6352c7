use std::time::{SystemTime, UNIX_EPOCH};

/// Returns current unix epoch milliseconds.
pub fn now_ms() -> i64 {
    let dur = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    dur.as_millis() as i64
}

/// Converts epoch milliseconds into fractional unix seconds.
pub fn unix_secs(ms: i64) -> f64 {
    ms as f64 / 1000.0
}
