use chrono::Utc;
use tokio::time::Instant;

pub fn now_i64() -> i64 {
    Utc::now().timestamp()
}

/// Absolute expiry for a lifetime reported in seconds; `None` on overflow.
pub fn expires_on(expires_in: i64) -> Option<i64> {
    now_i64().checked_add(expires_in)
}

pub fn get_instant() -> Instant {
    Instant::now()
}
