//! Epoch-millisecond timestamps used in outbound envelopes.

use std::time::{SystemTime, UNIX_EPOCH};

/// Milliseconds since the Unix epoch, matching the `timestamp` field of
/// outbound envelopes and the `deadline`/`countdownStartTime` fields clients send.
pub fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock is before the Unix epoch")
        .as_millis() as i64
}
