use std::time::{SystemTime, UNIX_EPOCH};

/// Current wall-clock time as a Unix epoch with fractional seconds — the
/// same unit every `*_epoch` catalog column and `Event.ts` field uses.
pub fn now_epoch() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock before 1970")
        .as_secs_f64()
}
