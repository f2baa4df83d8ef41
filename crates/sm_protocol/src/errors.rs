//! Closed error-code taxonomy (spec §7). These are stored verbatim on
//! artifact/task rows and surfaced in events and API envelopes; never raw
//! stack traces.

pub const TEXT_EXTRACT_FAIL: &str = "TEXT_EXTRACT_FAIL";
pub const PDF_CONVERT_FAIL: &str = "PDF_CONVERT_FAIL";
pub const THUMB_FAIL: &str = "THUMB_FAIL";
pub const EMBED_FAIL: &str = "EMBED_FAIL";
pub const IMG_VEC_FAIL: &str = "IMG_VEC_FAIL";
pub const THUMB_MISSING: &str = "THUMB_MISSING";
pub const IMG_VEC_SKIPPED: &str = "IMG_VEC_SKIPPED";
pub const WATCHDOG_TIMEOUT: &str = "WATCHDOG_TIMEOUT";
pub const LIBRARY_ROOT_NOT_FOUND: &str = "library_root_not_found";
pub const JOB_NOT_FOUND: &str = "job_not_found";

/// API-level failure envelope: `{ok: false, message: <code>}`. Unexpected
/// internal errors are mapped to `"internal_error"` rather than leaking
/// their `Display` text.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ErrorEnvelope {
    pub ok: bool,
    pub message: String,
}

impl ErrorEnvelope {
    pub fn new(message: impl Into<String>) -> Self {
        ErrorEnvelope {
            ok: false,
            message: message.into(),
        }
    }

    pub fn internal() -> Self {
        ErrorEnvelope::new("internal_error")
    }
}
