//! Job event envelope and its SSE wire framing.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One event published on a job's event bus.
///
/// `seq` is a per-job monotonically increasing sequence number assigned at
/// publish time; it is never reused even across queue overflow drops.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub ts: f64,
    pub seq: u64,
    pub job_id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub payload: Value,
}

impl Event {
    /// Renders the raw SSE frame: `"data: " + json(self) + "\n\n"`.
    ///
    /// No named `event:` field, no `id:` field, matching the wire contract
    /// exactly — `axum::response::sse::Event` cannot be used here since it
    /// always emits an `event:`/`id:` pair we don't want.
    pub fn to_sse_frame(&self) -> String {
        format!(
            "data: {}\n\n",
            serde_json::to_string(self).expect("Event serializes infallibly")
        )
    }
}

/// The synthetic first frame sent on every `/jobs/{id}/events` connection,
/// before any real `Event` is relayed.
pub fn hello_frame(job_id: &str) -> String {
    format!(r#"data: {{"type":"hello","job_id":"{job_id}"}}"#, job_id = job_id) + "\n\n"
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn frame_has_no_named_event_or_id() {
        let ev = Event {
            ts: 1.0,
            seq: 1,
            job_id: "j1".to_string(),
            kind: "job_created".to_string(),
            payload: json!({}),
        };
        let frame = ev.to_sse_frame();
        assert!(frame.starts_with("data: "));
        assert!(frame.ends_with("\n\n"));
        assert!(!frame.contains("event:"));
        assert!(!frame.contains("id:"));
    }

    #[test]
    fn hello_frame_matches_seed_scenario_s7() {
        assert_eq!(
            hello_frame("abc"),
            "data: {\"type\":\"hello\",\"job_id\":\"abc\"}\n\n"
        );
    }
}
