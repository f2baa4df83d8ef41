use std::path::PathBuf;

use serde_json::Value;
use sm_db::Catalog;
use sm_protocol::JobOptions;

use crate::clock::now_epoch;
use crate::error::Result;
use crate::event_bus::EventBus;
use crate::tokens::{CancelToken, PauseToken};

/// Everything a pipeline run loop needs, shared for the lifetime of one
/// job's execution.
#[derive(Clone)]
pub struct JobContext {
    pub catalog: Catalog,
    pub bus: EventBus,
    pub job_id: i64,
    pub library_root: PathBuf,
    pub options: JobOptions,
    pub cancel: CancelToken,
    pub pause: PauseToken,
}

impl JobContext {
    pub fn now(&self) -> f64 {
        now_epoch()
    }

    pub async fn publish(&self, kind: &str, payload: Value) {
        self.bus.publish(self.job_id, kind, payload, self.now()).await;
    }

    /// Call at every page boundary: blocks while paused, then fails with
    /// `Cancelled` once the cancel flag is set.
    pub async fn checkpoint(&self) -> Result<()> {
        self.pause.wait_if_paused().await;
        self.cancel.check()
    }
}
