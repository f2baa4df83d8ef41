//! Orchestrates one job's whole lifetime: planning, the fixed pipeline
//! run order, and finalization into `COMPLETED`/`CANCELLED`/`FAILED`.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use serde_json::json;
use sm_db::Catalog;
use sm_protocol::{JobOptions, JobStatus};
use tokio::sync::Mutex;
use tracing::{error, info};

use crate::context::JobContext;
use crate::error::{DaemonError, Result};
use crate::event_bus::EventBus;
use crate::planner;
use crate::pipelines;
use crate::tokens::{CancelToken, PauseToken};

struct JobHandle {
    cancel: CancelToken,
    pause: PauseToken,
}

/// Registry of in-flight jobs plus the shared catalog/bus. One instance
/// lives for the daemon's whole process lifetime.
#[derive(Clone)]
pub struct JobManager {
    catalog: Catalog,
    bus: EventBus,
    handles: Arc<Mutex<HashMap<i64, JobHandle>>>,
}

impl JobManager {
    pub fn new(catalog: Catalog, bus: EventBus) -> Self {
        JobManager {
            catalog,
            bus,
            handles: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    /// Creates the job row, registers its cancel/pause tokens, and spawns
    /// the run loop in the background. Returns the new job id immediately.
    pub async fn create(&self, library_root: PathBuf, options: JobOptions) -> Result<i64> {
        let now = crate::clock::now_epoch();
        let options_json = serde_json::to_string(&options).unwrap_or_else(|_| "{}".to_string());
        let job_id = self
            .catalog
            .create_job(&library_root.to_string_lossy(), &options_json, now)
            .await?;

        let cancel = CancelToken::new();
        let pause = PauseToken::new();
        self.handles.lock().await.insert(
            job_id,
            JobHandle {
                cancel: cancel.clone(),
                pause: pause.clone(),
            },
        );

        self.bus
            .publish(job_id, "job_created", json!({"job_id": job_id}), now)
            .await;

        let ctx = JobContext {
            catalog: self.catalog.clone(),
            bus: self.bus.clone(),
            job_id,
            library_root,
            options,
            cancel,
            pause,
        };
        let manager = self.clone();
        tokio::spawn(async move {
            manager.run(ctx).await;
        });

        Ok(job_id)
    }

    pub async fn pause(&self, job_id: i64) -> Result<()> {
        let handles = self.handles.lock().await;
        let handle = handles.get(&job_id).ok_or(DaemonError::JobNotFound(job_id))?;
        handle.pause.pause();
        Ok(())
    }

    pub async fn resume(&self, job_id: i64) -> Result<()> {
        let handles = self.handles.lock().await;
        let handle = handles.get(&job_id).ok_or(DaemonError::JobNotFound(job_id))?;
        handle.pause.resume();
        Ok(())
    }

    pub async fn cancel(&self, job_id: i64) -> Result<()> {
        let handles = self.handles.lock().await;
        let handle = handles.get(&job_id).ok_or(DaemonError::JobNotFound(job_id))?;
        handle.cancel.cancel();
        handle.pause.resume();
        Ok(())
    }

    async fn run(&self, ctx: JobContext) {
        let job_id = ctx.job_id;

        if let Err(e) = self.catalog.set_job_status(job_id, JobStatus::Planning).await {
            error!(job_id, error = %e, "failed to mark job planning");
        }
        ctx.publish("job_status_changed", json!({"status": "planning"})).await;

        let outcome = self.run_inner(&ctx).await;

        self.handles.lock().await.remove(&job_id);

        match outcome {
            Ok(()) => {
                let now = crate::clock::now_epoch();
                let _ = self.catalog.mark_job_finished(job_id, JobStatus::Completed, now).await;
                ctx.publish("job_completed", json!({})).await;
                info!(job_id, "job completed");
            }
            Err(DaemonError::Cancelled) => {
                let now = crate::clock::now_epoch();
                let _ = self.catalog.cancel_tasks_for_job(job_id, now).await;
                let _ = self.catalog.cancel_all_in_flight_artifacts(now).await;
                let _ = self.catalog.mark_job_finished(job_id, JobStatus::Cancelled, now).await;
                ctx.publish("job_cancelled", json!({})).await;
                info!(job_id, "job cancelled");
            }
            Err(e) => {
                let now = crate::clock::now_epoch();
                let message = e.to_string();
                let _ = self.catalog.mark_job_finished(job_id, JobStatus::Failed, now).await;
                ctx.publish("job_failed", json!({"error": message})).await;
                error!(job_id, error = %e, "job failed");
            }
        }
    }

    async fn run_inner(&self, ctx: &JobContext) -> Result<()> {
        ctx.checkpoint().await?;
        let summary =
            planner::plan_job(&ctx.catalog, ctx.job_id, &ctx.library_root, &ctx.options, ctx.now()).await?;
        ctx.publish("job_planning_finished", summary.to_event_payload()).await;

        self.catalog.mark_job_started(ctx.job_id, ctx.now()).await?;
        ctx.publish("job_status_changed", json!({"status": "running"})).await;

        ctx.checkpoint().await?;
        pipelines::text_bm25::run(ctx).await?;

        ctx.checkpoint().await?;
        pipelines::text_vec::run(ctx).await?;

        ctx.checkpoint().await?;
        pipelines::thumb::run(ctx).await?;

        ctx.checkpoint().await?;
        pipelines::img_vec::run(ctx).await?;

        Ok(())
    }
}
