//! Background sweep: any task stuck `RUNNING` with a stale heartbeat is
//! presumed dead (panicked worker, killed subprocess, crashed process) and
//! force-errored so a job can never hang forever.

use std::time::Duration;

use sm_db::Catalog;
use sm_protocol::errors::WATCHDOG_TIMEOUT;
use sm_protocol::TaskStatus;
use tracing::warn;

use crate::clock::now_epoch;
use crate::event_bus::EventBus;

const POLL_INTERVAL: Duration = Duration::from_millis(2_000);
const STALE_AFTER_SEC: f64 = 30.0;

pub async fn run(catalog: Catalog, bus: EventBus) {
    loop {
        tokio::time::sleep(POLL_INTERVAL).await;

        let now = now_epoch();
        let stale = match catalog.find_stale_running_tasks(now - STALE_AFTER_SEC).await {
            Ok(tasks) => tasks,
            Err(e) => {
                warn!(error = %e, "watchdog sweep failed to query stale tasks");
                continue;
            }
        };

        for task in stale {
            warn!(task_id = task.id, job_id = task.job_id, "watchdog: task heartbeat stale, marking errored");
            if let Err(e) = catalog
                .finish_task(task.id, TaskStatus::Error, Some(WATCHDOG_TIMEOUT), None, now)
                .await
            {
                warn!(error = %e, task_id = task.id, "watchdog failed to finish stale task");
                continue;
            }
            bus.publish(
                task.job_id,
                "task_error",
                serde_json::json!({
                    "task_id": task.id,
                    "kind": (*task.kind).as_str(),
                    "error_code": WATCHDOG_TIMEOUT,
                }),
                now,
            )
            .await;
        }
    }
}
