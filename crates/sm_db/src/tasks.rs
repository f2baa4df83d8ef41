use std::collections::HashMap;

use sm_protocol::{TaskKind, TaskStatus};
use sqlx::Row;

use crate::catalog::Catalog;
use crate::error::Result;
use crate::models::TaskRow;

/// A task together with the file/page it points at, for the job snapshot's
/// `now_running` field.
pub struct RunningTask {
    pub task_id: i64,
    pub kind: TaskKind,
    pub message: Option<String>,
    pub progress: f64,
    pub page_id: Option<i64>,
    pub file_id: Option<i64>,
    pub page_no: Option<i64>,
    pub file_path: Option<String>,
}

impl Catalog {
    pub async fn create_task(
        &self,
        job_id: i64,
        kind: TaskKind,
        page_id: Option<i64>,
        file_id: Option<i64>,
        priority: i64,
    ) -> Result<i64> {
        let id = sqlx::query_scalar::<_, i64>(
            r#"INSERT INTO tasks (job_id, kind, status, page_id, file_id, priority)
               VALUES (?, ?, 'queued', ?, ?, ?)
               RETURNING id"#,
        )
        .bind(job_id)
        .bind(kind.as_str())
        .bind(page_id)
        .bind(file_id)
        .bind(priority)
        .fetch_one(self.writer())
        .await?;
        Ok(id)
    }

    pub async fn mark_task_running(&self, task_id: i64, now: f64) -> Result<()> {
        sqlx::query(
            r#"UPDATE tasks SET status = 'running', started_epoch = ?, heartbeat_epoch = ?
               WHERE id = ?"#,
        )
        .bind(now)
        .bind(now)
        .bind(task_id)
        .execute(self.writer())
        .await?;
        Ok(())
    }

    pub async fn heartbeat_task(
        &self,
        task_id: i64,
        progress: f64,
        message: Option<&str>,
        now: f64,
    ) -> Result<()> {
        sqlx::query(
            "UPDATE tasks SET heartbeat_epoch = ?, progress = ?, message = ? WHERE id = ?",
        )
        .bind(now)
        .bind(progress)
        .bind(message)
        .bind(task_id)
        .execute(self.writer())
        .await?;
        Ok(())
    }

    pub async fn finish_task(
        &self,
        task_id: i64,
        status: TaskStatus,
        error_code: Option<&str>,
        error_message: Option<&str>,
        now: f64,
    ) -> Result<()> {
        sqlx::query(
            r#"UPDATE tasks SET
                   status = ?, finished_epoch = ?, error_code = ?, error_message = ?,
                   progress = CASE WHEN ? = 'succeeded' THEN 1.0 ELSE progress END
               WHERE id = ?"#,
        )
        .bind(status.as_str())
        .bind(now)
        .bind(error_code)
        .bind(error_message)
        .bind(status.as_str())
        .bind(task_id)
        .execute(self.writer())
        .await?;
        Ok(())
    }

    /// The job's single task row of `kind`, if the planner enqueued one.
    pub async fn get_task_by_kind(&self, job_id: i64, kind: TaskKind) -> Result<Option<TaskRow>> {
        let row = sqlx::query_as::<_, TaskRow>(
            "SELECT * FROM tasks WHERE job_id = ? AND kind = ? ORDER BY id DESC LIMIT 1",
        )
        .bind(job_id)
        .bind(kind.as_str())
        .fetch_optional(self.writer())
        .await?;
        Ok(row)
    }

    pub async fn list_tasks_for_job(&self, job_id: i64) -> Result<Vec<TaskRow>> {
        let rows = sqlx::query_as::<_, TaskRow>(
            "SELECT * FROM tasks WHERE job_id = ? ORDER BY id",
        )
        .bind(job_id)
        .fetch_all(self.reader())
        .await?;
        Ok(rows)
    }

    /// Per-kind, per-status task counts for a job's `stats` snapshot field.
    pub async fn job_stats(
        &self,
        job_id: i64,
    ) -> Result<HashMap<TaskKind, HashMap<TaskStatus, i64>>> {
        let rows = sqlx::query(
            "SELECT kind, status, COUNT(*) as n FROM tasks WHERE job_id = ? GROUP BY kind, status",
        )
        .bind(job_id)
        .fetch_all(self.reader())
        .await?;

        let mut stats: HashMap<TaskKind, HashMap<TaskStatus, i64>> = HashMap::new();
        for row in rows {
            let kind: TaskKind = row.get::<String, _>("kind").parse()?;
            let status: TaskStatus = row.get::<String, _>("status").parse()?;
            let n: i64 = row.get("n");
            stats.entry(kind).or_default().insert(status, n);
        }
        Ok(stats)
    }

    /// The single `RUNNING` task for a job, if any, joined with its page's
    /// file for the API's `now_running` snapshot field.
    pub async fn get_running_task(&self, job_id: i64) -> Result<Option<RunningTask>> {
        let row = sqlx::query(
            r#"SELECT t.id as task_id, t.kind as kind, t.message as message,
                      t.progress as progress, t.page_id as page_id, t.file_id as file_id,
                      p.ordinal as page_no, f.path as file_path
               FROM tasks t
               LEFT JOIN pages p ON p.id = t.page_id
               LEFT JOIN files f ON f.id = COALESCE(t.file_id, p.file_id)
               WHERE t.job_id = ? AND t.status = 'running'
               ORDER BY t.started_epoch DESC
               LIMIT 1"#,
        )
        .bind(job_id)
        .fetch_optional(self.reader())
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let kind: TaskKind = row.get::<String, _>("kind").parse()?;

        Ok(Some(RunningTask {
            task_id: row.get("task_id"),
            kind,
            message: row.get("message"),
            progress: row.get("progress"),
            page_id: row.get("page_id"),
            file_id: row.get("file_id"),
            page_no: row.get("page_no"),
            file_path: row.get("file_path"),
        }))
    }

    /// Tasks stuck `RUNNING` with a heartbeat older than `stale_before`,
    /// for the watchdog sweep.
    pub async fn find_stale_running_tasks(&self, stale_before: f64) -> Result<Vec<TaskRow>> {
        let rows = sqlx::query_as::<_, TaskRow>(
            r#"SELECT * FROM tasks
               WHERE status = 'running' AND (heartbeat_epoch IS NULL OR heartbeat_epoch < ?)"#,
        )
        .bind(stale_before)
        .fetch_all(self.writer())
        .await?;
        Ok(rows)
    }

    /// Marks every `QUEUED` or `RUNNING` task of a job `CANCELLED`.
    pub async fn cancel_tasks_for_job(&self, job_id: i64, now: f64) -> Result<u64> {
        let result = sqlx::query(
            r#"UPDATE tasks SET status = 'cancelled', finished_epoch = ?
               WHERE job_id = ? AND status IN ('queued', 'running')"#,
        )
        .bind(now)
        .bind(job_id)
        .execute(self.writer())
        .await?;
        Ok(result.rows_affected())
    }
}
