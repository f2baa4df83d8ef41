use sm_protocol::{Aspect, ArtifactKind, ArtifactStatus};
use sqlx::Row;

use crate::catalog::Catalog;
use crate::error::Result;
use crate::models::ArtifactRow;

/// A queued artifact joined with its page and file, in the (file id, page
/// ordinal) order pipelines are required to process in.
pub struct QueuedPage {
    pub page_id: i64,
    pub file_id: i64,
    pub ordinal: i64,
    pub file_path: String,
    pub aspect: Aspect,
}

impl Catalog {
    /// Ensures exactly one `(page_id, kind)` artifact row exists, creating
    /// it `MISSING` if absent. Idempotent.
    pub async fn ensure_artifact(&self, page_id: i64, kind: ArtifactKind, now: f64) -> Result<()> {
        sqlx::query(
            r#"INSERT INTO artifacts (page_id, kind, status, updated_epoch)
               VALUES (?, ?, 'missing', ?)
               ON CONFLICT(page_id, kind) DO NOTHING"#,
        )
        .bind(page_id)
        .bind(kind.as_str())
        .bind(now)
        .execute(self.writer())
        .await?;
        Ok(())
    }

    pub async fn queue_artifact(
        &self,
        page_id: i64,
        kind: ArtifactKind,
        params_json: &str,
        now: f64,
    ) -> Result<()> {
        sqlx::query(
            r#"UPDATE artifacts SET status = 'queued', params_json = ?, updated_epoch = ?
               WHERE page_id = ? AND kind = ?"#,
        )
        .bind(params_json)
        .bind(now)
        .bind(page_id)
        .bind(kind.as_str())
        .execute(self.writer())
        .await?;
        Ok(())
    }

    pub async fn set_artifact_status(
        &self,
        page_id: i64,
        kind: ArtifactKind,
        status: ArtifactStatus,
        error_code: Option<&str>,
        error_message: Option<&str>,
        now: f64,
    ) -> Result<()> {
        sqlx::query(
            r#"UPDATE artifacts SET
                   status = ?,
                   error_code = ?,
                   error_message = ?,
                   updated_epoch = ?,
                   attempts = attempts + CASE WHEN ? = 'running' THEN 1 ELSE 0 END
               WHERE page_id = ? AND kind = ?"#,
        )
        .bind(status.as_str())
        .bind(error_code)
        .bind(error_message)
        .bind(now)
        .bind(status.as_str())
        .bind(page_id)
        .bind(kind.as_str())
        .execute(self.writer())
        .await?;
        Ok(())
    }

    pub async fn get_artifact(
        &self,
        page_id: i64,
        kind: ArtifactKind,
    ) -> Result<Option<ArtifactRow>> {
        let row = sqlx::query_as::<_, ArtifactRow>(
            "SELECT * FROM artifacts WHERE page_id = ? AND kind = ?",
        )
        .bind(page_id)
        .bind(kind.as_str())
        .fetch_optional(self.reader())
        .await?;
        Ok(row)
    }

    pub async fn get_artifacts_for_page(&self, page_id: i64) -> Result<Vec<ArtifactRow>> {
        let rows = sqlx::query_as::<_, ArtifactRow>(
            "SELECT * FROM artifacts WHERE page_id = ? ORDER BY kind",
        )
        .bind(page_id)
        .fetch_all(self.reader())
        .await?;
        Ok(rows)
    }

    /// Every `QUEUED` artifact of `kind`, joined with its page and file,
    /// ordered ascending by `(file_id, ordinal)` — the order every pipeline
    /// is required to process pages in. Unscoped by job, like
    /// [`Catalog::cancel_all_in_flight_artifacts`]; safe under the same
    /// at-most-one-active-job-run-loop invariant.
    pub async fn list_queued_pages_for_kind(&self, kind: ArtifactKind) -> Result<Vec<QueuedPage>> {
        let rows = sqlx::query(
            r#"SELECT a.page_id as page_id, p.file_id as file_id, p.ordinal as ordinal,
                      f.path as file_path, p.aspect as aspect
               FROM artifacts a
               JOIN pages p ON p.id = a.page_id
               JOIN files f ON f.id = p.file_id
               WHERE a.kind = ? AND a.status = 'queued'
               ORDER BY p.file_id, p.ordinal"#,
        )
        .bind(kind.as_str())
        .fetch_all(self.reader())
        .await?;

        rows.into_iter()
            .map(|row| {
                let aspect: Aspect = row.get::<String, _>("aspect").parse()?;
                Ok(QueuedPage {
                    page_id: row.get("page_id"),
                    file_id: row.get("file_id"),
                    ordinal: row.get("ordinal"),
                    file_path: row.get("file_path"),
                    aspect,
                })
            })
            .collect()
    }

    /// Marks every artifact still `QUEUED` or `RUNNING` across the whole
    /// catalog as `CANCELLED`. Mirrors the unscoped sweep the daemon this
    /// was ported from performs on cancel; safe under the "at most one
    /// active job run loop" invariant since no other job can be advancing
    /// artifacts concurrently. See the cancellation note in the project's
    /// design ledger.
    pub async fn cancel_all_in_flight_artifacts(&self, now: f64) -> Result<u64> {
        let result = sqlx::query(
            r#"UPDATE artifacts SET status = 'cancelled', updated_epoch = ?
               WHERE status IN ('queued', 'running')"#,
        )
        .bind(now)
        .execute(self.writer())
        .await?;
        Ok(result.rows_affected())
    }
}
