use sm_protocol::JobStatus;

use crate::catalog::Catalog;
use crate::error::Result;
use crate::models::JobRow;

impl Catalog {
    pub async fn create_job(&self, library_root: &str, options_json: &str, now: f64) -> Result<i64> {
        let id = sqlx::query_scalar::<_, i64>(
            r#"INSERT INTO jobs (library_root, created_epoch, status, options_json)
               VALUES (?, ?, 'created', ?)
               RETURNING id"#,
        )
        .bind(library_root)
        .bind(now)
        .bind(options_json)
        .fetch_one(self.writer())
        .await?;
        Ok(id)
    }

    pub async fn set_job_status(&self, job_id: i64, status: JobStatus) -> Result<()> {
        sqlx::query("UPDATE jobs SET status = ? WHERE id = ?")
            .bind(status.as_str())
            .bind(job_id)
            .execute(self.writer())
            .await?;
        Ok(())
    }

    pub async fn mark_job_started(&self, job_id: i64, now: f64) -> Result<()> {
        sqlx::query("UPDATE jobs SET status = 'running', started_epoch = ? WHERE id = ?")
            .bind(now)
            .bind(job_id)
            .execute(self.writer())
            .await?;
        Ok(())
    }

    pub async fn mark_job_finished(&self, job_id: i64, status: JobStatus, now: f64) -> Result<()> {
        sqlx::query("UPDATE jobs SET status = ?, finished_epoch = ? WHERE id = ?")
            .bind(status.as_str())
            .bind(now)
            .bind(job_id)
            .execute(self.writer())
            .await?;
        Ok(())
    }

    pub async fn get_job(&self, job_id: i64) -> Result<Option<JobRow>> {
        let row = sqlx::query_as::<_, JobRow>("SELECT * FROM jobs WHERE id = ?")
            .bind(job_id)
            .fetch_optional(self.reader())
            .await?;
        Ok(row)
    }
}
