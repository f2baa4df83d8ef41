use sm_protocol::Aspect;

use crate::catalog::Catalog;
use crate::error::Result;
use crate::models::FileRow;

impl Catalog {
    /// Inserts the file on first sighting, or updates its stat snapshot in
    /// place on later sightings. Never deletes.
    pub async fn upsert_file(
        &self,
        path: &str,
        size_bytes: i64,
        mtime_epoch: f64,
        last_scanned_epoch: f64,
    ) -> Result<i64> {
        let id = sqlx::query_scalar::<_, i64>(
            r#"INSERT INTO files (path, size_bytes, mtime_epoch, last_scanned_epoch)
               VALUES (?, ?, ?, ?)
               ON CONFLICT(path) DO UPDATE SET
                   size_bytes = excluded.size_bytes,
                   mtime_epoch = excluded.mtime_epoch,
                   last_scanned_epoch = excluded.last_scanned_epoch,
                   last_scan_error = NULL
               RETURNING id"#,
        )
        .bind(path)
        .bind(size_bytes)
        .bind(mtime_epoch)
        .bind(last_scanned_epoch)
        .fetch_one(self.writer())
        .await?;

        Ok(id)
    }

    pub async fn set_file_scan_error(&self, file_id: i64, error: &str) -> Result<()> {
        sqlx::query("UPDATE files SET last_scan_error = ? WHERE id = ?")
            .bind(error)
            .bind(file_id)
            .execute(self.writer())
            .await?;
        Ok(())
    }

    pub async fn set_file_aspect_and_slide_count(
        &self,
        file_id: i64,
        aspect: Aspect,
        slide_count: i64,
    ) -> Result<()> {
        sqlx::query("UPDATE files SET aspect = ?, slide_count = ? WHERE id = ?")
            .bind(aspect.as_str())
            .bind(slide_count)
            .bind(file_id)
            .execute(self.writer())
            .await?;
        Ok(())
    }

    pub async fn get_file(&self, file_id: i64) -> Result<Option<FileRow>> {
        let row = sqlx::query_as::<_, FileRow>("SELECT * FROM files WHERE id = ?")
            .bind(file_id)
            .fetch_optional(self.reader())
            .await?;
        Ok(row)
    }

    pub async fn get_file_by_path(&self, path: &str) -> Result<Option<FileRow>> {
        let row = sqlx::query_as::<_, FileRow>("SELECT * FROM files WHERE path = ?")
            .bind(path)
            .fetch_optional(self.reader())
            .await?;
        Ok(row)
    }

    pub async fn list_files(&self) -> Result<Vec<FileRow>> {
        let rows = sqlx::query_as::<_, FileRow>("SELECT * FROM files ORDER BY path")
            .fetch_all(self.reader())
            .await?;
        Ok(rows)
    }
}
