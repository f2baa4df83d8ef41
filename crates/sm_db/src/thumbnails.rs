use sm_protocol::Aspect;

use crate::catalog::Catalog;
use crate::error::Result;
use crate::models::ThumbnailRow;

impl Catalog {
    pub async fn upsert_thumbnail(
        &self,
        page_id: i64,
        aspect: Aspect,
        width: i64,
        height: i64,
        image_path: &str,
        now: f64,
    ) -> Result<()> {
        sqlx::query(
            r#"INSERT INTO thumbnails (page_id, aspect, width, height, image_path, updated_epoch)
               VALUES (?, ?, ?, ?, ?, ?)
               ON CONFLICT(page_id) DO UPDATE SET
                   aspect = excluded.aspect,
                   width = excluded.width,
                   height = excluded.height,
                   image_path = excluded.image_path,
                   updated_epoch = excluded.updated_epoch"#,
        )
        .bind(page_id)
        .bind(aspect.as_str())
        .bind(width)
        .bind(height)
        .bind(image_path)
        .bind(now)
        .execute(self.writer())
        .await?;
        Ok(())
    }

    pub async fn get_thumbnail(&self, page_id: i64) -> Result<Option<ThumbnailRow>> {
        let row = sqlx::query_as::<_, ThumbnailRow>("SELECT * FROM thumbnails WHERE page_id = ?")
            .bind(page_id)
            .fetch_optional(self.reader())
            .await?;
        Ok(row)
    }

    /// Latest thumbnail path for a file: the highest-ordinal page's image,
    /// used as the library listing's representative image.
    pub async fn get_latest_thumbnail_path_for_file(&self, file_id: i64) -> Result<Option<String>> {
        let path = sqlx::query_scalar::<_, String>(
            r#"SELECT t.image_path FROM thumbnails t
               JOIN pages p ON p.id = t.page_id
               WHERE p.file_id = ?
               ORDER BY p.ordinal DESC
               LIMIT 1"#,
        )
        .bind(file_id)
        .fetch_optional(self.reader())
        .await?;
        Ok(path)
    }
}
