use sm_protocol::Aspect;

use crate::catalog::Catalog;
use crate::error::Result;
use crate::models::PageRow;

/// Result of seeding a page at planning time: whether its stat snapshot
/// changed from what's already on record.
pub struct PageSeed {
    pub page_id: i64,
    pub changed: bool,
}

impl Catalog {
    /// Creates the page row on first sighting of `(file_id, ordinal)`, or
    /// compares the new `(size, mtime)` against the stored pair and updates
    /// in place, reporting whether it differed.
    pub async fn seed_page(
        &self,
        file_id: i64,
        ordinal: i64,
        aspect: Aspect,
        size_bytes: i64,
        mtime_epoch: f64,
    ) -> Result<PageSeed> {
        let existing = sqlx::query_as::<_, PageRow>(
            "SELECT * FROM pages WHERE file_id = ? AND ordinal = ?",
        )
        .bind(file_id)
        .bind(ordinal)
        .fetch_optional(self.writer())
        .await?;

        if let Some(existing) = existing {
            let changed =
                existing.src_size_bytes != size_bytes || existing.src_mtime_epoch != mtime_epoch;
            if changed {
                sqlx::query(
                    "UPDATE pages SET aspect = ?, src_size_bytes = ?, src_mtime_epoch = ? WHERE id = ?",
                )
                .bind(aspect.as_str())
                .bind(size_bytes)
                .bind(mtime_epoch)
                .bind(existing.id)
                .execute(self.writer())
                .await?;
            }
            return Ok(PageSeed {
                page_id: existing.id,
                changed,
            });
        }

        let page_id = sqlx::query_scalar::<_, i64>(
            r#"INSERT INTO pages (file_id, ordinal, aspect, src_size_bytes, src_mtime_epoch)
               VALUES (?, ?, ?, ?, ?)
               RETURNING id"#,
        )
        .bind(file_id)
        .bind(ordinal)
        .bind(aspect.as_str())
        .bind(size_bytes)
        .bind(mtime_epoch)
        .fetch_one(self.writer())
        .await?;

        Ok(PageSeed {
            page_id,
            changed: true,
        })
    }

    pub async fn get_pages_for_file(&self, file_id: i64) -> Result<Vec<PageRow>> {
        let rows = sqlx::query_as::<_, PageRow>(
            "SELECT * FROM pages WHERE file_id = ? ORDER BY ordinal",
        )
        .bind(file_id)
        .fetch_all(self.reader())
        .await?;
        Ok(rows)
    }

    pub async fn get_page(&self, page_id: i64) -> Result<Option<PageRow>> {
        let row = sqlx::query_as::<_, PageRow>("SELECT * FROM pages WHERE id = ?")
            .bind(page_id)
            .fetch_optional(self.reader())
            .await?;
        Ok(row)
    }

    /// Deletes pages of a file whose ordinal exceeds the file's current
    /// slide count, so a shrunk deck doesn't leave orphaned stale pages.
    pub async fn prune_pages_beyond(&self, file_id: i64, slide_count: i64) -> Result<()> {
        sqlx::query("DELETE FROM pages WHERE file_id = ? AND ordinal > ?")
            .bind(file_id)
            .bind(slide_count)
            .execute(self.writer())
            .await?;
        Ok(())
    }
}
