use crate::catalog::Catalog;
use crate::error::Result;
use crate::models::PageTextRow;

impl Catalog {
    /// Upserts the page's extracted text and, when `enable_bm25` is set,
    /// refreshes its FTS row in the same write. `fts_pages` is overwritten
    /// wholesale on each call, never patched incrementally; when BM25 is
    /// disabled for the job, no `fts_pages` row is touched at all.
    pub async fn upsert_page_text(
        &self,
        page_id: i64,
        raw_text: &str,
        norm_text: &str,
        text_sig: &str,
        enable_bm25: bool,
        now: f64,
    ) -> Result<()> {
        let mut tx = self.writer().begin().await?;

        sqlx::query(
            r#"INSERT INTO page_text (page_id, raw_text, norm_text, text_sig, updated_epoch)
               VALUES (?, ?, ?, ?, ?)
               ON CONFLICT(page_id) DO UPDATE SET
                   raw_text = excluded.raw_text,
                   norm_text = excluded.norm_text,
                   text_sig = excluded.text_sig,
                   updated_epoch = excluded.updated_epoch"#,
        )
        .bind(page_id)
        .bind(raw_text)
        .bind(norm_text)
        .bind(text_sig)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        if enable_bm25 {
            sqlx::query("DELETE FROM fts_pages WHERE page_id = ?")
                .bind(page_id)
                .execute(&mut *tx)
                .await?;
            sqlx::query("INSERT INTO fts_pages (norm_text, page_id) VALUES (?, ?)")
                .bind(norm_text)
                .bind(page_id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    pub async fn get_page_text(&self, page_id: i64) -> Result<Option<PageTextRow>> {
        let row = sqlx::query_as::<_, PageTextRow>("SELECT * FROM page_text WHERE page_id = ?")
            .bind(page_id)
            .fetch_optional(self.reader())
            .await?;
        Ok(row)
    }

    /// First 140 characters of `norm_text`, for library listing excerpts.
    pub async fn get_page_text_excerpt(&self, page_id: i64) -> Result<Option<String>> {
        let excerpt = self
            .get_page_text(page_id)
            .await?
            .map(|row| row.norm_text.chars().take(140).collect());
        Ok(excerpt)
    }
}
