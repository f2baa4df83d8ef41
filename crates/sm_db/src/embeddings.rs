use crate::catalog::Catalog;
use crate::error::Result;

pub struct CachedVector {
    pub dim: i64,
    pub vector: Vec<u8>,
}

impl Catalog {
    pub async fn get_cached_text_vec(
        &self,
        model: &str,
        text_sig: &str,
    ) -> Result<Option<CachedVector>> {
        let row = sqlx::query_as::<_, (i64, Vec<u8>)>(
            "SELECT dim, vector FROM embedding_cache_text WHERE model = ? AND text_sig = ?",
        )
        .bind(model)
        .bind(text_sig)
        .fetch_optional(self.reader())
        .await?;
        Ok(row.map(|(dim, vector)| CachedVector { dim, vector }))
    }

    /// Inserts a cache entry, or no-ops if one already exists for this
    /// `(model, text_sig)` — the cache is append-only and content-addressed,
    /// so a racing writer computing the same vector is harmless.
    pub async fn insert_text_vec_cache(
        &self,
        model: &str,
        text_sig: &str,
        dim: i64,
        vector: &[u8],
        now: f64,
    ) -> Result<()> {
        sqlx::query(
            r#"INSERT INTO embedding_cache_text (model, text_sig, dim, vector, created_epoch)
               VALUES (?, ?, ?, ?, ?)
               ON CONFLICT(model, text_sig) DO NOTHING"#,
        )
        .bind(model)
        .bind(text_sig)
        .bind(dim)
        .bind(vector)
        .bind(now)
        .execute(self.writer())
        .await?;
        Ok(())
    }

    pub async fn link_page_text_embedding(
        &self,
        page_id: i64,
        model: &str,
        text_sig: &str,
        now: f64,
    ) -> Result<()> {
        sqlx::query(
            r#"INSERT INTO page_text_embedding (page_id, model, text_sig, updated_epoch)
               VALUES (?, ?, ?, ?)
               ON CONFLICT(page_id, model) DO UPDATE SET
                   text_sig = excluded.text_sig,
                   updated_epoch = excluded.updated_epoch"#,
        )
        .bind(page_id)
        .bind(model)
        .bind(text_sig)
        .bind(now)
        .execute(self.writer())
        .await?;
        Ok(())
    }

    pub async fn upsert_page_image_embedding(
        &self,
        page_id: i64,
        model: &str,
        dim: i64,
        vector: &[u8],
        now: f64,
    ) -> Result<()> {
        sqlx::query(
            r#"INSERT INTO page_image_embedding (page_id, model, dim, vector, updated_epoch)
               VALUES (?, ?, ?, ?, ?)
               ON CONFLICT(page_id) DO UPDATE SET
                   model = excluded.model,
                   dim = excluded.dim,
                   vector = excluded.vector,
                   updated_epoch = excluded.updated_epoch"#,
        )
        .bind(page_id)
        .bind(model)
        .bind(dim)
        .bind(vector)
        .bind(now)
        .execute(self.writer())
        .await?;
        Ok(())
    }
}
