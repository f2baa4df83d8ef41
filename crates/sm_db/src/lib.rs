//! SQLite-backed catalog store: schema, connection pools, and every read
//! and write path the planner, pipelines, and HTTP API share.

mod artifacts;
mod catalog;
mod embeddings;
mod error;
mod files;
mod jobs;
mod library;
pub mod models;
mod pages;
mod pool;
mod schema;
mod tasks;
mod text;
mod thumbnails;

pub use artifacts::QueuedPage;
pub use catalog::Catalog;
pub use embeddings::CachedVector;
pub use error::{DbError, Result};
pub use library::{ArtifactCounts, FileSummary, LibrarySummary, PageDetail, PageSummary};
pub use pages::PageSeed;
pub use tasks::RunningTask;

#[cfg(test)]
mod tests {
    use super::*;
    use sm_protocol::{ArtifactKind, ArtifactStatus, Aspect, JobStatus, TaskKind, TaskStatus};

    #[tokio::test]
    async fn file_and_page_round_trip() {
        let cat = Catalog::open_memory().await.unwrap();

        let file_id = cat
            .upsert_file("/lib/deck.pptx", 1000, 111.0, 200.0)
            .await
            .unwrap();
        let seed = cat
            .seed_page(file_id, 1, Aspect::Ratio16x9, 1000, 111.0)
            .await
            .unwrap();
        assert!(seed.changed);

        let again = cat
            .seed_page(file_id, 1, Aspect::Ratio16x9, 1000, 111.0)
            .await
            .unwrap();
        assert!(!again.changed);
        assert_eq!(again.page_id, seed.page_id);

        let pages = cat.get_pages_for_file(file_id).await.unwrap();
        assert_eq!(pages.len(), 1);
    }

    #[tokio::test]
    async fn artifact_lifecycle() {
        let cat = Catalog::open_memory().await.unwrap();
        let file_id = cat.upsert_file("/lib/a.pptx", 10, 1.0, 1.0).await.unwrap();
        let seed = cat
            .seed_page(file_id, 1, Aspect::Unknown, 10, 1.0)
            .await
            .unwrap();

        cat.ensure_artifact(seed.page_id, ArtifactKind::Text, 1.0)
            .await
            .unwrap();
        let art = cat
            .get_artifact(seed.page_id, ArtifactKind::Text)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(*art.status, ArtifactStatus::Missing);

        cat.queue_artifact(seed.page_id, ArtifactKind::Text, "{}", 2.0)
            .await
            .unwrap();
        cat.set_artifact_status(
            seed.page_id,
            ArtifactKind::Text,
            ArtifactStatus::Ready,
            None,
            None,
            3.0,
        )
        .await
        .unwrap();

        let art = cat
            .get_artifact(seed.page_id, ArtifactKind::Text)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(*art.status, ArtifactStatus::Ready);
    }

    #[tokio::test]
    async fn job_stats_groups_by_kind_and_status() {
        let cat = Catalog::open_memory().await.unwrap();
        let job_id = cat.create_job("/lib", "{}", 1.0).await.unwrap();
        cat.set_job_status(job_id, JobStatus::Running).await.unwrap();

        let t1 = cat
            .create_task(job_id, TaskKind::Text, None, None, 0)
            .await
            .unwrap();
        cat.finish_task(t1, TaskStatus::Succeeded, None, None, 2.0)
            .await
            .unwrap();

        cat.create_task(job_id, TaskKind::Text, None, None, 0)
            .await
            .unwrap();

        let stats = cat.job_stats(job_id).await.unwrap();
        let text_stats = &stats[&TaskKind::Text];
        assert_eq!(text_stats[&TaskStatus::Succeeded], 1);
        assert_eq!(text_stats[&TaskStatus::Queued], 1);
    }
}
