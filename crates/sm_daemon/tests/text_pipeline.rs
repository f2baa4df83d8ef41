//! Integration tests driving the TEXT and TEXT_VEC pipelines end to end
//! against a real on-disk catalog, without ever reaching the network.

use std::io::Write;

use sm_daemon::context::JobContext;
use sm_daemon::event_bus::EventBus;
use sm_daemon::pipelines::{text_bm25, text_vec};
use sm_daemon::tokens::{CancelToken, PauseToken};
use sm_db::Catalog;
use sm_protocol::errors::TEXT_EXTRACT_FAIL;
use sm_protocol::{Aspect, ArtifactKind, ArtifactStatus, JobOptions, TaskKind};

async fn open_catalog() -> (tempfile::TempDir, Catalog) {
    let dir = tempfile::tempdir().unwrap();
    let catalog = Catalog::open(&dir.path().join("index.sqlite")).await.unwrap();
    (dir, catalog)
}

fn new_context(catalog: Catalog, job_id: i64, options: JobOptions) -> JobContext {
    JobContext {
        catalog,
        bus: EventBus::new(),
        job_id,
        library_root: std::env::temp_dir(),
        options,
        cancel: CancelToken::new(),
        pause: PauseToken::new(),
    }
}

/// Writes a `.pptx`-shaped zip with one `ppt/slides/slide{n}.xml` entry per
/// element of `slide_texts`; `None` leaves that slide's entry out entirely,
/// the same shape a slide XML part missing from a corrupted package takes.
fn write_pptx(path: &std::path::Path, slide_texts: &[Option<&str>]) {
    let file = std::fs::File::create(path).unwrap();
    let mut zip = zip::ZipWriter::new(file);
    let options = zip::write::SimpleFileOptions::default();

    for (i, text) in slide_texts.iter().enumerate() {
        let Some(text) = text else { continue };
        let name = format!("ppt/slides/slide{}.xml", i + 1);
        zip.start_file(&name, options).unwrap();
        let xml = format!(
            r#"<p:sld xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main"><a:t>{text}</a:t></p:sld>"#
        );
        zip.write_all(xml.as_bytes()).unwrap();
    }
    zip.finish().unwrap();
}

/// Seeds one file with `n` pages, queues their `text` artifacts, and
/// creates the job's `text` task. Returns the page ids in ordinal order.
async fn seed_file_with_pages(catalog: &Catalog, job_id: i64, pptx_path: &std::path::Path, n: usize) -> Vec<i64> {
    let now = 1.0;
    let file_id = catalog
        .upsert_file(pptx_path.to_str().unwrap(), 100, now, now)
        .await
        .unwrap();

    let mut page_ids = Vec::new();
    for ordinal in 1..=n {
        let seed = catalog
            .seed_page(file_id, ordinal as i64, Aspect::Ratio16x9, 10, now)
            .await
            .unwrap();
        catalog.ensure_artifact(seed.page_id, ArtifactKind::Text, now).await.unwrap();
        catalog
            .queue_artifact(seed.page_id, ArtifactKind::Text, "{}", now)
            .await
            .unwrap();
        page_ids.push(seed.page_id);
    }

    catalog
        .create_task(job_id, TaskKind::Text, None, Some(file_id), 0)
        .await
        .unwrap();

    page_ids
}

#[tokio::test]
async fn corrupt_slide_is_isolated_from_its_siblings() {
    let (dir, catalog) = open_catalog().await;
    let pptx_path = dir.path().join("deck.pptx");
    write_pptx(&pptx_path, &[Some("first"), None, Some("third")]);

    let job_id = catalog.create_job("/tmp/lib", "{}", 1.0).await.unwrap();
    let page_ids = seed_file_with_pages(&catalog, job_id, &pptx_path, 3).await;

    let ctx = new_context(catalog.clone(), job_id, JobOptions::default());
    text_bm25::run(&ctx).await.unwrap();

    let first = catalog.get_artifact(page_ids[0], ArtifactKind::Text).await.unwrap().unwrap();
    let second = catalog.get_artifact(page_ids[1], ArtifactKind::Text).await.unwrap().unwrap();
    let third = catalog.get_artifact(page_ids[2], ArtifactKind::Text).await.unwrap().unwrap();

    assert_eq!(*first.status, ArtifactStatus::Ready);
    assert_eq!(*second.status, ArtifactStatus::Error);
    assert_eq!(second.error_code.as_deref(), Some(TEXT_EXTRACT_FAIL));
    assert_eq!(*third.status, ArtifactStatus::Ready);
}

#[tokio::test]
async fn empty_text_short_circuits_to_a_zero_vector_without_calling_the_provider() {
    let (dir, catalog) = open_catalog().await;
    let pptx_path = dir.path().join("deck.pptx");
    write_pptx(&pptx_path, &[Some("   ")]); // normalizes to empty text

    let job_id = catalog.create_job("/tmp/lib", "{}", 1.0).await.unwrap();
    let file_id = catalog.upsert_file(pptx_path.to_str().unwrap(), 10, 1.0, 1.0).await.unwrap();
    let seed = catalog.seed_page(file_id, 1, Aspect::Ratio16x9, 10, 1.0).await.unwrap();
    catalog.ensure_artifact(seed.page_id, ArtifactKind::Text, 1.0).await.unwrap();
    catalog.queue_artifact(seed.page_id, ArtifactKind::Text, "{}", 1.0).await.unwrap();
    catalog.create_task(job_id, TaskKind::Text, None, Some(file_id), 0).await.unwrap();

    let ctx = new_context(catalog.clone(), job_id, JobOptions::default());
    text_bm25::run(&ctx).await.unwrap();
    assert_eq!(catalog.get_page_text(seed.page_id).await.unwrap().unwrap().norm_text, "");

    catalog.ensure_artifact(seed.page_id, ArtifactKind::TextVec, 1.0).await.unwrap();
    catalog.queue_artifact(seed.page_id, ArtifactKind::TextVec, "{}", 1.0).await.unwrap();
    catalog.create_task(job_id, TaskKind::TextVec, None, Some(file_id), 0).await.unwrap();

    text_vec::run(&ctx).await.unwrap();

    let artifact = catalog.get_artifact(seed.page_id, ArtifactKind::TextVec).await.unwrap().unwrap();
    assert_eq!(*artifact.status, ArtifactStatus::Ready);
}

#[tokio::test]
async fn shared_cache_hit_skips_the_embedding_provider() {
    let (dir, catalog) = open_catalog().await;
    let pptx_path = dir.path().join("deck.pptx");
    write_pptx(&pptx_path, &[Some("same slide text"), Some("same slide text")]);

    let job_id = catalog.create_job("/tmp/lib", "{}", 1.0).await.unwrap();
    let file_id = catalog.upsert_file(pptx_path.to_str().unwrap(), 10, 1.0, 1.0).await.unwrap();

    let options = JobOptions::default();
    let model = options.embed.model_text.clone();
    let ctx = new_context(catalog.clone(), job_id, options);

    let mut page_ids = Vec::new();
    for ordinal in 1..=2i64 {
        let seed = catalog.seed_page(file_id, ordinal, Aspect::Ratio16x9, 10, 1.0).await.unwrap();
        catalog.ensure_artifact(seed.page_id, ArtifactKind::Text, 1.0).await.unwrap();
        catalog.queue_artifact(seed.page_id, ArtifactKind::Text, "{}", 1.0).await.unwrap();
        page_ids.push(seed.page_id);
    }
    catalog.create_task(job_id, TaskKind::Text, None, Some(file_id), 0).await.unwrap();
    text_bm25::run(&ctx).await.unwrap();

    let text_sig = catalog.get_page_text(page_ids[0]).await.unwrap().unwrap().text_sig;
    assert!(!text_sig.is_empty());
    // Pre-populate the shared cache for this signature so the pipeline
    // never needs a live provider to satisfy either page.
    catalog
        .insert_text_vec_cache(&model, &text_sig, 3, &[0u8; 12], 1.0)
        .await
        .unwrap();

    for &page_id in &page_ids {
        catalog.ensure_artifact(page_id, ArtifactKind::TextVec, 1.0).await.unwrap();
        catalog.queue_artifact(page_id, ArtifactKind::TextVec, "{}", 1.0).await.unwrap();
    }
    catalog.create_task(job_id, TaskKind::TextVec, None, Some(file_id), 0).await.unwrap();

    text_vec::run(&ctx).await.unwrap();

    for &page_id in &page_ids {
        let artifact = catalog.get_artifact(page_id, ArtifactKind::TextVec).await.unwrap().unwrap();
        assert_eq!(*artifact.status, ArtifactStatus::Ready);
    }
}
