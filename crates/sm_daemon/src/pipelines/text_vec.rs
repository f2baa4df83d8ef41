//! TEXT_VEC pipeline: per queued `text_vec` artifact, short-circuit via a
//! fingerprint cache hit or a zero-vector for empty text; otherwise batch
//! up to `batch_size` texts per provider call.

use std::env;

use sm_pipelines::rate_limit::DualTokenBucket;
use sm_pipelines::text_embed::{cache_key, embed_text_batch, pack_f32, zero_vector};
use sm_protocol::errors::EMBED_FAIL;
use sm_protocol::{ArtifactKind, ArtifactStatus, TaskKind, TaskStatus};
use tracing::warn;

use crate::context::JobContext;
use crate::error::Result;

const DEFAULT_ENDPOINT: &str = "https://api.openai.com/v1/embeddings";
/// Hardcoded dimension for the empty-text zero-vector, matching the
/// original daemon's constant for its default text model.
const EMPTY_TEXT_VECTOR_DIM: usize = 3072;
const ERROR_MESSAGE_CAP: usize = 500;

struct PendingEmbed {
    page_id: i64,
    text: String,
    cache_key: String,
}

pub async fn run(ctx: &JobContext) -> Result<()> {
    if !ctx.options.embed.enabled_text {
        return Ok(());
    }
    let Some(task) = ctx
        .catalog
        .get_task_by_kind(ctx.job_id, TaskKind::TextVec)
        .await?
    else {
        return Ok(());
    };
    ctx.catalog.mark_task_running(task.id, ctx.now()).await?;

    let pages = ctx
        .catalog
        .list_queued_pages_for_kind(ArtifactKind::TextVec)
        .await?;
    let total = pages.len().max(1);

    let model = ctx.options.embed.model_text.clone();
    let limiter = DualTokenBucket::new(ctx.options.embed.req_per_min, ctx.options.embed.tok_per_min);
    let client = reqwest::Client::new();
    let endpoint = env::var("OPENAI_BASE_URL")
        .map(|base| format!("{}/embeddings", base.trim_end_matches('/')))
        .unwrap_or_else(|_| DEFAULT_ENDPOINT.to_string());
    let api_key = env::var("OPENAI_API_KEY").ok();

    let mut processed = 0usize;
    let mut pending: Vec<PendingEmbed> = Vec::new();

    for page in &pages {
        ctx.checkpoint().await?;
        ctx.catalog
            .set_artifact_status(page.page_id, ArtifactKind::TextVec, ArtifactStatus::Running, None, None, ctx.now())
            .await?;

        let page_text = ctx.catalog.get_page_text(page.page_id).await?;
        let (text, text_sig) = page_text
            .map(|t| (t.norm_text, t.text_sig))
            .unwrap_or_default();

        if text.is_empty() {
            let (key, _shared) = cache_key(page.page_id, &text, &text_sig, ctx.now());
            let vector = zero_vector(EMPTY_TEXT_VECTOR_DIM);
            ctx.catalog
                .insert_text_vec_cache(&model, &key, EMPTY_TEXT_VECTOR_DIM as i64, &vector, ctx.now())
                .await?;
            ctx.catalog
                .link_page_text_embedding(page.page_id, &model, &key, ctx.now())
                .await?;
            mark_ready(ctx, page.page_id).await?;
            processed += 1;
            heartbeat(ctx, task.id, processed, total).await?;
            continue;
        }

        let (key, shared) = cache_key(page.page_id, &text, &text_sig, ctx.now());
        if shared {
            if let Some(cached) = ctx.catalog.get_cached_text_vec(&model, &key).await? {
                let _ = cached;
                ctx.catalog
                    .link_page_text_embedding(page.page_id, &model, &key, ctx.now())
                    .await?;
                mark_ready(ctx, page.page_id).await?;
                processed += 1;
                heartbeat(ctx, task.id, processed, total).await?;
                continue;
            }
        }

        pending.push(PendingEmbed {
            page_id: page.page_id,
            text,
            cache_key: key,
        });

        if pending.len() >= ctx.options.embed.batch_size as usize {
            processed += flush_batch(
                ctx, &client, &endpoint, api_key.as_deref(), &model, &limiter, &mut pending,
                task.id, processed, total,
            )
            .await?;
        }
    }

    if !pending.is_empty() {
        processed += flush_batch(
            ctx, &client, &endpoint, api_key.as_deref(), &model, &limiter, &mut pending,
            task.id, processed, total,
        )
        .await?;
    }

    ctx.catalog
        .finish_task(task.id, TaskStatus::Succeeded, None, None, ctx.now())
        .await?;
    Ok(())
}

async fn mark_ready(ctx: &JobContext, page_id: i64) -> Result<()> {
    ctx.catalog
        .set_artifact_status(page_id, ArtifactKind::TextVec, ArtifactStatus::Ready, None, None, ctx.now())
        .await?;
    ctx.publish(
        "artifact_state_changed",
        serde_json::json!({"page_id": page_id, "kind": "text_vec", "status": "ready"}),
    )
    .await;
    Ok(())
}

async fn heartbeat(ctx: &JobContext, task_id: i64, processed: usize, total: usize) -> Result<()> {
    ctx.catalog
        .heartbeat_task(task_id, processed as f64 / total as f64, Some("text_vec"), ctx.now())
        .await?;
    Ok(())
}

#[allow(clippy::too_many_arguments)]
async fn flush_batch(
    ctx: &JobContext,
    client: &reqwest::Client,
    endpoint: &str,
    api_key: Option<&str>,
    model: &str,
    limiter: &DualTokenBucket,
    batch: &mut Vec<PendingEmbed>,
    task_id: i64,
    processed_before: usize,
    total: usize,
) -> Result<usize> {
    let texts: Vec<String> = batch.iter().map(|t| t.text.clone()).collect();
    let max_retries = ctx.options.embed.max_retries;

    match embed_text_batch(client, endpoint, api_key, &texts, model, limiter, max_retries).await {
        Ok(vectors) => {
            for (target, vector) in batch.iter().zip(vectors.into_iter()) {
                let packed = pack_f32(&vector);
                ctx.catalog
                    .insert_text_vec_cache(model, &target.cache_key, vector.len() as i64, &packed, ctx.now())
                    .await?;
                ctx.catalog
                    .link_page_text_embedding(target.page_id, model, &target.cache_key, ctx.now())
                    .await?;
                mark_ready(ctx, target.page_id).await?;
            }
        }
        Err(e) => {
            let message: String = e.to_string().chars().take(ERROR_MESSAGE_CAP).collect();
            warn!(error = %message, batch_len = batch.len(), "text embedding batch failed");
            for target in batch.iter() {
                ctx.catalog
                    .set_artifact_status(
                        target.page_id,
                        ArtifactKind::TextVec,
                        ArtifactStatus::Error,
                        Some(EMBED_FAIL),
                        Some(&message),
                        ctx.now(),
                    )
                    .await?;
                ctx.publish(
                    "artifact_state_changed",
                    serde_json::json!({"page_id": target.page_id, "kind": "text_vec", "status": "error", "error_code": EMBED_FAIL}),
                )
                .await;
            }
        }
    }

    let done = batch.len();
    batch.clear();
    heartbeat(ctx, task_id, processed_before + done, total).await?;
    Ok(done)
}
