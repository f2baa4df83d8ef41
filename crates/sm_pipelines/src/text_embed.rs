//! Text embedding: token-cost estimation, rate-limited batched provider
//! calls with exponential-jitter retry, and the zero/no-signature sentinel
//! cache keys that keep synthetic vectors out of the shared cache.

use byteorder::{LittleEndian, WriteBytesExt};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{PipelineError, Result};
use crate::rate_limit::{backoff_delay, DualTokenBucket};

const BACKOFF_BASE_SEC: f64 = 0.5;
const BACKOFF_CAP_SEC: f64 = 20.0;

pub fn estimate_tokens(text: &str) -> u32 {
    let chars = text.chars().count() as f64;
    (chars / 4.0 * 1.2).round().max(1.0) as u32
}

pub fn pack_f32(vec: &[f32]) -> Vec<u8> {
    let mut out = Vec::with_capacity(vec.len() * 4);
    for v in vec {
        out.write_f32::<LittleEndian>(*v).expect("writes to a Vec never fail");
    }
    out
}

pub fn zero_vector(dim: usize) -> Vec<u8> {
    pack_f32(&vec![0.0; dim])
}

/// The cache key a page's embedding is stored under, per spec's sentinel
/// rules: real signature for non-empty, hashable text; a per-page sentinel
/// for empty text (`__zero__:`) or non-empty text whose fingerprint came
/// back empty (`__nosig__:`) so a synthetic vector never collides with a
/// real one in the shared cache.
pub fn cache_key(page_id: i64, text: &str, text_sig: &str, now: f64) -> (String, bool) {
    if text.is_empty() {
        (format!("__zero__:{page_id}:{now}"), false)
    } else if text_sig.is_empty() {
        (format!("__nosig__:{page_id}:{now}"), false)
    } else {
        (text_sig.to_string(), true)
    }
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingDatum>,
}

#[derive(Deserialize)]
struct EmbeddingDatum {
    embedding: Vec<f32>,
}

/// Batches `texts` to the embedding provider named by `endpoint`/`model`,
/// acquiring the rate limiter once for the whole batch before the call.
/// Retries on any transport or non-2xx response with exponential-jitter
/// backoff up to `max_retries`. Returns one vector per input, in order.
pub async fn embed_text_batch(
    client: &reqwest::Client,
    endpoint: &str,
    api_key: Option<&str>,
    texts: &[String],
    model: &str,
    limiter: &DualTokenBucket,
    max_retries: u32,
) -> Result<Vec<Vec<f32>>> {
    let tok_cost: u32 = texts.iter().map(|t| estimate_tokens(t)).sum();
    limiter.acquire(1.0, tok_cost as f64).await;

    let mut attempt = 0;
    loop {
        match try_embed_once(client, endpoint, api_key, texts, model).await {
            Ok(vectors) => return Ok(vectors),
            Err(e) if attempt < max_retries => {
                warn!(attempt, error = %e, "embedding provider call failed, retrying");
                tokio::time::sleep(backoff_delay(attempt, BACKOFF_BASE_SEC, BACKOFF_CAP_SEC)).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

async fn try_embed_once(
    client: &reqwest::Client,
    endpoint: &str,
    api_key: Option<&str>,
    texts: &[String],
    model: &str,
) -> Result<Vec<Vec<f32>>> {
    let mut req = client.post(endpoint).json(&EmbeddingRequest { model, input: texts });
    if let Some(key) = api_key {
        req = req.bearer_auth(key);
    }

    let resp = req
        .send()
        .await
        .map_err(|e| PipelineError::Provider(e.to_string()))?;

    if !resp.status().is_success() {
        return Err(PipelineError::Provider(format!(
            "provider returned {}",
            resp.status()
        )));
    }

    let parsed: EmbeddingResponse = resp
        .json()
        .await
        .map_err(|e| PipelineError::Provider(e.to_string()))?;

    Ok(parsed.data.into_iter().map(|d| d.embedding).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_estimate_matches_formula() {
        assert_eq!(estimate_tokens(""), 1);
        assert_eq!(estimate_tokens("abcd"), 2);
        assert_eq!(estimate_tokens(&"a".repeat(100)), 30);
    }

    #[test]
    fn zero_vector_is_all_zero_bytes() {
        let blob = zero_vector(4);
        assert_eq!(blob.len(), 16);
        assert!(blob.iter().all(|&b| b == 0));
    }

    #[test]
    fn cache_key_uses_sentinel_for_empty_text() {
        let (key, shared) = cache_key(7, "", "", 123.0);
        assert_eq!(key, "__zero__:7:123");
        assert!(!shared);
    }

    #[test]
    fn cache_key_uses_sentinel_for_empty_signature() {
        let (key, shared) = cache_key(7, "non-empty text", "", 123.0);
        assert_eq!(key, "__nosig__:7:123");
        assert!(!shared);
    }

    #[test]
    fn cache_key_uses_real_signature_when_present() {
        let (key, shared) = cache_key(7, "text", "deadbeefcafebabe", 123.0);
        assert_eq!(key, "deadbeefcafebabe");
        assert!(shared);
    }
}
