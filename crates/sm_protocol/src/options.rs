//! `POST /jobs/index` request body: per-kind enable flags, per-pipeline
//! tuning, and the file whitelist the planner is bound to.

use serde::{Deserialize, Serialize};

fn default_true() -> bool {
    true
}

/// One caller-supplied `(path, size_bytes, mtime_epoch)` triple used in
/// place of a fresh filesystem stat.
///
/// Supplements the whitelist-only `file_paths` model: when a caller already
/// knows the stat results (e.g. a desktop client watching the filesystem),
/// it can hand them to the planner directly instead of the planner
/// re-`stat`-ing every candidate. Still filtered by whitelist/root
/// containment identically to `file_paths`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileScan {
    pub path: String,
    pub size_bytes: u64,
    pub mtime_epoch: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PdfPrefer {
    Libreoffice,
    Powerpoint,
    Auto,
}

impl Default for PdfPrefer {
    fn default() -> Self {
        PdfPrefer::Auto
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThumbConfig {
    pub enabled: bool,
    pub width: u32,
    pub height_4_3: u32,
    pub height_16_9: u32,
    pub render_dpi: u32,
}

impl Default for ThumbConfig {
    fn default() -> Self {
        ThumbConfig {
            enabled: true,
            width: 320,
            height_4_3: 240,
            height_16_9: 180,
            render_dpi: 144,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PdfConfig {
    pub enabled: bool,
    pub timeout_sec: u64,
    pub max_concurrency: u32,
    pub prefer: PdfPrefer,
}

impl Default for PdfConfig {
    fn default() -> Self {
        PdfConfig {
            enabled: true,
            timeout_sec: 180,
            max_concurrency: 1,
            prefer: PdfPrefer::Auto,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbedConfig {
    pub enabled_text: bool,
    pub enabled_image: bool,
    pub model_text: String,
    pub model_image: String,
    /// Read but unreferenced by any pipeline; carried for wire compatibility.
    pub max_concurrency: u32,
    pub batch_size: u32,
    pub req_per_min: u32,
    pub tok_per_min: u32,
    pub max_retries: u32,
}

impl Default for EmbedConfig {
    fn default() -> Self {
        EmbedConfig {
            enabled_text: true,
            enabled_image: true,
            model_text: "text-embedding-3-large".to_string(),
            model_image: "image-embedding-1".to_string(),
            max_concurrency: 2,
            batch_size: 64,
            req_per_min: 120,
            tok_per_min: 200_000,
            max_retries: 8,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JobOptions {
    #[serde(default = "default_true")]
    pub enable_text: bool,
    #[serde(default = "default_true")]
    pub enable_thumb: bool,
    #[serde(default = "default_true")]
    pub enable_text_vec: bool,
    #[serde(default = "default_true")]
    pub enable_img_vec: bool,
    #[serde(default = "default_true")]
    pub enable_bm25: bool,

    /// Whitelist of file paths to consider; empty is rejected by the
    /// planner, not treated as "all files".
    pub file_paths: Vec<String>,

    /// Pre-stat'd scan entries, preferred over `file_paths` when
    /// non-empty. See [`FileScan`].
    pub file_scans: Vec<FileScan>,

    pub thumb: ThumbConfig,
    pub pdf: PdfConfig,
    pub embed: EmbedConfig,

    pub commit_every_pages: u32,
    pub commit_every_sec: f64,

    /// Unreferenced by any pipeline. Kept on the wire for compatibility
    /// with callers that still send them.
    pub enable_sentence_df: bool,
    pub sentence_df_threshold: f64,
    pub sentence_min_len: u32,
}

impl Default for JobOptions {
    fn default() -> Self {
        JobOptions {
            enable_text: true,
            enable_thumb: true,
            enable_text_vec: true,
            enable_img_vec: true,
            enable_bm25: true,
            file_paths: Vec::new(),
            file_scans: Vec::new(),
            thumb: ThumbConfig::default(),
            pdf: PdfConfig::default(),
            embed: EmbedConfig::default(),
            commit_every_pages: 50,
            commit_every_sec: 1.0,
            enable_sentence_df: false,
            sentence_df_threshold: 0.0,
            sentence_min_len: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let opts = JobOptions::default();
        assert_eq!(opts.thumb.width, 320);
        assert_eq!(opts.pdf.timeout_sec, 180);
        assert_eq!(opts.embed.req_per_min, 120);
        assert_eq!(opts.embed.tok_per_min, 200_000);
        assert_eq!(opts.commit_every_pages, 50);
    }

    #[test]
    fn partial_json_body_fills_in_defaults() {
        let opts: JobOptions =
            serde_json::from_str(r#"{"file_paths": ["a.pptx"]}"#).unwrap();
        assert_eq!(opts.file_paths, vec!["a.pptx".to_string()]);
        assert!(opts.file_scans.is_empty());
        assert_eq!(opts.thumb, ThumbConfig::default());
    }
}
