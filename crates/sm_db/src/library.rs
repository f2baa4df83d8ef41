use std::collections::HashMap;

use sm_protocol::{ArtifactKind, ArtifactStatus};

use crate::catalog::Catalog;
use crate::error::Result;
use crate::models::{FileRow, PageRow};

pub type ArtifactCounts = HashMap<ArtifactKind, HashMap<ArtifactStatus, i64>>;

pub struct LibrarySummary {
    pub files: i64,
    pub pages: i64,
    pub artifacts: ArtifactCounts,
}

pub struct FileSummary {
    pub file: FileRow,
    pub artifacts: ArtifactCounts,
}

pub struct PageSummary {
    pub page: PageRow,
    pub artifacts: HashMap<ArtifactKind, ArtifactStatus>,
    pub text_excerpt: Option<String>,
    pub thumbnail_path: Option<String>,
}

/// Full detail for `GET /library/pages/{page_id}`: raw and normalized text
/// in full (not the 140-char excerpt `PageSummary` carries) plus every
/// artifact's status.
pub struct PageDetail {
    pub page: PageRow,
    pub artifacts: HashMap<ArtifactKind, ArtifactStatus>,
    pub raw_text: Option<String>,
    pub norm_text: Option<String>,
    pub thumbnail_path: Option<String>,
}

impl Catalog {
    /// Aggregate counts for the `/library/summary` endpoint, filtered to
    /// files whose path starts with `root_prefix` when given.
    pub async fn library_summary(&self, root_prefix: Option<&str>) -> Result<LibrarySummary> {
        let files = self.list_files_under(root_prefix).await?;
        let file_ids: Vec<i64> = files.iter().map(|f| f.id).collect();

        let mut pages = 0i64;
        let mut artifacts: ArtifactCounts = HashMap::new();
        for file_id in &file_ids {
            let file_pages = self.get_pages_for_file(*file_id).await?;
            pages += file_pages.len() as i64;
            for page in &file_pages {
                for art in self.get_artifacts_for_page(page.id).await? {
                    *artifacts.entry(*art.kind).or_default().entry(*art.status).or_default() += 1;
                }
            }
        }

        Ok(LibrarySummary {
            files: file_ids.len() as i64,
            pages,
            artifacts,
        })
    }

    /// Per-file rows with aggregated artifact-status counts, for
    /// `/library/files`.
    pub async fn list_files_with_counts(&self, root_prefix: Option<&str>) -> Result<Vec<FileSummary>> {
        let files = self.list_files_under(root_prefix).await?;
        let mut out = Vec::with_capacity(files.len());

        for file in files {
            let mut artifacts: ArtifactCounts = HashMap::new();
            for page in self.get_pages_for_file(file.id).await? {
                for art in self.get_artifacts_for_page(page.id).await? {
                    *artifacts.entry(*art.kind).or_default().entry(*art.status).or_default() += 1;
                }
            }
            out.push(FileSummary { file, artifacts });
        }

        Ok(out)
    }

    /// Per-page rows for a file with per-kind artifact status, a text
    /// excerpt, and the latest thumbnail path, for
    /// `/library/files/{file_id}/pages`.
    pub async fn list_pages_with_detail(&self, file_id: i64) -> Result<Vec<PageSummary>> {
        let pages = self.get_pages_for_file(file_id).await?;
        let mut out = Vec::with_capacity(pages.len());

        for page in pages {
            let mut artifacts = HashMap::new();
            for art in self.get_artifacts_for_page(page.id).await? {
                artifacts.insert(*art.kind, *art.status);
            }
            let text_excerpt = self.get_page_text_excerpt(page.id).await?;
            let thumbnail_path = self
                .get_thumbnail(page.id)
                .await?
                .map(|t| t.image_path);

            out.push(PageSummary {
                page,
                artifacts,
                text_excerpt,
                thumbnail_path,
            });
        }

        Ok(out)
    }

    /// Full single-page detail for `GET /library/pages/{page_id}`, or
    /// `None` if the page doesn't exist.
    pub async fn page_detail(&self, page_id: i64) -> Result<Option<PageDetail>> {
        let Some(page) = self.get_page(page_id).await? else {
            return Ok(None);
        };

        let mut artifacts = HashMap::new();
        for art in self.get_artifacts_for_page(page.id).await? {
            artifacts.insert(*art.kind, *art.status);
        }
        let text = self.get_page_text(page.id).await?;
        let thumbnail_path = self.get_thumbnail(page.id).await?.map(|t| t.image_path);

        Ok(Some(PageDetail {
            page,
            artifacts,
            raw_text: text.as_ref().map(|t| t.raw_text.clone()),
            norm_text: text.as_ref().map(|t| t.norm_text.clone()),
            thumbnail_path,
        }))
    }

    async fn list_files_under(&self, root_prefix: Option<&str>) -> Result<Vec<FileRow>> {
        let all = self.list_files().await?;
        Ok(match root_prefix {
            Some(prefix) if !prefix.is_empty() => {
                all.into_iter().filter(|f| f.path.starts_with(prefix)).collect()
            }
            _ => all,
        })
    }
}
