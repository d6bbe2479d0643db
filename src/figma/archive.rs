//! Local archive backend: a filesystem mirror of design documents and
//! their rendered exports.
//!
//! - documents: `{file_dir}/{sample_id}.json` (the files-endpoint payload)
//! - exports: `{image_dir}/{sample_id}/{node_id}.png`, with `:` in node ids
//!   also tried as `-`

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;

use super::api_types::FigmaFile;
use super::{DesignSource, ExportSet};
use crate::{DcovError, Result};

#[derive(Debug, Clone)]
pub struct LocalArchiveSource {
    file_dir: PathBuf,
    image_dir: PathBuf,
}

impl LocalArchiveSource {
    pub fn new(file_dir: impl Into<PathBuf>, image_dir: impl Into<PathBuf>) -> Self {
        Self {
            file_dir: file_dir.into(),
            image_dir: image_dir.into(),
        }
    }

    fn document_path(&self, sample_id: &str) -> PathBuf {
        self.file_dir.join(format!("{sample_id}.json"))
    }

    fn export_candidates(dir: &Path, node_id: &str) -> [PathBuf; 2] {
        [
            dir.join(format!("{node_id}.png")),
            dir.join(format!("{}.png", node_id.replace(':', "-"))),
        ]
    }
}

#[async_trait]
impl DesignSource for LocalArchiveSource {
    async fn fetch_file(&self, sample_id: &str) -> Result<Arc<FigmaFile>> {
        let path = self.document_path(sample_id);
        let raw = match tokio::fs::read_to_string(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(DcovError::SourceNotFound {
                    sample_id: sample_id.to_string(),
                })
            }
            Err(e) => {
                return Err(DcovError::source_api(
                    None,
                    format!("failed to read {}: {e}", path.display()),
                ))
            }
        };
        let file: FigmaFile = serde_json::from_str(&raw)?;
        Ok(Arc::new(file))
    }

    async fn fetch_exports(&self, sample_id: &str, frame_ids: &[String]) -> Result<ExportSet> {
        let dir = self.image_dir.join(sample_id);
        let is_dir = tokio::fs::metadata(&dir)
            .await
            .map(|meta| meta.is_dir())
            .unwrap_or(false);
        if !is_dir {
            return Err(DcovError::ExportsUnavailable {
                sample_id: sample_id.to_string(),
                message: format!("no export directory at {}", dir.display()),
            });
        }

        let mut set = ExportSet::new();
        for id in frame_ids {
            for candidate in Self::export_candidates(&dir, id) {
                if tokio::fs::metadata(&candidate).await.is_ok() {
                    let absolute = std::path::absolute(&candidate).unwrap_or(candidate);
                    set.insert(id.clone(), absolute.to_string_lossy().into_owned());
                    break;
                }
            }
        }
        Ok(set)
    }
}
