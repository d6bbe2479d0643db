//! Filesystem-backed artifact store.
//!
//! Layout: `root/{sample_id}/{frame_id}/{index.html, a.png, b.png, diff.png, report.json}`.
//! `report.json` is written last and is the only marker of a completed frame.

use std::io;
use std::path::{Path, PathBuf};

use crate::{DcovError, Result};

pub const INDEX_HTML: &str = "index.html";
pub const IMAGE_A: &str = "a.png";
pub const IMAGE_B: &str = "b.png";
pub const DIFF_IMAGE: &str = "diff.png";
pub const REPORT_JSON: &str = "report.json";

/// Paths of every artifact belonging to one frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameArtifacts {
    pub dir: PathBuf,
    pub index_html: PathBuf,
    pub image_a: PathBuf,
    pub image_b: PathBuf,
    pub diff_image: PathBuf,
    pub report: PathBuf,
}

impl FrameArtifacts {
    fn new(dir: PathBuf) -> Self {
        Self {
            index_html: dir.join(INDEX_HTML),
            image_a: dir.join(IMAGE_A),
            image_b: dir.join(IMAGE_B),
            diff_image: dir.join(DIFF_IMAGE),
            report: dir.join(REPORT_JSON),
            dir,
        }
    }

    /// Reference used inside `report.json` (relative to the frame directory).
    pub fn relative(name: &str) -> String {
        format!("./{name}")
    }

    /// Files a previous, interrupted attempt may have left behind.
    pub fn all_files(&self) -> [&Path; 5] {
        [
            &self.report,
            &self.index_html,
            &self.image_a,
            &self.image_b,
            &self.diff_image,
        ]
    }
}

#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn sample_dir(&self, sample_id: &str) -> PathBuf {
        self.root.join(sample_id)
    }

    pub fn frame(&self, sample_id: &str, frame_id: &str) -> FrameArtifacts {
        FrameArtifacts::new(self.sample_dir(sample_id).join(frame_id))
    }

    /// Create `path` (and parents) if absent. Existing directories are fine.
    pub async fn ensure_dir(&self, path: &Path) -> Result<()> {
        tokio::fs::create_dir_all(path)
            .await
            .map_err(|e| DcovError::artifact_io(path, e))
    }

    /// Create or overwrite `path`, creating its parent directory first.
    pub async fn write(&self, path: &Path, bytes: impl AsRef<[u8]>) -> Result<()> {
        if let Some(parent) = path.parent() {
            self.ensure_dir(parent).await?;
        }
        tokio::fs::write(path, bytes)
            .await
            .map_err(|e| DcovError::artifact_io(path, e))
    }

    /// Follows symlinks: a dangling link does not exist.
    pub async fn exists(&self, path: &Path) -> bool {
        tokio::fs::metadata(path).await.is_ok()
    }

    /// Remove a file or link if present, including dangling symlinks.
    pub async fn remove_if_present(&self, path: &Path) -> Result<()> {
        match tokio::fs::symlink_metadata(path).await {
            Ok(_) => tokio::fs::remove_file(path)
                .await
                .map_err(|e| DcovError::artifact_io(path, e)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(DcovError::artifact_io(path, e)),
        }
    }

    /// Clear leftovers of an earlier attempt so a failed retry cannot mix
    /// old and new images.
    pub async fn clear_frame(&self, frame: &FrameArtifacts) -> Result<()> {
        for path in frame.all_files() {
            self.remove_if_present(path).await?;
        }
        Ok(())
    }

    /// Point `link` at `target`, replacing whatever `link` was before.
    pub async fn symlink(&self, target: &Path, link: &Path) -> Result<()> {
        if let Some(parent) = link.parent() {
            self.ensure_dir(parent).await?;
        }
        self.remove_if_present(link).await?;
        create_symlink(target, link)
            .await
            .map_err(|e| DcovError::artifact_io(link, e))
    }
}

#[cfg(unix)]
async fn create_symlink(target: &Path, link: &Path) -> io::Result<()> {
    tokio::fs::symlink(target, link).await
}

#[cfg(not(unix))]
async fn create_symlink(target: &Path, link: &Path) -> io::Result<()> {
    tokio::fs::copy(target, link).await.map(|_| ())
}
