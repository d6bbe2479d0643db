//! Design source adapters.
//!
//! This module provides:
//! - [`DesignSource`] - the fetch boundary the pipeline depends on
//! - [`FigmaRestSource`] - HTTP client for the Figma REST API
//! - [`LocalArchiveSource`] - filesystem mirror of documents and exports
//! - [`CachedSource`] - response cache shared by a whole run

pub mod api_types;
pub mod archive;
pub mod cache;
pub mod client;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

pub use api_types::{FigmaColor, FigmaFile, FigmaNode, FigmaPaint, FigmaTypeStyle};
pub use archive::LocalArchiveSource;
pub use cache::CachedSource;
pub use client::{FigmaAuth, FigmaRestSource};

use crate::config::Config;
use crate::Result;

/// Frame id to reference image location (URL or local filesystem path).
pub type ExportSet = HashMap<String, String>;

#[async_trait]
pub trait DesignSource: Send + Sync {
    /// Fetch the whole document for a sample. Fails with
    /// [`DcovError::SourceNotFound`](crate::DcovError::SourceNotFound) when
    /// the file does not exist upstream.
    async fn fetch_file(&self, sample_id: &str) -> Result<Arc<FigmaFile>>;

    /// Fetch reference renders for `frame_ids`. Ids without a render are
    /// left out of the set. Fails with
    /// [`DcovError::ExportsUnavailable`](crate::DcovError::ExportsUnavailable)
    /// when the renders are not ready.
    async fn fetch_exports(&self, sample_id: &str, frame_ids: &[String]) -> Result<ExportSet>;
}

#[async_trait]
impl<T: DesignSource + ?Sized> DesignSource for Arc<T> {
    async fn fetch_file(&self, sample_id: &str) -> Result<Arc<FigmaFile>> {
        (**self).fetch_file(sample_id).await
    }

    async fn fetch_exports(&self, sample_id: &str, frame_ids: &[String]) -> Result<ExportSet> {
        (**self).fetch_exports(sample_id, frame_ids).await
    }
}

/// Pick the backend from config (local archive wins) and put the cache in front.
pub fn build_source(config: &Config) -> Result<Arc<dyn DesignSource>> {
    match &config.localarchive {
        Some(archive) => Ok(Arc::new(CachedSource::new(LocalArchiveSource::new(
            &archive.file,
            &archive.image,
        )))),
        None => {
            let rest = FigmaRestSource::new(&config.figma_base_url, FigmaAuth::from_env())?;
            Ok(Arc::new(CachedSource::new(rest)))
        }
    }
}
