//! Conversion and markup generation for a single frame.
//!
//! Asset lookups go through an explicit per-sample [`AssetRepository`] and an
//! [`ImageResolver`]; nothing here holds process-wide state, so two samples
//! can never see each other's assets.

pub mod convert;
pub mod html;

use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use tracing::warn;
use url::Url;

pub use convert::{convert, ConversionResult, IntermediateNode, NodeKind};
pub use html::HtmlCssGenerator;

use crate::figma::DesignSource;
use crate::{DcovError, Result};

/// Scheme used for assets that could not be resolved to a real URL.
pub const RESERVED_ASSET_PREFIX: &str = "grida://assets-reservation/images/";

/// Where a sample's embedded assets come from. Built once per sample and
/// passed into every codegen call for that sample's frames.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetRepository {
    pub file_key: String,
    pub reserved_prefix: String,
}

impl AssetRepository {
    pub fn for_sample(file_key: impl Into<String>) -> Self {
        Self {
            file_key: file_key.into(),
            reserved_prefix: RESERVED_ASSET_PREFIX.to_string(),
        }
    }

    pub fn placeholder(&self, key: &str) -> String {
        format!("{}{}", self.reserved_prefix, key)
    }
}

/// Resolves asset keys (node ids) to image URLs on demand.
#[async_trait]
pub trait ImageResolver: Send + Sync {
    async fn resolve(&self, keys: &[String]) -> Result<HashMap<String, String>>;
}

/// Resolves assets through the design source's export call, scoped to the
/// requested keys. Keys without a rendered export are left out of the map.
pub struct SourceImageResolver<'a> {
    source: &'a dyn DesignSource,
    sample_id: &'a str,
}

impl<'a> SourceImageResolver<'a> {
    pub fn new(source: &'a dyn DesignSource, sample_id: &'a str) -> Self {
        Self { source, sample_id }
    }
}

#[async_trait]
impl ImageResolver for SourceImageResolver<'_> {
    async fn resolve(&self, keys: &[String]) -> Result<HashMap<String, String>> {
        let exports = match self.source.fetch_exports(self.sample_id, keys).await {
            Ok(exports) => exports,
            // Unrendered assets fall back to placeholders.
            Err(DcovError::ExportsUnavailable { message, .. }) => {
                warn!(sample = %self.sample_id, %message, "no asset exports available");
                return Ok(HashMap::new());
            }
            Err(err) => return Err(err),
        };
        Ok(exports
            .into_iter()
            .map(|(key, location)| (key, asset_url(location)))
            .collect())
    }
}

/// Local export paths become `file://` URLs so the page can load them.
fn asset_url(location: String) -> String {
    if Path::new(&location).is_absolute() {
        if let Ok(url) = Url::from_file_path(&location) {
            return url.to_string();
        }
    }
    location
}

/// Turns one converted frame into a standalone renderable document.
#[async_trait]
pub trait MarkupGenerator: Send + Sync {
    async fn generate(
        &self,
        entry: &ConversionResult,
        assets: &AssetRepository,
        resolver: &dyn ImageResolver,
    ) -> Result<String>;
}
