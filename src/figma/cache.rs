//! Process-lifetime response cache in front of a [`DesignSource`].

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use tracing::debug;

use super::api_types::FigmaFile;
use super::{DesignSource, ExportSet};
use crate::Result;

/// Memoizes successful responses keyed by request identity. Failures are
/// never cached so a later call can still succeed.
#[derive(Debug)]
pub struct CachedSource<S> {
    inner: S,
    files: DashMap<String, Arc<FigmaFile>>,
    exports: DashMap<String, ExportSet>,
}

impl<S> CachedSource<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            files: DashMap::new(),
            exports: DashMap::new(),
        }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }
}

fn file_key(sample_id: &str) -> String {
    format!("file:{sample_id}")
}

/// Id order does not change the request's identity.
fn exports_key(sample_id: &str, frame_ids: &[String]) -> String {
    let mut ids: Vec<&str> = frame_ids.iter().map(String::as_str).collect();
    ids.sort_unstable();
    ids.dedup();
    format!("images:{sample_id}:{}", ids.join(","))
}

#[async_trait]
impl<S: DesignSource> DesignSource for CachedSource<S> {
    async fn fetch_file(&self, sample_id: &str) -> Result<Arc<FigmaFile>> {
        let key = file_key(sample_id);
        if let Some(hit) = self.files.get(&key) {
            debug!(%key, "design source cache hit");
            return Ok(Arc::clone(hit.value()));
        }
        let file = self.inner.fetch_file(sample_id).await?;
        self.files.insert(key, Arc::clone(&file));
        Ok(file)
    }

    async fn fetch_exports(&self, sample_id: &str, frame_ids: &[String]) -> Result<ExportSet> {
        let key = exports_key(sample_id, frame_ids);
        if let Some(hit) = self.exports.get(&key) {
            debug!(%key, "design source cache hit");
            return Ok(hit.value().clone());
        }
        let set = self.inner.fetch_exports(sample_id, frame_ids).await?;
        self.exports.insert(key, set.clone());
        Ok(set)
    }
}
