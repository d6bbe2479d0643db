//! Materializes a frame's reference export as `a.png`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use reqwest::Client;
use tracing::debug;
use url::Url;

use crate::store::ArtifactStore;
use crate::{DcovError, Result};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Where an export entry points.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReferenceLocation {
    Local(PathBuf),
    Remote(Url),
}

impl ReferenceLocation {
    /// `http(s)://` entries are remote, `file://` and bare paths are local.
    pub fn parse(location: &str) -> Self {
        match Url::parse(location) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => Self::Remote(url),
            Ok(url) if url.scheme() == "file" => match url.to_file_path() {
                Ok(path) => Self::Local(path),
                Err(()) => Self::Local(PathBuf::from(location)),
            },
            _ => Self::Local(PathBuf::from(location)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ReferenceFetcher {
    http: Client,
}

impl ReferenceFetcher {
    pub fn new() -> Result<Self> {
        Self::with_timeout(DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(DcovError::Network)?;
        Ok(Self { http })
    }

    /// Place the reference at `target` and return its bytes.
    ///
    /// A local file is symlinked (replacing any previous file or link at
    /// `target`); a remote one is downloaded and written.
    pub async fn materialize(
        &self,
        store: &ArtifactStore,
        location: &str,
        target: &Path,
    ) -> Result<Vec<u8>> {
        match ReferenceLocation::parse(location) {
            ReferenceLocation::Local(path) => {
                if !store.exists(&path).await {
                    return Err(DcovError::MissingReference(format!(
                        "{} does not exist",
                        path.display()
                    )));
                }
                store.symlink(&path, target).await?;
                debug!(target = %target.display(), source = %path.display(), "linked reference");
                tokio::fs::read(target)
                    .await
                    .map_err(|e| DcovError::artifact_io(target, e))
            }
            ReferenceLocation::Remote(url) => {
                let bytes = self.download(url).await?;
                store.write(target, &bytes).await?;
                Ok(bytes)
            }
        }
    }

    async fn download(&self, url: Url) -> Result<Vec<u8>> {
        let response = self.http.get(url.clone()).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(DcovError::source_api(
                Some(status),
                format!("reference download failed for {url}"),
            ));
        }
        let bytes = response.bytes().await?;
        debug!(%url, size = bytes.len(), "downloaded reference");
        Ok(bytes.to_vec())
    }
}
