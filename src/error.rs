use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;
use url::ParseError;

#[derive(Debug, Error)]
pub enum DcovError {
    #[error("Design file not found: {sample_id}")]
    SourceNotFound { sample_id: String },

    #[error("Exports not ready for {sample_id}: {message}")]
    ExportsUnavailable { sample_id: String, message: String },

    #[error("Conversion error: {0}")]
    Conversion(String),

    #[error("Rasterization error: {0}")]
    Rasterization(String),

    #[error("Artifact IO error at {}: {source}", path.display())]
    ArtifactIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Render worker lifecycle error: {0}")]
    WorkerLifecycle(String),

    #[error("Missing reference export for frame {0}")]
    MissingReference(String),

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] ParseError),

    #[error("Design source error (status: {status:?}): {message}")]
    SourceApi {
        status: Option<StatusCode>,
        message: String,
    },

    #[error("Image processing error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl DcovError {
    pub fn artifact_io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        DcovError::ArtifactIo {
            path: path.into(),
            source,
        }
    }

    pub fn source_api(status: Option<StatusCode>, message: impl Into<String>) -> Self {
        DcovError::SourceApi {
            status,
            message: message.into(),
        }
    }

    pub fn conversion(message: impl Into<String>) -> Self {
        DcovError::Conversion(message.into())
    }

    pub fn rasterization(message: impl Into<String>) -> Self {
        DcovError::Rasterization(message.into())
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            DcovError::SourceNotFound { .. }
            | DcovError::ExportsUnavailable { .. }
            | DcovError::SourceApi { .. }
            | DcovError::MissingReference(_) => ErrorCategory::Source,
            DcovError::Conversion(_) => ErrorCategory::Conversion,
            DcovError::Rasterization(_) | DcovError::Timeout(_) => ErrorCategory::Render,
            DcovError::ArtifactIo { .. } => ErrorCategory::Artifact,
            DcovError::WorkerLifecycle(_) => ErrorCategory::Worker,
            DcovError::Network(_) | DcovError::InvalidUrl(_) => ErrorCategory::Network,
            DcovError::Image(_) => ErrorCategory::Image,
            DcovError::Serialization(_) | DcovError::Config(_) => ErrorCategory::Config,
        }
    }

    /// Errors that abort the whole run instead of a single frame or sample.
    pub fn is_fatal(&self) -> bool {
        matches!(self, DcovError::WorkerLifecycle(_) | DcovError::Config(_))
    }

    pub fn to_payload(&self) -> ErrorPayload {
        let remediation = match self {
            DcovError::SourceNotFound { .. } => {
                "Check the sample id in the manifest and the local archive/file mirror."
            }
            DcovError::ExportsUnavailable { .. } => {
                "Reference exports are not rendered yet; rerun later with --skip-if-report-exists."
            }
            DcovError::Conversion(_) => "Inspect the frame's node tree; the converter rejected it.",
            DcovError::Rasterization(_) | DcovError::Timeout(_) => {
                "Check the generated index.html and try increasing renderTimeout/frameTimeout."
            }
            DcovError::ArtifactIo { .. } => "Check outDir permissions and free disk space.",
            DcovError::WorkerLifecycle(msg) => {
                let lower = msg.to_ascii_lowercase();
                if lower.contains("playwright npm package is missing") {
                    "Install Playwright (e.g., `npm install playwright` and `npx playwright install chromium`)."
                } else if lower.contains("not found on path") {
                    "Install Node.js and ensure the node binary is on PATH (or set nodeCommand)."
                } else {
                    "Re-run with --verbose to see the worker's stderr."
                }
            }
            DcovError::MissingReference(_) => {
                "The export set has no image for this frame; re-export the design file."
            }
            DcovError::Network(_) | DcovError::InvalidUrl(_) => {
                "Check connectivity/proxy/VPN and figmaBaseUrl, then retry."
            }
            DcovError::SourceApi { .. } => {
                "Check FIGMA_TOKEN and rate limits; retry after waiting."
            }
            DcovError::Image(_) => "Verify the reference export is a readable PNG.",
            DcovError::Serialization(_) => "Check the JSON inputs (manifest, design documents).",
            DcovError::Config(_) => "Check dcov.toml and flags (--sample, --out-dir, --config).",
        };
        ErrorPayload::new(self.category(), self.to_string(), remediation)
    }
}

pub type Result<T> = std::result::Result<T, DcovError>;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ErrorCategory {
    Source,
    Conversion,
    Render,
    Artifact,
    Worker,
    Network,
    Image,
    Config,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorPayload {
    pub category: ErrorCategory,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remediation: Option<String>,
}

impl ErrorPayload {
    pub fn new(category: ErrorCategory, message: String, remediation: impl Into<String>) -> Self {
        Self {
            category,
            message,
            remediation: Some(remediation.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_worker_and_config_errors_are_fatal() {
        assert!(DcovError::WorkerLifecycle("spawn failed".into()).is_fatal());
        assert!(DcovError::Config("bad".into()).is_fatal());
        assert!(!DcovError::rasterization("boom").is_fatal());
        assert!(!DcovError::conversion("boom").is_fatal());
        assert!(!DcovError::SourceNotFound {
            sample_id: "S1".into()
        }
        .is_fatal());
        assert!(!DcovError::artifact_io("x", std::io::Error::other("disk full")).is_fatal());
    }

    #[test]
    fn artifact_io_is_its_own_category() {
        let err = DcovError::artifact_io("/tmp/out/a.png", std::io::Error::other("disk full"));
        assert_eq!(err.category(), ErrorCategory::Artifact);
        assert!(err.to_string().contains("/tmp/out/a.png"));
    }

    #[test]
    fn worker_payload_includes_playwright_remediation() {
        let err = DcovError::WorkerLifecycle(
            "Playwright npm package is missing; install with `npm install playwright`.".into(),
        );
        let payload = err.to_payload();
        assert_eq!(payload.category, ErrorCategory::Worker);
        let remediation = payload.remediation.unwrap_or_default();
        assert!(
            remediation.contains("npm install playwright"),
            "expected playwright remediation, got: {remediation}"
        );
    }

    #[test]
    fn worker_payload_includes_node_hint() {
        let err = DcovError::WorkerLifecycle(
            "Unable to spawn render worker; 'node' was not found on PATH".into(),
        );
        let remediation = err.to_payload().remediation.unwrap_or_default();
        assert!(
            remediation.to_ascii_lowercase().contains("node"),
            "expected node remediation, got: {remediation}"
        );
    }

    #[test]
    fn exports_unavailable_payload_suggests_rerun() {
        let err = DcovError::ExportsUnavailable {
            sample_id: "S1".into(),
            message: "render pending".into(),
        };
        let payload = err.to_payload();
        assert_eq!(payload.category, ErrorCategory::Source);
        assert!(payload.message.contains("S1"));
        assert!(payload
            .remediation
            .unwrap_or_default()
            .contains("--skip-if-report-exists"));
    }
}
