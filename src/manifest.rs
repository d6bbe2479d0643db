//! Sample manifest loading.

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::{DcovError, Result};

/// One design file nominated for regression testing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sample {
    pub id: String,
}

impl Sample {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

/// Load the manifest from a JSON or YAML file (picked by extension).
pub fn load_manifest(path: &Path) -> Result<Vec<Sample>> {
    let raw = std::fs::read_to_string(path).map_err(|e| {
        DcovError::Config(format!(
            "Failed to read sample manifest {}: {}",
            path.display(),
            e
        ))
    })?;

    let is_yaml = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| matches!(ext.to_ascii_lowercase().as_str(), "yaml" | "yml"))
        .unwrap_or(false);

    let samples = if is_yaml {
        parse_yaml_manifest(&raw)?
    } else {
        parse_json_manifest(&raw)?
    };
    for sample in &samples {
        validate_sample_id(&sample.id)?;
    }
    Ok(dedup_samples(samples))
}

/// Sample ids become directory names under the output root, so they must be
/// a single plain path segment.
pub fn validate_sample_id(id: &str) -> Result<()> {
    let unsafe_id = id.trim().is_empty()
        || id == "."
        || id == ".."
        || id.contains(['/', '\\', '\0']);
    if unsafe_id {
        return Err(DcovError::Config(format!(
            "Invalid sample id {id:?}: ids must be a single path segment"
        )));
    }
    Ok(())
}

pub fn parse_json_manifest(raw: &str) -> Result<Vec<Sample>> {
    serde_json::from_str(raw)
        .map_err(|e| DcovError::Config(format!("Invalid sample manifest JSON: {e}")))
}

pub fn parse_yaml_manifest(raw: &str) -> Result<Vec<Sample>> {
    serde_yaml::from_str(raw)
        .map_err(|e| DcovError::Config(format!("Invalid sample manifest YAML: {e}")))
}

/// Drop repeated ids, keeping the first occurrence and the manifest order.
pub fn dedup_samples(samples: Vec<Sample>) -> Vec<Sample> {
    let mut seen = HashSet::new();
    samples
        .into_iter()
        .filter(|sample| {
            let fresh = seen.insert(sample.id.clone());
            if !fresh {
                warn!(sample = %sample.id, "duplicate sample id in manifest; ignoring repeat");
            }
            fresh
        })
        .collect()
}
