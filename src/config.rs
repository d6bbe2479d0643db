use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::report::EngineInfo;
use crate::{DcovError, Result};

/// Config file picked up from the working directory when `--config` is absent.
pub const DEFAULT_CONFIG_FILE: &str = "dcov.toml";

pub const DEFAULT_OUT_DIR: &str = ".coverage";
pub const DEFAULT_FIGMA_BASE_URL: &str = "https://api.figma.com";
pub const DEFAULT_FRAME_TIMEOUT: Duration = Duration::from_secs(120);
pub const DEFAULT_RENDER_TIMEOUT: Duration = Duration::from_secs(60);
pub const DEFAULT_DIFF_TOLERANCE: u8 = 16;

/// Run configuration, loaded from TOML. Keys are camelCase (`outDir`,
/// `skipIfReportExists`, ...); snake_case spellings are accepted too.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Location of the sample manifest.
    #[serde(default)]
    pub sample: Option<PathBuf>,
    #[serde(default = "default_out_dir", alias = "out_dir")]
    pub out_dir: PathBuf,
    #[serde(default)]
    pub localarchive: Option<LocalArchive>,
    #[serde(default, alias = "skip_if_report_exists")]
    pub skip_if_report_exists: bool,
    #[serde(
        default = "default_frame_timeout",
        with = "humantime_serde",
        alias = "frame_timeout"
    )]
    pub frame_timeout: Duration,
    #[serde(
        default = "default_render_timeout",
        with = "humantime_serde",
        alias = "render_timeout"
    )]
    pub render_timeout: Duration,
    #[serde(default = "default_node_command", alias = "node_command")]
    pub node_command: String,
    #[serde(default = "default_diff_tolerance", alias = "diff_tolerance")]
    pub diff_tolerance: u8,
    #[serde(default, alias = "log_level")]
    pub log_level: Option<String>,
    #[serde(default = "default_figma_base_url", alias = "figma_base_url")]
    pub figma_base_url: String,
    #[serde(default)]
    pub engine: EngineInfo,
}

/// Local mirrors of the design source: documents under `file`, exports under `image`.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct LocalArchive {
    pub file: PathBuf,
    pub image: PathBuf,
}

fn default_out_dir() -> PathBuf {
    PathBuf::from(DEFAULT_OUT_DIR)
}

fn default_frame_timeout() -> Duration {
    DEFAULT_FRAME_TIMEOUT
}

fn default_render_timeout() -> Duration {
    DEFAULT_RENDER_TIMEOUT
}

fn default_node_command() -> String {
    "node".to_string()
}

fn default_diff_tolerance() -> u8 {
    DEFAULT_DIFF_TOLERANCE
}

fn default_figma_base_url() -> String {
    DEFAULT_FIGMA_BASE_URL.to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sample: None,
            out_dir: default_out_dir(),
            localarchive: None,
            skip_if_report_exists: false,
            frame_timeout: DEFAULT_FRAME_TIMEOUT,
            render_timeout: DEFAULT_RENDER_TIMEOUT,
            node_command: default_node_command(),
            diff_tolerance: DEFAULT_DIFF_TOLERANCE,
            log_level: None,
            figma_base_url: default_figma_base_url(),
            engine: EngineInfo::default(),
        }
    }
}

impl Config {
    /// Load config from an explicit path, or `dcov.toml` in the working
    /// directory, or fall back to defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => {
                let local = Path::new(DEFAULT_CONFIG_FILE);
                if local.is_file() {
                    Self::from_file(local)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            DcovError::Config(format!("Failed to read config {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&raw)
            .map_err(|e| DcovError::Config(format!("Invalid config ({}): {}", path.display(), e)))
    }

    pub fn from_toml_str(raw: &str) -> std::result::Result<Self, String> {
        toml::from_str(raw).map_err(|e| e.to_string())
    }

    pub fn validate(&self) -> Result<()> {
        if self.sample.is_none() {
            return Err(DcovError::Config(
                "sample manifest location is required (set `sample` or pass --sample)".into(),
            ));
        }
        if self.out_dir.as_os_str().is_empty() {
            return Err(DcovError::Config("outDir must not be empty".into()));
        }
        if self.frame_timeout.is_zero() {
            return Err(DcovError::Config("frameTimeout must be greater than zero".into()));
        }
        if self.render_timeout.is_zero() {
            return Err(DcovError::Config(
                "renderTimeout must be greater than zero".into(),
            ));
        }
        if self.node_command.trim().is_empty() {
            return Err(DcovError::Config("nodeCommand must not be empty".into()));
        }
        Ok(())
    }
}
