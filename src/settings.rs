use std::path::Path;

use dcov_lib::{Config, DcovError};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use crate::cli::Cli;

const DEFAULT_LOG_LEVEL: &str = "info";

/// Load config (explicit path, ./dcov.toml, or defaults), apply CLI
/// overrides, then validate the merged result.
pub fn load_config(cli: &Cli) -> Result<Config, DcovError> {
    let config = Config::load(cli.config.as_deref())?;
    let config = apply_overrides(config, cli);
    config.validate().map_err(|e| match cli.config.as_deref() {
        Some(path) => DcovError::Config(format!("Invalid config ({}): {}", path.display(), e)),
        None => e,
    })?;
    Ok(config)
}

/// CLI flags win over config values when present.
pub fn apply_overrides(mut config: Config, cli: &Cli) -> Config {
    if let Some(sample) = &cli.sample {
        config.sample = Some(sample.clone());
    }
    if let Some(out_dir) = &cli.out_dir {
        config.out_dir = out_dir.clone();
    }
    if cli.skip_if_report_exists {
        config.skip_if_report_exists = true;
    }
    if let Some(timeout) = cli.frame_timeout {
        config.frame_timeout = timeout;
    }
    config
}

/// Level used when `RUST_LOG` is unset: --verbose, --quiet, config, then info.
pub fn default_log_level(verbose: bool, quiet: bool, config_level: Option<&str>) -> String {
    if verbose {
        "debug".to_string()
    } else if quiet {
        "warn".to_string()
    } else {
        config_level
            .map(str::trim)
            .filter(|level| !level.is_empty())
            .unwrap_or(DEFAULT_LOG_LEVEL)
            .to_string()
    }
}

pub fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_LEVEL));
    // A second init (tests) is harmless.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

pub fn log_effective_config(config_path: Option<&Path>, config: &Config) {
    let source = config_path
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "defaults/dcov.toml".to_string());
    debug!(
        source = %source,
        sample = ?config.sample,
        out_dir = %config.out_dir.display(),
        localarchive = config.localarchive.is_some(),
        skip_if_report_exists = config.skip_if_report_exists,
        frame_timeout = ?config.frame_timeout,
        render_timeout = ?config.render_timeout,
        diff_tolerance = config.diff_tolerance,
        "effective config"
    );
}
