use std::path::PathBuf;
use std::time::Duration;

use clap::{ArgGroup, Parser};

#[derive(Parser, Debug)]
#[command(name = "dcov")]
#[command(
    version,
    about = "Design Coverage - visual regression of design-to-code conversion",
    long_about = "Design Coverage (dcov)\n\nFor every sample in the manifest, each top-level frame is converted to HTML/CSS, rasterized in headless chromium, and diffed against the design tool's export. Artifacts land in <outDir>/<sample>/<frame>/ with report.json written last.\n\nExit codes: 0 = all frames reported, 1 = coverage gaps (skipped samples or failed frames), 2 = fatal error."
)]
#[command(group(ArgGroup::new("verbosity").args(["verbose", "quiet"])))]
pub struct Cli {
    #[arg(long, help = "Enable debug logging (ignored when RUST_LOG is set)")]
    pub verbose: bool,

    #[arg(long, help = "Only log warnings and errors")]
    pub quiet: bool,

    #[arg(
        long,
        value_name = "PATH",
        help = "Config file (TOML); defaults to ./dcov.toml when present. CLI flags override config"
    )]
    pub config: Option<PathBuf>,

    #[arg(long, value_name = "PATH", help = "Sample manifest (JSON or YAML)")]
    pub sample: Option<PathBuf>,

    #[arg(long, value_name = "DIR", help = "Artifact root directory")]
    pub out_dir: Option<PathBuf>,

    #[arg(long, help = "Skip frames whose report.json already exists")]
    pub skip_if_report_exists: bool,

    #[arg(
        long,
        value_name = "DURATION",
        value_parser = parse_duration,
        help = "Per-frame timeout, e.g. 90s or 2m"
    )]
    pub frame_timeout: Option<Duration>,
}

fn parse_duration(raw: &str) -> Result<Duration, String> {
    humantime_serde::re::humantime::parse_duration(raw).map_err(|e| e.to_string())
}

pub fn parse() -> Cli {
    Cli::parse()
}
