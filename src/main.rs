mod cli;
mod settings;

use std::process::ExitCode;

use dcov_lib::{load_manifest, DcovError, Pipeline, RunSummary};
use tracing::error;

const EXIT_FATAL: u8 = 2;

#[tokio::main]
async fn main() -> ExitCode {
    let args = cli::parse();
    match run(&args).await {
        Ok(summary) => ExitCode::from(summary.exit_code()),
        Err(err) => {
            report_fatal(&err);
            ExitCode::from(EXIT_FATAL)
        }
    }
}

async fn run(args: &cli::Cli) -> Result<RunSummary, DcovError> {
    // The subscriber can only be installed once; a bad config still gets
    // the flag-derived level.
    let config = match settings::load_config(args) {
        Ok(config) => {
            settings::init_logging(&settings::default_log_level(
                args.verbose,
                args.quiet,
                config.log_level.as_deref(),
            ));
            config
        }
        Err(err) => {
            settings::init_logging(&settings::default_log_level(args.verbose, args.quiet, None));
            return Err(err);
        }
    };
    settings::log_effective_config(args.config.as_deref(), &config);

    let manifest = config
        .sample
        .as_deref()
        .ok_or_else(|| DcovError::Config("sample manifest location is required".into()))?;
    let samples = load_manifest(manifest)?;

    Pipeline::from_config(&config)?.run(&samples).await
}

fn report_fatal(err: &DcovError) {
    let payload = err.to_payload();
    error!(category = ?payload.category, "{}", payload.message);
    match serde_json::to_string_pretty(&payload) {
        Ok(json) => eprintln!("{json}"),
        Err(_) => eprintln!("Error: {err}"),
    }
}
