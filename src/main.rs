use clap::Parser;
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use imgprssr_e2e::cli::Cli;
use imgprssr_e2e::config::HarnessConfig;
use imgprssr_e2e::services::matrix::{filter_cases, TestCaseMatrix};
use imgprssr_e2e::services::orchestrator::Orchestrator;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let mut config = match HarnessConfig::resolve(cli.base_url.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            return ExitCode::from(2);
        }
    };

    cli.apply(&mut config);
    init_tracing(config.log_json);

    let config = Arc::new(config);
    let filter = cli.filter;

    let cases = filter_cases(
        TestCaseMatrix::new(&config.resource_path).generate(),
        filter.as_deref(),
    );
    if cases.is_empty() {
        tracing::error!(filter = ?filter, "No cases match the filter");
        return ExitCode::from(2);
    }

    if config.update_snapshots {
        tracing::warn!(
            dir = %config.snapshot_dir.display(),
            "Update mode enabled, differing baselines will be replaced"
        );
    }

    let orchestrator = match Orchestrator::new(Arc::clone(&config)) {
        Ok(o) => o,
        Err(e) => {
            tracing::error!(error = %e, "Failed to initialize HTTP client");
            return ExitCode::from(2);
        }
    };

    let summary = orchestrator.run_summary(&cases).await;
    print!("{}", summary.render());

    if let Some(path) = &config.report_path {
        let written = match serde_json::to_vec_pretty(&summary) {
            Ok(json) => tokio::fs::write(path, json).await.map_err(|e| e.to_string()),
            Err(e) => Err(e.to_string()),
        };
        match written {
            Ok(()) => tracing::info!(path = %path.display(), "Wrote run report"),
            Err(e) => {
                tracing::error!(path = %path.display(), error = %e, "Failed to write run report");
                return ExitCode::FAILURE;
            }
        }
    }

    if summary.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

/// Logs go to stderr so the summary on stdout stays readable.
fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}
