//! Command-line interface for the harness runner
//!
//! Flags override the matching `IMGPRSSR_E2E_*` variables for one run.

use clap::Parser;
use std::path::PathBuf;

use crate::config::HarnessConfig;

/// End-to-end checks for the imgprssr image service
#[derive(Parser, Debug)]
#[command(name = "imgprssr-e2e")]
#[command(version, about, long_about = None)]
#[command(after_help = r#"ENVIRONMENT VARIABLES:
    IMGPRSSR_E2E_BASE_URL              Service URL (default: http://127.0.0.1:3000)
    IMGPRSSR_E2E_RESOURCE_PATH         Source image on the service (default: test_card_sml.png)
    IMGPRSSR_E2E_SNAPSHOT_DIR          Baseline directory (default: tests/__image_snapshots__)
    IMGPRSSR_E2E_UPDATE_SNAPSHOTS      Replace differing baselines (default: false)
    IMGPRSSR_E2E_REQUEST_TIMEOUT_SECS  Per-request timeout (default: 30)
    IMGPRSSR_E2E_CONCURRENCY           Cases in flight at once (default: 4)
    IMGPRSSR_E2E_PIXEL_THRESHOLD       Fraction of pixels allowed to differ (default: unset, byte-exact)
    IMGPRSSR_E2E_COLOR_THRESHOLD       Per-channel delta ignored by the pixel comparison (default: 0)
    IMGPRSSR_E2E_REPORT_PATH           Write a JSON run report here
    IMGPRSSR_E2E_LOG_JSON              JSON log lines on stderr (default: false)
    RUST_LOG                           Log filter (default: info)
"#)]
pub struct Cli {
    /// Only run cases whose identity contains this text, e.g. `cropping__`
    pub filter: Option<String>,

    /// Service URL, overriding IMGPRSSR_E2E_BASE_URL
    #[arg(short, long)]
    pub base_url: Option<String>,

    /// Replace differing baselines with the received images
    #[arg(short, long, default_value_t = false)]
    pub update: bool,

    /// Write a JSON run report to this path
    #[arg(short, long)]
    pub report: Option<PathBuf>,
}

impl Cli {
    /// Fold the flags that are not part of config resolution into `config`.
    pub fn apply(&self, config: &mut HarnessConfig) {
        if self.update {
            config.update_snapshots = true;
        }
        if let Some(path) = &self.report {
            config.report_path = Some(path.clone());
        }
    }
}
