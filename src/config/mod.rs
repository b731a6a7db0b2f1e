use garde::Validate;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

use crate::services::snapshot::ComparisonPolicy;

/// Environment variables are `IMGPRSSR_E2E_<FIELD>`, e.g. `IMGPRSSR_E2E_BASE_URL`.
pub const ENV_PREFIX: &str = "IMGPRSSR_E2E_";

pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:3000";

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct HarnessConfig {
    /// Base URL of the image service under test
    #[serde(default = "default_base_url")]
    #[garde(length(min = 1))]
    pub base_url: String,

    /// Source image every generated case is requested against
    #[serde(default = "default_resource_path")]
    #[garde(length(min = 1))]
    pub resource_path: String,

    /// Directory holding accepted baselines
    #[serde(default = "default_snapshot_dir")]
    #[garde(skip)]
    pub snapshot_dir: PathBuf,

    /// Replace differing baselines instead of failing
    #[serde(default)]
    #[garde(skip)]
    pub update_snapshots: bool,

    #[serde(default = "default_request_timeout_secs")]
    #[garde(range(min = 1))]
    pub request_timeout_secs: u64,

    /// Maximum number of cases in flight at once
    #[serde(default = "default_concurrency")]
    #[garde(range(min = 1))]
    pub concurrency: usize,

    /// Fraction of pixels allowed to differ. Unset means byte-exact comparison.
    #[serde(default)]
    #[garde(range(min = 0.0, max = 1.0))]
    pub pixel_threshold: Option<f64>,

    /// Per-channel difference below which a pixel counts as unchanged
    #[serde(default)]
    #[garde(skip)]
    pub color_threshold: u8,

    /// Where to write the JSON run report, if anywhere
    #[serde(default)]
    #[garde(skip)]
    pub report_path: Option<PathBuf>,

    #[serde(default)]
    #[garde(skip)]
    pub log_json: bool,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_resource_path() -> String {
    "test_card_sml.png".to_string()
}

fn default_snapshot_dir() -> PathBuf {
    PathBuf::from("tests/__image_snapshots__")
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_concurrency() -> usize {
    4
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            resource_path: default_resource_path(),
            snapshot_dir: default_snapshot_dir(),
            update_snapshots: false,
            request_timeout_secs: default_request_timeout_secs(),
            concurrency: default_concurrency(),
            pixel_threshold: None,
            color_threshold: 0,
            report_path: None,
            log_json: false,
        }
    }
}

impl HarnessConfig {
    /// Resolve the configuration once for the whole run.
    ///
    /// An injected base URL wins over `IMGPRSSR_E2E_BASE_URL`, which wins over
    /// [`DEFAULT_BASE_URL`].
    pub fn resolve(base_url_override: Option<&str>) -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_vars(std::env::vars(), base_url_override)
    }

    /// Resolve from an explicit set of variables instead of the process environment.
    pub fn from_vars<I>(vars: I, base_url_override: Option<&str>) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut config: Self = envy::prefixed(ENV_PREFIX).from_iter(vars)?;
        if let Some(url) = base_url_override {
            config.base_url = url.to_string();
        }
        config.base_url = config.base_url.trim().trim_end_matches('/').to_string();
        config.validate()?;
        Ok(config)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn comparison_policy(&self) -> ComparisonPolicy {
        match self.pixel_threshold {
            Some(max_diff_ratio) => ComparisonPolicy::Pixel {
                color_threshold: self.color_threshold,
                max_diff_ratio,
            },
            None => ComparisonPolicy::Exact,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read configuration from environment: {0}")]
    Env(#[from] envy::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(#[from] garde::Report),
}
