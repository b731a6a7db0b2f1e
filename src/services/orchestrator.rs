use futures::stream::{self, StreamExt};
use std::sync::Arc;
use std::time::Instant;

use crate::config::HarnessConfig;
use crate::models::outcome::{CaseReport, RunSummary, TestOutcome};
use crate::models::transform::{BoundaryPolicy, Expectation, ExpectedDimensions, TransformRequest};
use crate::services::fetcher::{FetchError, ImageFetcher};
use crate::services::probe::{self, ProbedDimensions};
use crate::services::snapshot::{ComparisonResult, SnapshotStore};

/// Drives cases through fetch, probe and snapshot comparison.
pub struct Orchestrator {
    config: Arc<HarnessConfig>,
    fetcher: ImageFetcher,
    store: SnapshotStore,
}

impl Orchestrator {
    pub fn new(config: Arc<HarnessConfig>) -> Result<Self, FetchError> {
        let fetcher = ImageFetcher::new(config.request_timeout())?;
        let store = SnapshotStore::new(
            config.snapshot_dir.clone(),
            config.comparison_policy(),
            config.update_snapshots,
        );
        Ok(Self {
            config,
            fetcher,
            store,
        })
    }

    pub fn store(&self) -> &SnapshotStore {
        &self.store
    }

    /// Run every case and collect one report per case, in input order.
    ///
    /// Up to `concurrency` cases are in flight at once. A failing case never
    /// stops the others.
    pub async fn run(&self, cases: &[TransformRequest]) -> Vec<CaseReport> {
        tracing::info!(
            cases = cases.len(),
            base_url = %self.config.base_url,
            concurrency = self.config.concurrency,
            "Starting run"
        );

        stream::iter(cases)
            .map(|case| self.run_case(case))
            .buffered(self.config.concurrency.max(1))
            .collect()
            .await
    }

    /// Run the cases and fold the reports into a summary.
    pub async fn run_summary(&self, cases: &[TransformRequest]) -> RunSummary {
        let reports = self.run(cases).await;
        RunSummary::new(&self.config.base_url, reports)
    }

    pub async fn run_case(&self, case: &TransformRequest) -> CaseReport {
        let identity = case.identity();
        let start = Instant::now();
        let (outcome, boundary_policy) = self.evaluate(case, &identity).await;
        let boundary_policy = boundary_policy.filter(|_| outcome.is_pass());
        let elapsed_ms = start.elapsed().as_millis() as u64;

        if outcome.is_pass() {
            tracing::info!(case = %identity, outcome = outcome.kind(), elapsed_ms, "Case passed");
        } else {
            tracing::error!(
                case = %identity,
                outcome = outcome.kind(),
                elapsed_ms,
                detail = %outcome,
                "Case failed"
            );
        }

        CaseReport {
            identity,
            suite: case.suite,
            request: case.describe(),
            outcome,
            boundary_policy,
            elapsed_ms,
        }
    }

    async fn evaluate(
        &self,
        case: &TransformRequest,
        identity: &str,
    ) -> (TestOutcome, Option<BoundaryPolicy>) {
        let fetched = self.fetcher.fetch(&self.config.base_url, case).await;

        if case.expectation == Expectation::ServiceError {
            let outcome = match fetched {
                Ok(result) => TestOutcome::UnexpectedSuccess {
                    status: result.status,
                },
                Err(FetchError::Service { status, .. }) => {
                    tracing::debug!(case = identity, status, "Service refused as expected");
                    TestOutcome::Pass
                }
                Err(e) => e.into(),
            };
            return (outcome, None);
        }

        let fetched = match fetched {
            Ok(result) => result,
            Err(e) => return (e.into(), None),
        };

        let actual = match probe::probe(&fetched.body) {
            Ok(dims) => dims,
            Err(e) => {
                let outcome = TestOutcome::MalformedImage {
                    message: match &fetched.content_type {
                        Some(ct) => format!("{e} (content-type {ct})"),
                        None => e.to_string(),
                    },
                };
                return (outcome, None);
            }
        };
        tracing::debug!(
            case = identity,
            width = actual.width,
            height = actual.height,
            format = %actual.format,
            "Probed response"
        );

        let expected = case.expected_dimensions();
        let mut policy = None;
        if case.expectation == Expectation::Boundary {
            match self.boundary_policy(case, expected, &actual).await {
                Ok(Some(seen)) => {
                    tracing::debug!(case = identity, policy = %seen, "Boundary request answered");
                    policy = Some(seen);
                }
                Ok(None) => return (TestOutcome::DimensionMismatch { expected, actual }, None),
                Err(outcome) => return (outcome, None),
            }
        } else if !expected.matches(actual.width, actual.height) {
            return (TestOutcome::DimensionMismatch { expected, actual }, None);
        }

        let outcome = match self.store.compare(identity, &fetched.body).await {
            Ok(ComparisonResult::Matched) | Ok(ComparisonResult::Tolerated { .. }) => {
                TestOutcome::Pass
            }
            Ok(ComparisonResult::Recorded { baseline }) => TestOutcome::Recorded { baseline },
            Ok(ComparisonResult::Updated { baseline }) => TestOutcome::Updated { baseline },
            Ok(ComparisonResult::Mismatch(mismatch)) => TestOutcome::SnapshotMismatch {
                baseline: mismatch.baseline_path,
                received: mismatch.received_path,
                diff: mismatch.diff_path,
                diff_ratio: mismatch.diff_ratio,
            },
            Err(e) => TestOutcome::SnapshotError {
                message: e.to_string(),
            },
        };
        (outcome, policy)
    }

    /// Work out how the service treated an oversized request.
    ///
    /// An exact match on the pinned axes is an upscale. Otherwise the resource
    /// is fetched without parameters, and a response whose pinned axes equal
    /// the native ones is a clamp. `Ok(None)` means neither.
    async fn boundary_policy(
        &self,
        case: &TransformRequest,
        expected: ExpectedDimensions,
        actual: &ProbedDimensions,
    ) -> Result<Option<BoundaryPolicy>, TestOutcome> {
        if expected.matches(actual.width, actual.height) {
            return Ok(Some(BoundaryPolicy::Upscale));
        }

        let native = self
            .fetcher
            .fetch(&self.config.base_url, &case.native())
            .await
            .map_err(TestOutcome::from)?;
        let native = probe::probe(&native.body).map_err(|e| TestOutcome::MalformedImage {
            message: format!("native {}: {e}", case.resource_path),
        })?;

        let clamped = ExpectedDimensions {
            width: expected.width.map(|_| native.width),
            height: expected.height.map(|_| native.height),
        };
        Ok(clamped
            .matches(actual.width, actual.height)
            .then_some(BoundaryPolicy::Clamp))
    }
}

impl From<FetchError> for TestOutcome {
    fn from(err: FetchError) -> Self {
        match err {
            FetchError::Service { status, body } => TestOutcome::ServiceError { status, body },
            other => TestOutcome::NetworkError {
                message: if other.is_timeout() {
                    format!("timed out: {other}")
                } else {
                    other.to_string()
                },
            },
        }
    }
}
