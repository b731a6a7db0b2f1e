use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::PathBuf;
use strum::IntoStaticStr;

use crate::models::transform::{BoundaryPolicy, ExpectedDimensions, Suite};
use crate::services::probe::ProbedDimensions;

/// Verdict for one case.
#[derive(Debug, Clone, PartialEq, Serialize, IntoStaticStr)]
#[serde(tag = "kind", rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TestOutcome {
    Pass,
    /// Passed, and a new baseline was written.
    Recorded { baseline: PathBuf },
    /// Passed in update mode after replacing a differing baseline.
    Updated { baseline: PathBuf },
    DimensionMismatch {
        expected: ExpectedDimensions,
        actual: ProbedDimensions,
    },
    NetworkError { message: String },
    ServiceError { status: u16, body: String },
    /// A case that expected a refusal got a success status instead.
    UnexpectedSuccess { status: u16 },
    MalformedImage { message: String },
    SnapshotMismatch {
        baseline: PathBuf,
        received: PathBuf,
        diff: Option<PathBuf>,
        diff_ratio: Option<f64>,
    },
    /// Baseline storage failed; says nothing about the service.
    SnapshotError { message: String },
}

impl TestOutcome {
    pub fn is_pass(&self) -> bool {
        matches!(
            self,
            TestOutcome::Pass | TestOutcome::Recorded { .. } | TestOutcome::Updated { .. }
        )
    }

    /// Same name as the `kind` tag in the JSON report.
    pub fn kind(&self) -> &'static str {
        self.into()
    }
}

impl std::fmt::Display for TestOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TestOutcome::Pass => write!(f, "pass"),
            TestOutcome::Recorded { baseline } => {
                write!(f, "pass (new baseline written to {})", baseline.display())
            }
            TestOutcome::Updated { baseline } => {
                write!(f, "pass (baseline replaced at {})", baseline.display())
            }
            TestOutcome::DimensionMismatch { expected, actual } => write!(
                f,
                "dimension mismatch: expected {expected}, got {}x{}",
                actual.width, actual.height
            ),
            TestOutcome::NetworkError { message } => write!(f, "network error: {message}"),
            TestOutcome::ServiceError { status, body } => {
                write!(f, "service error: HTTP {status}")?;
                if !body.is_empty() {
                    write!(f, " ({body})")?;
                }
                Ok(())
            }
            TestOutcome::UnexpectedSuccess { status } => {
                write!(f, "expected a refusal, got HTTP {status}")
            }
            TestOutcome::MalformedImage { message } => write!(f, "malformed image: {message}"),
            TestOutcome::SnapshotMismatch {
                received,
                diff,
                diff_ratio,
                ..
            } => {
                write!(f, "snapshot mismatch, received {}", received.display())?;
                if let Some(diff) = diff {
                    write!(f, ", diff {}", diff.display())?;
                }
                if let Some(ratio) = diff_ratio {
                    write!(f, " ({:.2}% of pixels differ)", ratio * 100.0)?;
                }
                Ok(())
            }
            TestOutcome::SnapshotError { message } => write!(f, "snapshot error: {message}"),
        }
    }
}

/// One case's result as it appears in the run report.
#[derive(Debug, Clone, Serialize)]
pub struct CaseReport {
    pub identity: String,
    pub suite: Suite,
    pub request: String,
    pub outcome: TestOutcome,
    /// Set on boundary cases that passed, naming what the service did.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub boundary_policy: Option<BoundaryPolicy>,
    pub elapsed_ms: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub generated_at: DateTime<Utc>,
    pub base_url: String,
    pub passed: usize,
    pub failed: usize,
    pub recorded: usize,
    pub cases: Vec<CaseReport>,
}

impl RunSummary {
    pub fn new(base_url: &str, cases: Vec<CaseReport>) -> Self {
        let passed = cases.iter().filter(|c| c.outcome.is_pass()).count();
        let recorded = cases
            .iter()
            .filter(|c| matches!(c.outcome, TestOutcome::Recorded { .. } | TestOutcome::Updated { .. }))
            .count();
        Self {
            generated_at: Utc::now(),
            base_url: base_url.to_string(),
            passed,
            failed: cases.len() - passed,
            recorded,
            cases,
        }
    }

    pub fn is_success(&self) -> bool {
        self.failed == 0
    }

    /// Human-readable summary, one line per case.
    pub fn render(&self) -> String {
        let mut out = format!("Results against {}\n\n", self.base_url);
        for case in &self.cases {
            let mark = if case.outcome.is_pass() { "✓" } else { "✗" };
            out.push_str(&format!(
                "  {mark} [{}] {} ({} ms): {}",
                case.suite, case.request, case.elapsed_ms, case.outcome
            ));
            if let Some(policy) = case.boundary_policy {
                out.push_str(&format!(" (service policy: {policy})"));
            }
            out.push('\n');
        }
        out.push_str(&format!(
            "\n{} passed, {} failed, {} total",
            self.passed,
            self.failed,
            self.cases.len()
        ));
        if self.recorded > 0 {
            out.push_str(&format!(
                "\n⚠ {} baseline(s) written this run; review and commit them",
                self.recorded
            ));
        }
        out.push('\n');
        out
    }
}
