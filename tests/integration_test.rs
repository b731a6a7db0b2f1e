//! Harness integration tests against a stubbed image service
//!
//! wiremock stands in for imgprssr, so these run without any infrastructure.

mod fixtures;
mod helpers;

use fixtures::*;
use helpers::*;
use std::time::Duration;

use imgprssr_e2e::models::outcome::TestOutcome;
use imgprssr_e2e::models::transform::{px, BoundaryPolicy, Expectation, Suite, TransformRequest};
use imgprssr_e2e::services::matrix::{TestCaseMatrix, MISSING_RESOURCE};
use wiremock::{MockServer, ResponseTemplate};

#[tokio::test]
async fn test_full_matrix_passes_against_correct_service() {
    let cases = TestCaseMatrix::new(SOURCE_IMAGE).generate();
    let server = correct_service(&cases).await;
    let dir = tempfile::tempdir().unwrap();
    let orchestrator = orchestrator(harness_config(&server.uri(), dir.path()));

    let summary = orchestrator.run_summary(&cases).await;

    assert_eq!(summary.cases.len(), cases.len());
    for case in &summary.cases {
        assert!(case.outcome.is_pass(), "{}: {}", case.identity, case.outcome);
    }
    // every dimension case recorded a baseline, the refusal case did not
    assert_eq!(summary.recorded, cases.len() - 1);
    assert!(summary.is_success());
    for case in summary.cases.iter().filter(|c| c.suite == Suite::Boundary) {
        assert_eq!(case.boundary_policy, Some(BoundaryPolicy::Upscale));
    }
}

#[tokio::test]
async fn test_full_matrix_passes_against_clamping_service() {
    let cases = TestCaseMatrix::new(SOURCE_IMAGE).generate();
    let server = clamping_service(&cases).await;
    let dir = tempfile::tempdir().unwrap();
    let orchestrator = orchestrator(harness_config(&server.uri(), dir.path()));

    let summary = orchestrator.run_summary(&cases).await;

    for case in &summary.cases {
        assert!(case.outcome.is_pass(), "{}: {}", case.identity, case.outcome);
    }
    assert!(summary.is_success());

    let boundary: Vec<_> = summary
        .cases
        .iter()
        .filter(|c| c.suite == Suite::Boundary)
        .collect();
    assert_eq!(boundary.len(), 2);
    for case in boundary {
        assert_eq!(case.boundary_policy, Some(BoundaryPolicy::Clamp));
    }
    assert!(summary.render().contains("(service policy: clamp)"));
}

#[tokio::test]
async fn test_boundary_answer_that_is_neither_policy_fails() {
    let cases = TestCaseMatrix::new(SOURCE_IMAGE).boundary_cases();
    let request = &cases[0];
    let server = MockServer::start().await;
    // width=2400 answered with something that is neither 2400 wide nor native
    mount_image(&server, request, png_card(800, 800)).await;
    mount_image(&server, &request.native(), png_card(SOURCE_WIDTH, SOURCE_HEIGHT)).await;

    let dir = tempfile::tempdir().unwrap();
    let reports = orchestrator(harness_config(&server.uri(), dir.path()))
        .run(std::slice::from_ref(request))
        .await;

    assert_eq!(request.expectation, Expectation::Boundary);
    assert!(matches!(
        outcome_of(&reports, request),
        TestOutcome::DimensionMismatch { .. }
    ));
    assert!(reports[0].boundary_policy.is_none());
}

#[tokio::test]
async fn test_second_run_matches_recorded_baselines() {
    let cases = TestCaseMatrix::new(SOURCE_IMAGE).crop_cases();
    let server = correct_service(&cases).await;
    let dir = tempfile::tempdir().unwrap();
    let orchestrator = orchestrator(harness_config(&server.uri(), dir.path()));

    let first = orchestrator.run(&cases).await;
    assert!(first
        .iter()
        .all(|r| matches!(r.outcome, TestOutcome::Recorded { .. })));

    let second = orchestrator.run(&cases).await;
    assert!(second.iter().all(|r| r.outcome == TestOutcome::Pass));
}

#[tokio::test]
async fn test_crop_returning_aspect_fit_is_dimension_mismatch() {
    let request = TransformRequest::crop(SOURCE_IMAGE, px(123), px(300));
    let server = MockServer::start().await;
    // service ignored the height and kept the aspect ratio
    mount_image(&server, &request, png_card(123, 61)).await;

    let dir = tempfile::tempdir().unwrap();
    let reports = orchestrator(harness_config(&server.uri(), dir.path()))
        .run(std::slice::from_ref(&request))
        .await;

    match outcome_of(&reports, &request) {
        TestOutcome::DimensionMismatch { expected, actual } => {
            assert_eq!((expected.width, expected.height), (Some(123), Some(300)));
            assert_eq!((actual.width, actual.height), (123, 61));
        }
        other => panic!("expected dimension mismatch, got {other}"),
    }
    // a geometry failure never reaches the snapshot store
    assert!(!dir.path().join(format!("{}.snap", request.identity())).exists());
}

#[tokio::test]
async fn test_width_only_ignores_height() {
    let request = TransformRequest::width_only(SOURCE_IMAGE, px(300));
    let server = MockServer::start().await;
    mount_image(&server, &request, jpeg_card(300, 777)).await;

    let dir = tempfile::tempdir().unwrap();
    let reports = orchestrator(harness_config(&server.uri(), dir.path()))
        .run(std::slice::from_ref(&request))
        .await;

    assert!(matches!(
        outcome_of(&reports, &request),
        TestOutcome::Recorded { .. }
    ));
}

#[tokio::test]
async fn test_height_only_checks_height() {
    let request = TransformRequest::height_only(SOURCE_IMAGE, px(392));
    let server = MockServer::start().await;
    mount_image(&server, &request, png_card(784, 391)).await;

    let dir = tempfile::tempdir().unwrap();
    let reports = orchestrator(harness_config(&server.uri(), dir.path()))
        .run(std::slice::from_ref(&request))
        .await;

    assert!(matches!(
        outcome_of(&reports, &request),
        TestOutcome::DimensionMismatch { .. }
    ));
}

#[tokio::test]
async fn test_missing_resource_is_service_error() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let orchestrator = orchestrator(harness_config(&server.uri(), dir.path()));

    // as a dimension case, a 404 is a failure
    let request = TransformRequest::width_only(MISSING_RESOURCE, px(300));
    let reports = orchestrator.run(std::slice::from_ref(&request)).await;
    match outcome_of(&reports, &request) {
        TestOutcome::ServiceError { status, .. } => assert_eq!(*status, 404),
        other => panic!("expected service error, got {other}"),
    }

    // as an expected-refusal case, it passes
    let failures = TestCaseMatrix::new(SOURCE_IMAGE).failure_cases();
    let reports = orchestrator.run(&failures).await;
    assert_eq!(*outcome_of(&reports, &failures[0]), TestOutcome::Pass);
}

#[tokio::test]
async fn test_expected_refusal_that_succeeds_fails() {
    let failures = TestCaseMatrix::new(SOURCE_IMAGE).failure_cases();
    let server = MockServer::start().await;
    mount_image(&server, &failures[0], png_card(300, 150)).await;

    let dir = tempfile::tempdir().unwrap();
    let reports = orchestrator(harness_config(&server.uri(), dir.path()))
        .run(&failures)
        .await;

    assert_eq!(
        *outcome_of(&reports, &failures[0]),
        TestOutcome::UnexpectedSuccess { status: 200 }
    );
}

#[tokio::test]
async fn test_server_error_is_reported() {
    let request = TransformRequest::crop(SOURCE_IMAGE, px(402), px(392));
    let server = MockServer::start().await;
    mount_response(
        &server,
        &request,
        ResponseTemplate::new(500).set_body_string("boom"),
    )
    .await;

    let dir = tempfile::tempdir().unwrap();
    let reports = orchestrator(harness_config(&server.uri(), dir.path()))
        .run(std::slice::from_ref(&request))
        .await;

    assert_eq!(
        *outcome_of(&reports, &request),
        TestOutcome::ServiceError {
            status: 500,
            body: "boom".to_string()
        }
    );
}

#[tokio::test]
async fn test_non_image_body_is_malformed() {
    let request = TransformRequest::crop(SOURCE_IMAGE, px(402), px(392));
    let server = MockServer::start().await;
    mount_response(
        &server,
        &request,
        ResponseTemplate::new(200).set_body_string("<html>oops</html>"),
    )
    .await;

    let dir = tempfile::tempdir().unwrap();
    let reports = orchestrator(harness_config(&server.uri(), dir.path()))
        .run(std::slice::from_ref(&request))
        .await;

    assert!(matches!(
        outcome_of(&reports, &request),
        TestOutcome::MalformedImage { .. }
    ));
}

#[tokio::test]
async fn test_visual_regression_is_snapshot_mismatch() {
    let request = TransformRequest::crop(SOURCE_IMAGE, px(40), px(30));
    let dir = tempfile::tempdir().unwrap();

    let before = MockServer::start().await;
    mount_image(&before, &request, png_card(40, 30)).await;
    let reports = orchestrator(harness_config(&before.uri(), dir.path()))
        .run(std::slice::from_ref(&request))
        .await;
    assert!(outcome_of(&reports, &request).is_pass());

    let after = MockServer::start().await;
    mount_image(&after, &request, png_card_inverted(40, 30)).await;
    let reports = orchestrator(harness_config(&after.uri(), dir.path()))
        .run(std::slice::from_ref(&request))
        .await;

    match outcome_of(&reports, &request) {
        TestOutcome::SnapshotMismatch {
            baseline,
            received,
            diff,
            diff_ratio,
        } => {
            assert_eq!(std::fs::read(baseline).unwrap(), png_card(40, 30));
            assert_eq!(std::fs::read(received).unwrap(), png_card_inverted(40, 30));
            assert!(diff.as_ref().unwrap().exists());
            assert!(diff_ratio.unwrap() > 0.0);
        }
        other => panic!("expected snapshot mismatch, got {other}"),
    }
}

#[tokio::test]
async fn test_update_mode_accepts_new_output() {
    let request = TransformRequest::crop(SOURCE_IMAGE, px(40), px(30));
    let dir = tempfile::tempdir().unwrap();

    let before = MockServer::start().await;
    mount_image(&before, &request, png_card(40, 30)).await;
    orchestrator(harness_config(&before.uri(), dir.path()))
        .run(std::slice::from_ref(&request))
        .await;

    let after = MockServer::start().await;
    mount_image(&after, &request, png_card_inverted(40, 30)).await;
    let mut config = harness_config(&after.uri(), dir.path());
    config.update_snapshots = true;
    let reports = orchestrator(config)
        .run(std::slice::from_ref(&request))
        .await;

    assert!(matches!(
        outcome_of(&reports, &request),
        TestOutcome::Updated { .. }
    ));
    let stored = std::fs::read(dir.path().join(format!("{}.snap", request.identity()))).unwrap();
    assert_eq!(stored, png_card_inverted(40, 30));
}

#[tokio::test]
async fn test_timeout_fails_only_that_case() {
    let slow = TransformRequest::width_only(SOURCE_IMAGE, px(123));
    let fast = TransformRequest::width_only(SOURCE_IMAGE, px(300));
    let server = MockServer::start().await;
    slow_response(&server, &slow, Duration::from_secs(5)).await;
    mount_image(&server, &fast, png_card(300, 150)).await;

    let dir = tempfile::tempdir().unwrap();
    let mut config = harness_config(&server.uri(), dir.path());
    config.request_timeout_secs = 1;
    let cases = vec![slow.clone(), fast.clone()];
    let reports = orchestrator(config).run(&cases).await;

    match outcome_of(&reports, &slow) {
        TestOutcome::NetworkError { message } => assert!(message.contains("timed out"), "{message}"),
        other => panic!("expected network error, got {other}"),
    }
    assert!(outcome_of(&reports, &fast).is_pass());
}

#[tokio::test]
async fn test_reports_keep_case_order_under_concurrency() {
    let cases = TestCaseMatrix::new(SOURCE_IMAGE).proportional_cases();
    let server = correct_service(&cases).await;
    let dir = tempfile::tempdir().unwrap();
    let mut config = harness_config(&server.uri(), dir.path());
    config.concurrency = 8;

    let reports = orchestrator(config).run(&cases).await;

    let expected: Vec<String> = cases.iter().map(|c| c.identity()).collect();
    let actual: Vec<String> = reports.iter().map(|r| r.identity.clone()).collect();
    assert_eq!(actual, expected);
    assert!(reports
        .iter()
        .any(|r| r.suite == Suite::ResizeHeight));
}

#[tokio::test]
async fn test_summary_serializes_to_json() {
    let cases = TestCaseMatrix::new(SOURCE_IMAGE).failure_cases();
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();

    let summary = orchestrator(harness_config(&server.uri(), dir.path()))
        .run_summary(&cases)
        .await;
    let json = serde_json::to_value(&summary).unwrap();

    assert_eq!(json["passed"], 1);
    assert_eq!(json["cases"][0]["suite"], "missing_resource");
    assert_eq!(json["cases"][0]["outcome"]["kind"], "pass");
}
