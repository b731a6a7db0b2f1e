//! Test helper utilities: a wiremock stand-in for the image service

#![allow(dead_code)]

use std::num::NonZeroU32;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use imgprssr_e2e::config::HarnessConfig;
use imgprssr_e2e::models::outcome::{CaseReport, TestOutcome};
use imgprssr_e2e::models::transform::{Expectation, TransformRequest};
use imgprssr_e2e::services::orchestrator::Orchestrator;
use wiremock::matchers::{method, path, query_param, query_param_is_missing};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::fixtures::{png_card, proportional_size, SOURCE_HEIGHT, SOURCE_WIDTH};

/// Harness config pointed at `base_url` with baselines under `snapshot_dir`.
pub fn harness_config(base_url: &str, snapshot_dir: &Path) -> HarnessConfig {
    HarnessConfig {
        base_url: base_url.to_string(),
        snapshot_dir: snapshot_dir.to_path_buf(),
        request_timeout_secs: 5,
        ..HarnessConfig::default()
    }
}

pub fn orchestrator(config: HarnessConfig) -> Orchestrator {
    Orchestrator::new(Arc::new(config)).expect("Failed to build orchestrator")
}

/// Serve `body` for exactly this resource and axis combination.
pub async fn mount_response(server: &MockServer, request: &TransformRequest, template: ResponseTemplate) {
    let mut mock = Mock::given(method("GET")).and(path(format!("/{}", request.resource_path)));

    mock = match request.width {
        Some(w) => mock.and(query_param("width", w.to_string())),
        None => mock.and(query_param_is_missing("width")),
    };
    mock = match request.height {
        Some(h) => mock.and(query_param("height", h.to_string())),
        None => mock.and(query_param_is_missing("height")),
    };

    mock.respond_with(template).mount(server).await;
}

pub async fn mount_image(server: &MockServer, request: &TransformRequest, body: Vec<u8>) {
    mount_response(
        server,
        request,
        ResponseTemplate::new(200).set_body_raw(body, "image/png"),
    )
    .await;
}

/// A stub that behaves like a correct service: exact boxes for crops,
/// aspect-preserving sizes for single-axis requests, 404 for anything unknown.
pub async fn correct_service(cases: &[TransformRequest]) -> MockServer {
    let server = MockServer::start().await;
    for case in cases {
        if case.expectation == Expectation::ServiceError {
            continue;
        }
        let (w, h) = stub_size(case);
        mount_image(&server, case, png_card(w, h)).await;
    }
    server
}

/// A stub that clamps oversized requests to the source size instead of
/// upscaling, like the service's default configuration.
pub async fn clamping_service(cases: &[TransformRequest]) -> MockServer {
    let server = MockServer::start().await;
    for case in cases {
        if case.expectation == Expectation::ServiceError {
            continue;
        }
        let (w, h) = if case.expectation == Expectation::Boundary {
            (SOURCE_WIDTH, SOURCE_HEIGHT)
        } else {
            stub_size(case)
        };
        mount_image(&server, case, png_card(w, h)).await;
    }
    if let Some(case) = cases.iter().find(|c| c.expectation == Expectation::Boundary) {
        mount_image(&server, &case.native(), png_card(SOURCE_WIDTH, SOURCE_HEIGHT)).await;
    }
    server
}

/// Geometry a correct service returns for `request`.
pub fn stub_size(request: &TransformRequest) -> (u32, u32) {
    proportional_size(
        request.width.map(NonZeroU32::get),
        request.height.map(NonZeroU32::get),
    )
}

/// Stub that answers after `delay`, for timeout tests.
pub async fn slow_response(server: &MockServer, request: &TransformRequest, delay: Duration) {
    let (w, h) = stub_size(request);
    mount_response(
        server,
        request,
        ResponseTemplate::new(200)
            .set_body_raw(png_card(w, h), "image/png")
            .set_delay(delay),
    )
    .await;
}

pub fn outcome_of<'a>(reports: &'a [CaseReport], request: &TransformRequest) -> &'a TestOutcome {
    let identity = request.identity();
    &reports
        .iter()
        .find(|r| r.identity == identity)
        .unwrap_or_else(|| panic!("No report for {identity}"))
        .outcome
}
