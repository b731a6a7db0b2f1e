//! Static table of cases exercised against the service.
//!
//! The tables are plain constants, so generation is pure and every run yields
//! the same cases in the same order. Baseline identities depend on that.

use std::num::NonZeroU32;

use crate::models::transform::{px, Expectation, Suite, TransformRequest};

/// Exact-box requests: the response must be exactly `width x height`.
pub const CROP_SIZES: &[(NonZeroU32, NonZeroU32)] = &[
    (px(123), px(300)),
    (px(402), px(392)),
    (px(1000), px(600)),
    (px(123), px(560)),
];

/// Single-axis requests, each sent once as a width and once as a height.
pub const RESIZE_SIZES: &[NonZeroU32] = &[px(123), px(300), px(402), px(392)];

/// Beyond the native size of the stock test card. The service may either
/// upscale or clamp to the native size; both pass, and the report says which.
pub const BOUNDARY_SIZES: &[NonZeroU32] = &[px(2400)];

pub const MISSING_RESOURCE: &str = "does_not_exist.png";

/// Case generator for one source image.
#[derive(Debug, Clone)]
pub struct TestCaseMatrix {
    resource_path: String,
}

impl TestCaseMatrix {
    pub fn new(resource_path: impl Into<String>) -> Self {
        Self {
            resource_path: resource_path.into(),
        }
    }

    /// Every case, in a fixed order: crops, width-only, height-only, boundary, failures.
    pub fn generate(&self) -> Vec<TransformRequest> {
        let mut cases = self.crop_cases();
        cases.extend(self.proportional_cases());
        cases.extend(self.boundary_cases());
        cases.extend(self.failure_cases());
        cases
    }

    pub fn crop_cases(&self) -> Vec<TransformRequest> {
        CROP_SIZES
            .iter()
            .map(|&(w, h)| TransformRequest::crop(&self.resource_path, w, h))
            .collect()
    }

    pub fn proportional_cases(&self) -> Vec<TransformRequest> {
        let widths = RESIZE_SIZES
            .iter()
            .map(|&w| TransformRequest::width_only(&self.resource_path, w));
        let heights = RESIZE_SIZES
            .iter()
            .map(|&h| TransformRequest::height_only(&self.resource_path, h));
        widths.chain(heights).collect()
    }

    pub fn boundary_cases(&self) -> Vec<TransformRequest> {
        BOUNDARY_SIZES
            .iter()
            .flat_map(|&size| {
                [
                    TransformRequest::new(Suite::Boundary, &self.resource_path, Some(size), None),
                    TransformRequest::new(Suite::Boundary, &self.resource_path, None, Some(size)),
                ]
                .map(|case| case.expecting(Expectation::Boundary))
            })
            .collect()
    }

    /// Requests the service must refuse with a 4xx/5xx status.
    pub fn failure_cases(&self) -> Vec<TransformRequest> {
        vec![
            TransformRequest::new(Suite::MissingResource, MISSING_RESOURCE, Some(px(300)), None)
                .expecting(Expectation::ServiceError),
        ]
    }
}

/// Keep only cases whose identity contains `pattern`.
pub fn filter_cases(cases: Vec<TransformRequest>, pattern: Option<&str>) -> Vec<TransformRequest> {
    match pattern {
        Some(p) => cases.into_iter().filter(|c| c.identity().contains(p)).collect(),
        None => cases,
    }
}
