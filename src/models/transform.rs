use serde::{Deserialize, Serialize};
use std::fmt::Write;
use std::num::NonZeroU32;
use strum::{AsRefStr, Display, EnumString};

/// Non-zero pixel size, checked at compile time when used in a `const`.
pub const fn px(value: u32) -> NonZeroU32 {
    match NonZeroU32::new(value) {
        Some(v) => v,
        None => panic!("pixel sizes must be positive"),
    }
}

/// Group a generated case belongs to. Part of every case's snapshot identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Suite {
    /// Both axes requested; output must match the box exactly.
    Cropping,
    ResizeWidth,
    ResizeHeight,
    /// Requests larger than the source image.
    Boundary,
    MissingResource,
}

/// What a case asserts about the service's answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Expectation {
    /// Successful response whose requested axes match the probed image.
    Dimensions,
    /// Non-success status code. Nothing is probed or snapshotted.
    ServiceError,
    /// Request beyond the source size. The pinned axis must either match
    /// exactly (upscaled) or equal the source's native axis (clamped).
    Boundary,
}

/// How the service answered a request larger than its source image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum BoundaryPolicy {
    Upscale,
    Clamp,
}

/// Axes a case pins down. `None` leaves that axis to the service's aspect policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpectedDimensions {
    pub width: Option<u32>,
    pub height: Option<u32>,
}

impl ExpectedDimensions {
    /// True when every pinned axis equals the probed one.
    pub fn matches(&self, width: u32, height: u32) -> bool {
        self.width.map_or(true, |w| w == width) && self.height.map_or(true, |h| h == height)
    }
}

impl std::fmt::Display for ExpectedDimensions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (self.width, self.height) {
            (Some(w), Some(h)) => write!(f, "{w}x{h}"),
            (Some(w), None) => write!(f, "{w}x*"),
            (None, Some(h)) => write!(f, "*x{h}"),
            (None, None) => write!(f, "*x*"),
        }
    }
}

/// A single transformation the harness asks the service for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransformRequest {
    pub suite: Suite,
    pub resource_path: String,
    pub width: Option<NonZeroU32>,
    pub height: Option<NonZeroU32>,
    pub expectation: Expectation,
}

impl TransformRequest {
    pub fn crop(resource_path: &str, width: NonZeroU32, height: NonZeroU32) -> Self {
        Self::new(Suite::Cropping, resource_path, Some(width), Some(height))
    }

    pub fn width_only(resource_path: &str, width: NonZeroU32) -> Self {
        Self::new(Suite::ResizeWidth, resource_path, Some(width), None)
    }

    pub fn height_only(resource_path: &str, height: NonZeroU32) -> Self {
        Self::new(Suite::ResizeHeight, resource_path, None, Some(height))
    }

    pub fn new(
        suite: Suite,
        resource_path: &str,
        width: Option<NonZeroU32>,
        height: Option<NonZeroU32>,
    ) -> Self {
        Self {
            suite,
            resource_path: resource_path.trim_start_matches('/').to_string(),
            width,
            height,
            expectation: Expectation::Dimensions,
        }
    }

    pub fn expecting(mut self, expectation: Expectation) -> Self {
        self.expectation = expectation;
        self
    }

    /// The same resource with no resize parameters, served at its native size.
    pub fn native(&self) -> Self {
        Self::new(self.suite, &self.resource_path, None, None)
    }

    /// Query parameters to send. Absent axes are omitted, never sent empty.
    pub fn query_pairs(&self) -> Vec<(&'static str, u32)> {
        let mut pairs = Vec::with_capacity(2);
        if let Some(w) = self.width {
            pairs.push(("width", w.get()));
        }
        if let Some(h) = self.height {
            pairs.push(("height", h.get()));
        }
        pairs
    }

    pub fn expected_dimensions(&self) -> ExpectedDimensions {
        ExpectedDimensions {
            width: self.width.map(NonZeroU32::get),
            height: self.height.map(NonZeroU32::get),
        }
    }

    /// Stable key for this case's baseline, derived from suite, resource and axes.
    ///
    /// ASCII alphanumerics, `-` and `.` are kept; every other byte of the resource
    /// path becomes `_xx` (lowercase hex). The escape is injective, so distinct
    /// resources never share a baseline, and the result is a safe file name.
    pub fn identity(&self) -> String {
        let dims = match (self.width, self.height) {
            (Some(w), Some(h)) => format!("w{w}_h{h}"),
            (Some(w), None) => format!("w{w}"),
            (None, Some(h)) => format!("h{h}"),
            (None, None) => "original".to_string(),
        };
        let mut resource = String::with_capacity(self.resource_path.len());
        for b in self.resource_path.bytes() {
            if b.is_ascii_alphanumeric() || b == b'-' || b == b'.' {
                resource.push(char::from(b));
            } else {
                let _ = write!(resource, "_{b:02x}");
            }
        }
        format!("{}__{}__{}", self.suite, resource, dims)
    }

    /// Path and query as they appear on the wire, e.g. `test_card_sml.png?width=300`.
    pub fn describe(&self) -> String {
        let query: Vec<String> = self
            .query_pairs()
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect();
        if query.is_empty() {
            self.resource_path.clone()
        } else {
            format!("{}?{}", self.resource_path, query.join("&"))
        }
    }
}
