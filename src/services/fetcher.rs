use reqwest::{Client, Url};
use std::time::Duration;

use crate::models::transform::TransformRequest;

/// Raw answer from the image service.
#[derive(Debug, Clone)]
pub struct FetchResult {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

/// HTTP client for the image transformation service.
pub struct ImageFetcher {
    http: Client,
}

impl ImageFetcher {
    /// Every request made through this fetcher is bounded by `timeout`,
    /// covering connect, headers and the full body.
    pub fn new(timeout: Duration) -> Result<Self, FetchError> {
        let http = Client::builder()
            .user_agent(concat!("imgprssr-e2e/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .map_err(FetchError::Network)?;

        Ok(Self { http })
    }

    /// Build `{base_url}/{resource_path}?width=..&height=..` for a request.
    pub fn request_url(base_url: &str, request: &TransformRequest) -> Result<Url, FetchError> {
        let raw = format!(
            "{}/{}",
            base_url.trim_end_matches('/'),
            request.resource_path.trim_start_matches('/')
        );
        let mut url = Url::parse(&raw).map_err(|e| FetchError::InvalidUrl(format!("{raw}: {e}")))?;

        let pairs = request.query_pairs();
        if !pairs.is_empty() {
            let mut query = url.query_pairs_mut();
            for (key, value) in pairs {
                query.append_pair(key, &value.to_string());
            }
        }
        Ok(url)
    }

    /// GET the transformed image and read the whole body.
    ///
    /// Non-success status codes are returned as [`FetchError::Service`] with
    /// whatever body the service sent, so callers can report it. A body that
    /// fails to arrive on an error response does not hide the status.
    pub async fn fetch(
        &self,
        base_url: &str,
        request: &TransformRequest,
    ) -> Result<FetchResult, FetchError> {
        let url = Self::request_url(base_url, request)?;
        tracing::debug!(url = %url, "Requesting transformed image");

        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(FetchError::Network)?;

        let status = response.status();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(FetchError::Service {
                status: status.as_u16(),
                body: body.chars().take(200).collect(),
            });
        }

        let body = response.bytes().await.map_err(FetchError::Network)?;
        Ok(FetchResult {
            status: status.as_u16(),
            content_type,
            body: body.to_vec(),
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("Invalid request URL {0}")]
    InvalidUrl(String),

    #[error("Request failed: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Service returned HTTP {status}: {body}")]
    Service { status: u16, body: String },
}

impl FetchError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, FetchError::Network(e) if e.is_timeout())
    }
}
