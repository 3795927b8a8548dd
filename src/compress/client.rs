//! HTTP client for the remote shrink service.

use std::path::Path;
use std::time::Duration;

use reqwest::Client;
use reqwest::header::{CACHE_CONTROL, CONTENT_TYPE, USER_AGENT};
use serde::Deserialize;
use tracing::{debug, instrument};

use super::error::CompressError;
use super::identity::{random_forwarded_for, random_user_agent};

/// Public shrink endpoint.
pub const DEFAULT_ENDPOINT: &str = "https://tinypng.com/backend/opt/shrink";

/// Connect timeout in seconds.
const CONNECT_TIMEOUT_SECS: u64 = 30;

/// Overall request timeout in seconds. Uploads are capped at ~5 MB, so two
/// minutes is generous.
const READ_TIMEOUT_SECS: u64 = 120;

/// Image metadata reported by the service for the uploaded file.
#[derive(Debug, Deserialize)]
struct InputInfo {
    size: u64,
}

/// Compressed result reported by the service.
#[derive(Debug, Deserialize)]
struct OutputInfo {
    size: u64,
    ratio: f64,
    url: String,
}

/// The service's JSON verdict: either a rejection with an error message or
/// a shrunk result with a download URL.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ShrinkResponse {
    Rejected {
        #[allow(dead_code)]
        error: String,
        message: String,
    },
    Shrunk {
        input: InputInfo,
        output: OutputInfo,
    },
}

/// Result of compressing one file.
#[derive(Debug, Clone, Copy)]
pub struct CompressOutcome {
    /// Size of the uploaded file in bytes.
    pub input_size: u64,
    /// Size of the compressed file in bytes.
    pub output_size: u64,
    /// Compressed/original size ratio reported by the service (0..=1).
    pub ratio: f64,
}

impl CompressOutcome {
    /// Percentage of the original size saved by compression.
    #[must_use]
    pub fn saved_percent(&self) -> f64 {
        (1.0 - self.ratio) * 100.0
    }
}

/// Client for the remote shrink service.
///
/// Designed to be created once and cloned into tasks; the underlying
/// reqwest client pools connections.
#[derive(Debug, Clone)]
pub struct CompressClient {
    http: Client,
    endpoint: String,
}

impl Default for CompressClient {
    fn default() -> Self {
        Self::new()
    }
}

impl CompressClient {
    /// Creates a client against the default endpoint.
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client builder fails to build with the static
    /// configuration. This should never happen in practice.
    #[must_use]
    pub fn new() -> Self {
        Self::with_endpoint(DEFAULT_ENDPOINT)
    }

    /// Creates a client against an explicit shrink endpoint.
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client builder fails to build with the static
    /// configuration. This should never happen in practice.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn with_endpoint(endpoint: impl Into<String>) -> Self {
        let http = Client::builder()
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .timeout(Duration::from_secs(READ_TIMEOUT_SECS))
            .build()
            .expect("failed to build HTTP client with static configuration");
        Self {
            http,
            endpoint: endpoint.into(),
        }
    }

    /// Returns the shrink endpoint this client posts to.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Compresses the file at `path` in place.
    ///
    /// Uploads the raw bytes, then downloads the compressed result from the
    /// URL the service hands back and overwrites the source file with it.
    ///
    /// # Errors
    ///
    /// Returns [`CompressError`] if the file cannot be read or written, the
    /// service is unreachable, answers with a non-success status, rejects
    /// the image, or returns a body that cannot be decoded.
    #[instrument(skip(self), fields(path = %path.display()))]
    pub async fn compress(&self, path: &Path) -> Result<CompressOutcome, CompressError> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| CompressError::io(path, e))?;

        debug!(size = bytes.len(), "uploading file");
        let response = self
            .http
            .post(&self.endpoint)
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .header(CACHE_CONTROL, "no-cache")
            .header(USER_AGENT, random_user_agent())
            .header("X-Forwarded-For", random_forwarded_for())
            .body(bytes)
            .send()
            .await
            .map_err(|e| CompressError::network(path, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(CompressError::http_status(path, status.as_u16()));
        }

        let verdict: ShrinkResponse = response
            .json()
            .await
            .map_err(|e| CompressError::decode(path, e))?;

        let (input, output) = match verdict {
            ShrinkResponse::Rejected { message, .. } => {
                return Err(CompressError::rejected(path, message));
            }
            ShrinkResponse::Shrunk { input, output } => (input, output),
        };

        debug!(
            input_size = input.size,
            output_size = output.size,
            ratio = output.ratio,
            url = %output.url,
            "downloading compressed result"
        );
        let compressed = self.fetch_output(path, &output.url).await?;
        tokio::fs::write(path, &compressed)
            .await
            .map_err(|e| CompressError::io(path, e))?;

        Ok(CompressOutcome {
            input_size: input.size,
            output_size: output.size,
            ratio: output.ratio,
        })
    }

    /// Downloads the compressed bytes from the service's result URL.
    async fn fetch_output(&self, path: &Path, url: &str) -> Result<Vec<u8>, CompressError> {
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| CompressError::network(path, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(CompressError::http_status(path, status.as_u16()));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| CompressError::network(path, e))?;
        Ok(bytes.to_vec())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_shrink_response_parses_success() {
        let json = r#"{
            "input": { "size": 887, "type": "image/png" },
            "output": {
                "size": 785, "type": "image/png", "width": 81, "height": 81,
                "ratio": 0.885,
                "url": "https://tinypng.com/web/output/abc123"
            }
        }"#;
        let verdict: ShrinkResponse = serde_json::from_str(json).unwrap();
        match verdict {
            ShrinkResponse::Shrunk { input, output } => {
                assert_eq!(input.size, 887);
                assert_eq!(output.size, 785);
                assert!((output.ratio - 0.885).abs() < f64::EPSILON);
                assert!(output.url.ends_with("abc123"));
            }
            ShrinkResponse::Rejected { .. } => panic!("expected Shrunk"),
        }
    }

    #[test]
    fn test_shrink_response_parses_rejection() {
        let json = r#"{"error":"Bad request","message":"Request is invalid"}"#;
        let verdict: ShrinkResponse = serde_json::from_str(json).unwrap();
        match verdict {
            ShrinkResponse::Rejected { message, .. } => {
                assert_eq!(message, "Request is invalid");
            }
            ShrinkResponse::Shrunk { .. } => panic!("expected Rejected"),
        }
    }

    #[test]
    fn test_outcome_saved_percent() {
        let outcome = CompressOutcome {
            input_size: 1000,
            output_size: 600,
            ratio: 0.6,
        };
        assert!((outcome.saved_percent() - 40.0).abs() < 1e-9);
    }

    #[test]
    fn test_client_default_endpoint() {
        let client = CompressClient::new();
        assert_eq!(client.endpoint(), DEFAULT_ENDPOINT);
    }
}
