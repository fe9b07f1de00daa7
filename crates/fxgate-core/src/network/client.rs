//! HTTP client used for upstream rate lookups.
//!
//! Wraps reqwest with:
//! - A shared connection pool and default timeouts
//! - Elapsed-time and payload-size measurement for analytics
//! - Translation of 429 and other non-success statuses into [`FxError`]

use crate::config::NetworkConfig;
use crate::{FxError, Result};
use reqwest::{header, Client, StatusCode};
use std::time::{Duration, Instant};
use tracing::debug;

/// Longest upstream error body quoted in an error message.
const ERROR_BODY_PREVIEW: usize = 200;

/// A successful response body with timing information.
#[derive(Debug, Clone)]
pub struct FetchedBody {
    pub status: StatusCode,
    pub body: String,
    pub elapsed: Duration,
}

impl FetchedBody {
    /// Payload size in bytes.
    pub fn payload_size(&self) -> usize {
        self.body.len()
    }
}

/// HTTP client for the upstream rates API.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
    default_timeout: Duration,
}

impl HttpClient {
    /// Create a new HTTP client with a custom default timeout.
    pub fn with_timeout(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(NetworkConfig::CONNECT_TIMEOUT.min(timeout))
            .user_agent(NetworkConfig::USER_AGENT)
            .build()
            .map_err(|e| FxError::Network {
                message: format!("Failed to create HTTP client: {}", e),
                cause: None,
            })?;

        Ok(Self {
            client,
            default_timeout: timeout,
        })
    }

    /// GET `url` and return the body on success.
    pub async fn get_text(&self, url: &str) -> Result<FetchedBody> {
        debug!("GET {}", url);
        let started = Instant::now();

        let response = self
            .client
            .get(url)
            .header(header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    FxError::Timeout(self.default_timeout)
                } else {
                    FxError::Network {
                        message: format!("GET {} failed: {}", url, e),
                        cause: Some(e.to_string()),
                    }
                }
            })?;

        let status = response.status();

        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get(header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok());

            return Err(FxError::RateLimited {
                service: extract_domain(url),
                retry_after_secs: retry_after,
            });
        }

        let body = response.text().await.map_err(|e| {
            if e.is_timeout() {
                FxError::Timeout(self.default_timeout)
            } else {
                FxError::Network {
                    message: format!("Failed to read body from {}: {}", url, e),
                    cause: Some(e.to_string()),
                }
            }
        })?;
        let elapsed = started.elapsed();

        if !status.is_success() {
            return Err(FxError::Upstream {
                status: status.as_u16(),
                message: upstream_message(&body),
            });
        }

        debug!("GET {} -> {} in {:?} ({} bytes)", url, status, elapsed, body.len());
        Ok(FetchedBody {
            status,
            body,
            elapsed,
        })
    }
}

/// Pull a human-readable message out of an upstream error body.
///
/// Frankfurter answers errors with `{"message": "..."}`; anything else is
/// quoted verbatim, truncated.
fn upstream_message(body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(body) {
        if let Some(message) = value.get("message").and_then(|m| m.as_str()) {
            return message.to_string();
        }
    }
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return "empty response body".to_string();
    }
    trimmed.chars().take(ERROR_BODY_PREVIEW).collect()
}

/// Extract domain from a URL.
pub fn extract_domain(url: &str) -> String {
    url::Url::parse(url)
        .map(|u| u.host_str().unwrap_or("unknown").to_string())
        .unwrap_or_else(|_| "unknown".to_string())
}
