//! Client for Frankfurter-compatible exchange-rate APIs.
//!
//! Endpoints used:
//! - `GET /latest` and `GET /latest?from=X&to=Y`
//! - `GET /{date}?from=X&to=Y`
//! - `GET /{start}..{end}?from=X&to=Y`
//!
//! Every call goes through the circuit breaker and the retry policy, and
//! returns the parsed payload together with an [`UpstreamCall`] describing
//! the exchange for analytics.

use crate::config::ServiceConfig;
use crate::currency::{CurrencyPair, DateRange, DATE_FORMAT};
use crate::error::{FxError, Result};
use crate::models::{RatesSnapshot, SeriesSnapshot};
use crate::network::circuit_breaker::{CircuitBreaker, CircuitBreakerStats};
use crate::network::client::{extract_domain, HttpClient};
use crate::network::retry::{retry_async, RetryPolicy};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Which upstream endpoint a call hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpstreamEndpoint {
    Latest,
    Historical,
    TimeSeries,
}

impl UpstreamEndpoint {
    pub fn as_str(&self) -> &'static str {
        match self {
            UpstreamEndpoint::Latest => "latest",
            UpstreamEndpoint::Historical => "historical",
            UpstreamEndpoint::TimeSeries => "time_series",
        }
    }
}

impl std::fmt::Display for UpstreamEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Timing and size of one successful upstream request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpstreamCall {
    pub endpoint: UpstreamEndpoint,
    pub url: String,
    pub started_at: DateTime<Utc>,
    pub elapsed_ms: u64,
    pub status: u16,
    pub payload_size: usize,
}

/// A parsed upstream payload with its call metadata.
#[derive(Debug, Clone)]
pub struct Exchange<T> {
    pub value: T,
    pub call: UpstreamCall,
}

/// Source of exchange rates.
#[async_trait]
pub trait RatesProvider: Send + Sync {
    /// All latest rates against the provider's default base.
    async fn latest(&self) -> Result<Exchange<RatesSnapshot>>;

    /// Latest rate for one pair.
    async fn latest_pair(&self, pair: &CurrencyPair) -> Result<Exchange<RatesSnapshot>>;

    /// Rate for one pair on a given date.
    async fn on_date(&self, date: NaiveDate, pair: &CurrencyPair)
        -> Result<Exchange<RatesSnapshot>>;

    /// Daily rates for one pair over a date range.
    async fn series(&self, range: DateRange, pair: &CurrencyPair)
        -> Result<Exchange<SeriesSnapshot>>;

    /// Circuit breaker state, if the provider has one.
    fn breaker_stats(&self) -> Option<CircuitBreakerStats> {
        None
    }
}

/// [`RatesProvider`] backed by a Frankfurter-compatible HTTP API.
pub struct FrankfurterClient {
    base_url: String,
    http: HttpClient,
    retry: RetryPolicy,
    breaker: CircuitBreaker,
}

impl FrankfurterClient {
    /// Build a client from service configuration.
    pub fn new(config: &ServiceConfig) -> Result<Self> {
        let http = HttpClient::with_timeout(config.request_timeout)?;
        let retry = RetryPolicy::default().with_max_attempts(config.max_attempts);
        let breaker = CircuitBreaker::new(extract_domain(&config.upstream_url));
        Ok(Self::with_parts(&config.upstream_url, http, retry, breaker))
    }

    /// Build a client from explicit parts.
    pub fn with_parts(
        base_url: &str,
        http: HttpClient,
        retry: RetryPolicy,
        breaker: CircuitBreaker,
    ) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
            retry,
            breaker,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str, pair: Option<&CurrencyPair>) -> String {
        match pair {
            Some(pair) => format!(
                "{}/{}?from={}&to={}",
                self.base_url,
                path,
                pair.from,
                pair.to
            ),
            None => format!("{}/{}", self.base_url, path),
        }
    }

    async fn fetch<T: DeserializeOwned>(
        &self,
        endpoint: UpstreamEndpoint,
        url: String,
    ) -> Result<Exchange<T>> {
        let permit = self.breaker.check()?;

        let started_at = Utc::now();
        let outcome = retry_async(&self.retry, endpoint.as_str(), || self.http.get_text(&url)).await;
        permit.record(&outcome);
        let fetched = outcome?;

        let value: T = serde_json::from_str(&fetched.body).map_err(|e| FxError::Upstream {
            status: fetched.status.as_u16(),
            message: format!("Malformed {} payload: {}", endpoint, e),
        })?;

        debug!("Upstream {} answered in {:?}", endpoint, fetched.elapsed);
        Ok(Exchange {
            value,
            call: UpstreamCall {
                endpoint,
                url,
                started_at,
                elapsed_ms: fetched.elapsed.as_millis() as u64,
                status: fetched.status.as_u16(),
                payload_size: fetched.payload_size(),
            },
        })
    }
}

#[async_trait]
impl RatesProvider for FrankfurterClient {
    async fn latest(&self) -> Result<Exchange<RatesSnapshot>> {
        let url = self.url("latest", None);
        self.fetch(UpstreamEndpoint::Latest, url).await
    }

    async fn latest_pair(&self, pair: &CurrencyPair) -> Result<Exchange<RatesSnapshot>> {
        let url = self.url("latest", Some(pair));
        self.fetch(UpstreamEndpoint::Latest, url).await
    }

    async fn on_date(
        &self,
        date: NaiveDate,
        pair: &CurrencyPair,
    ) -> Result<Exchange<RatesSnapshot>> {
        let url = self.url(&date.format(DATE_FORMAT).to_string(), Some(pair));
        self.fetch(UpstreamEndpoint::Historical, url).await
    }

    async fn series(
        &self,
        range: DateRange,
        pair: &CurrencyPair,
    ) -> Result<Exchange<SeriesSnapshot>> {
        let url = self.url(&range.path_segment(), Some(pair));
        self.fetch(UpstreamEndpoint::TimeSeries, url).await
    }

    fn breaker_stats(&self) -> Option<CircuitBreakerStats> {
        Some(self.breaker.stats())
    }
}
