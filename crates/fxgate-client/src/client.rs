//! HTTP client for the fxgate gateway.
//!
//! ## API Surface
//!
//! - `/api/latest`      - currency list, or the latest rate of a pair
//! - `/api/historical`  - rate on a date, or a time series ending at `toDate`
//! - `/api/convert`     - amount conversion at the latest or a historical rate

use chrono::NaiveDate;
use fxgate_core::config::NetworkConfig;
use fxgate_core::currency::DATE_FORMAT;
use fxgate_core::{Conversion, CurrencyPair, FxError, HistoricalRate, LatestRate, RatePoint, Result};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

/// Default gateway base URL.
pub const DEFAULT_GATEWAY_URL: &str = "http://127.0.0.1:8080";

/// Default request timeout.
pub const API_TIMEOUT: Duration = Duration::from_secs(30);

/// Error body returned by the gateway.
#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

/// Typed client for the gateway's REST API.
#[derive(Debug, Clone)]
pub struct GatewayClient {
    base_url: String,
    client: reqwest::Client,
    timeout: Duration,
}

impl GatewayClient {
    /// Create a client for `base_url`, or [`DEFAULT_GATEWAY_URL`] when `None`.
    pub fn new(base_url: Option<&str>) -> Result<Self> {
        Self::with_timeout(base_url, API_TIMEOUT)
    }

    /// Like [`GatewayClient::new`] with a custom per-request timeout.
    pub fn with_timeout(base_url: Option<&str>, timeout: Duration) -> Result<Self> {
        let base_url = base_url
            .unwrap_or(DEFAULT_GATEWAY_URL)
            .trim_end_matches('/')
            .to_string();

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(NetworkConfig::USER_AGENT)
            .build()?;

        Ok(Self {
            base_url,
            client,
            timeout,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// All currency codes the gateway knows, sorted.
    pub async fn currencies(&self) -> Result<Vec<String>> {
        self.get("/api/latest", &[]).await
    }

    /// Latest rate for `pair`.
    pub async fn latest_rate(&self, pair: &CurrencyPair) -> Result<LatestRate> {
        self.get("/api/latest", &pair_query(pair)).await
    }

    /// Rate for `pair` on `date`. The returned date is the publication date
    /// actually used, which may precede `date` on weekends and holidays.
    pub async fn historical_rate(&self, date: NaiveDate, pair: &CurrencyPair) -> Result<HistoricalRate> {
        let mut query = pair_query(pair);
        query.push(("date", date.format(DATE_FORMAT).to_string()));
        self.get("/api/historical", &query).await
    }

    /// Daily rates for `pair` up to `to_date`. The gateway picks the start.
    pub async fn time_series(&self, to_date: NaiveDate, pair: &CurrencyPair) -> Result<Vec<RatePoint>> {
        let mut query = pair_query(pair);
        query.push(("toDate", to_date.format(DATE_FORMAT).to_string()));
        self.get("/api/historical", &query).await
    }

    /// Convert `amount` at the latest rate, or at the rate of `date`.
    pub async fn convert(
        &self,
        pair: &CurrencyPair,
        amount: f64,
        date: Option<NaiveDate>,
    ) -> Result<Conversion> {
        let mut query = pair_query(pair);
        query.push(("amount", amount.to_string()));
        if let Some(date) = date {
            query.push(("date", date.format(DATE_FORMAT).to_string()));
        }
        self.get("/api/convert", &query).await
    }

    async fn get<T: DeserializeOwned>(&self, path: &str, query: &[(&str, String)]) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);
        debug!("GET {} {:?}", url, query);

        let response = self
            .client
            .get(&url)
            .query(query)
            .send()
            .await
            .map_err(|e| self.request_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorBody>(&body)
                .map(|b| b.error)
                .unwrap_or(body);
            return Err(FxError::Upstream {
                status: status.as_u16(),
                message,
            });
        }

        response.json().await.map_err(|e| self.request_error(e))
    }

    fn request_error(&self, err: reqwest::Error) -> FxError {
        if err.is_timeout() {
            FxError::Timeout(self.timeout)
        } else {
            FxError::from(err)
        }
    }
}

fn pair_query(pair: &CurrencyPair) -> Vec<(&'static str, String)> {
    vec![("from", pair.from.to_string()), ("to", pair.to.to_string())]
}
