//! `RatesService`: the facade the gateway and tests talk to.
//!
//! Ties the upstream provider, the rate cache and the analytics recorder
//! together. Every upstream call that actually goes out is recorded as a
//! server request and response pair; cache hits are not.

use crate::analytics::{
    AnalyticsRecorder, AnalyticsStore, ClientRequestRecord, DashboardReport, RequestKind,
    ResponseSummary, ServerRequestRecord, ServerResponseRecord, ServiceResponseRecord,
};
use crate::cache::{RateKey, RatesCache};
use crate::config::{DashboardConfig, ServiceConfig};
use crate::conversion::{self, Conversion};
use crate::currency::{today_utc, CurrencyPair, DateRange};
use crate::error::{FxError, Result};
use crate::models::{HistoricalRate, LatestRate, RatePoint, RatesSnapshot, SeriesSnapshot};
use crate::network::{FrankfurterClient, RatesProvider, UpstreamCall};
use chrono::{NaiveDate, Utc};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

struct ServiceInner {
    provider: Arc<dyn RatesProvider>,
    cache: RatesCache,
    store: AnalyticsStore,
    recorder: AnalyticsRecorder,
}

/// Exchange-rate service with caching and analytics. Cheap to clone.
#[derive(Clone)]
pub struct RatesService {
    inner: Arc<ServiceInner>,
}

impl RatesService {
    /// Build the service against the configured upstream and database.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(config: &ServiceConfig) -> Result<Self> {
        config.validate()?;
        let provider = FrankfurterClient::new(config)?;
        let store = match &config.database_path {
            Some(path) => AnalyticsStore::open(path)?,
            None => AnalyticsStore::in_memory()?,
        };
        info!(
            "Rates service using upstream {} (analytics: {})",
            provider.base_url(),
            config
                .database_path
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "in-memory".to_string())
        );
        Ok(Self::with_parts(
            Arc::new(provider),
            RatesCache::new(config.latest_ttl, config.historical_ttl),
            store,
        ))
    }

    /// Build the service from explicit parts.
    ///
    /// Must be called from within a tokio runtime.
    pub fn with_parts(
        provider: Arc<dyn RatesProvider>,
        cache: RatesCache,
        store: AnalyticsStore,
    ) -> Self {
        let recorder = AnalyticsRecorder::spawn(store.clone());
        Self {
            inner: Arc::new(ServiceInner {
                provider,
                cache,
                store,
                recorder,
            }),
        }
    }

    pub fn store(&self) -> &AnalyticsStore {
        &self.inner.store
    }

    pub fn recorder(&self) -> &AnalyticsRecorder {
        &self.inner.recorder
    }

    // ========================================
    // Rates
    // ========================================

    /// Every known currency code, sorted, including the base currency.
    pub async fn currencies(&self) -> Result<Vec<String>> {
        let snapshot = self.latest_snapshot().await?;
        let mut codes: Vec<String> = snapshot.rates.keys().cloned().collect();
        if !codes.contains(&snapshot.base) {
            codes.push(snapshot.base.clone());
        }
        codes.sort();
        Ok(codes)
    }

    /// Latest rate for one pair.
    pub async fn latest_rate(&self, pair: &CurrencyPair) -> Result<LatestRate> {
        let today = today_utc();
        let key = RateKey::LatestPair(pair.clone());
        let snapshot = match self.inner.cache.get_snapshot(&key, today) {
            Some(hit) => hit,
            None => {
                let exchange = self.inner.provider.latest_pair(pair).await?;
                self.record_snapshot_call(&exchange.call, &exchange.value, Some(pair), None);
                self.inner.cache.put_snapshot(key, exchange.value.clone(), today);
                exchange.value
            }
        };

        let rate = required_rate(&snapshot, pair)?;
        Ok(LatestRate {
            base: snapshot.base,
            date: snapshot.date,
            rates: BTreeMap::from([(pair.to.to_string(), rate)]),
        })
    }

    /// Rate for one pair on `date`. Upstream answers non-trading days with
    /// the closest earlier trading day; the returned date is that day.
    pub async fn historical_rate(&self, date: NaiveDate, pair: &CurrencyPair) -> Result<HistoricalRate> {
        let today = today_utc();
        let key = RateKey::OnDate(date, pair.clone());
        let snapshot = match self.inner.cache.get_snapshot(&key, today) {
            Some(hit) => hit,
            None => {
                let exchange = self.inner.provider.on_date(date, pair).await?;
                self.record_snapshot_call(&exchange.call, &exchange.value, Some(pair), Some(date));
                self.inner.cache.put_snapshot(key, exchange.value.clone(), today);
                exchange.value
            }
        };

        Ok(HistoricalRate {
            date: snapshot.date,
            rate: required_rate(&snapshot, pair)?,
        })
    }

    /// Daily rates for one pair over `range`, ordered by date.
    pub async fn time_series(&self, range: DateRange, pair: &CurrencyPair) -> Result<Vec<RatePoint>> {
        let today = today_utc();
        let key = RateKey::Series(range, pair.clone());
        let series = match self.inner.cache.get_series(&key, today) {
            Some(hit) => hit,
            None => {
                let exchange = self.inner.provider.series(range, pair).await?;
                self.record_series_call(&exchange.call, &exchange.value, pair, range.end);
                self.inner.cache.put_series(key, exchange.value.clone(), today);
                exchange.value
            }
        };

        let points = series.points_for(pair.to.as_str());
        debug!("Series {} has {} points", pair, points.len());
        Ok(points)
    }

    /// Convert `amount` at the latest rate, or at the rate on `date`.
    pub async fn convert(
        &self,
        pair: &CurrencyPair,
        amount: f64,
        date: Option<NaiveDate>,
    ) -> Result<Conversion> {
        let (rate, rate_date) = match date {
            Some(date) => {
                let historical = self.historical_rate(date, pair).await?;
                (historical.rate, historical.date)
            }
            None => {
                let latest = self.latest_rate(pair).await?;
                let rate = latest.rate_for(pair.to.as_str()).ok_or_else(|| FxError::MissingRate {
                    currency: pair.to.to_string(),
                })?;
                (rate, latest.date)
            }
        };
        conversion::convert(pair, amount, rate, rate_date)
    }

    async fn latest_snapshot(&self) -> Result<RatesSnapshot> {
        let today = today_utc();
        if let Some(hit) = self.inner.cache.get_snapshot(&RateKey::LatestAll, today) {
            return Ok(hit);
        }
        let exchange = self.inner.provider.latest().await?;
        self.record_snapshot_call(&exchange.call, &exchange.value, None, None);
        self.inner
            .cache
            .put_snapshot(RateKey::LatestAll, exchange.value.clone(), today);
        Ok(exchange.value)
    }

    // ========================================
    // Analytics
    // ========================================

    fn record_snapshot_call(
        &self,
        call: &UpstreamCall,
        snapshot: &RatesSnapshot,
        pair: Option<&CurrencyPair>,
        date: Option<NaiveDate>,
    ) {
        self.inner.recorder.upstream(
            ServerRequestRecord::from_call(call, pair, date),
            ServerResponseRecord::from_snapshot(call, snapshot, date),
        );
    }

    fn record_series_call(
        &self,
        call: &UpstreamCall,
        series: &SeriesSnapshot,
        pair: &CurrencyPair,
        to_date: NaiveDate,
    ) {
        self.inner.recorder.upstream(
            ServerRequestRecord::from_call(call, Some(pair), Some(to_date)),
            ServerResponseRecord::from_series(call, series, pair.to.as_str()),
        );
    }

    /// Queue an incoming client request.
    pub fn record_client_request(&self, record: ClientRequestRecord) {
        self.inner.recorder.client_request(record);
    }

    /// Queue a response sent by the gateway.
    pub fn record_service_response(
        &self,
        kind: RequestKind,
        elapsed: Duration,
        status_code: u16,
        summary: ResponseSummary,
    ) {
        self.inner.recorder.service_response(ServiceResponseRecord {
            response_time_ms: elapsed.as_millis() as u64,
            status_code,
            request_kind: kind,
            summary,
            recorded_at: Utc::now(),
        });
    }

    /// Wait for queued analytics records to reach the database.
    pub async fn flush_analytics(&self) {
        self.inner.recorder.flush().await;
    }

    /// Dashboard data, bounded to the most recent rows.
    pub async fn dashboard(&self) -> Result<DashboardReport> {
        let store = self.inner.store.clone();
        let upstream = self.inner.provider.breaker_stats();
        tokio::task::spawn_blocking(move || {
            DashboardReport::load(&store, DashboardConfig::RECENT_ROWS, upstream)
        })
        .await
        .map_err(|e| FxError::Other(format!("Dashboard query task failed: {}", e)))?
    }
}

fn required_rate(snapshot: &RatesSnapshot, pair: &CurrencyPair) -> Result<f64> {
    snapshot
        .rate_for(pair.to.as_str())
        .ok_or_else(|| FxError::MissingRate {
            currency: pair.to.to_string(),
        })
}
