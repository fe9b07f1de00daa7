//! TTL caches for rate snapshots and series.

use crate::config::CacheConfig;
use crate::currency::{CurrencyPair, DateRange};
use crate::models::{RatesSnapshot, SeriesSnapshot};
use chrono::NaiveDate;
use mini_moka::sync::Cache;
use std::time::Duration;
use tracing::debug;

/// What a cached payload answers.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RateKey {
    /// All latest rates.
    LatestAll,
    /// Latest rate for one pair.
    LatestPair(CurrencyPair),
    /// Rate for one pair on a date.
    OnDate(NaiveDate, CurrencyPair),
    /// Series for one pair.
    Series(DateRange, CurrencyPair),
}

impl RateKey {
    /// Whether the payload can no longer change, given today's date.
    fn is_settled(&self, today: NaiveDate) -> bool {
        match self {
            RateKey::LatestAll | RateKey::LatestPair(_) => false,
            RateKey::OnDate(date, _) => *date < today,
            RateKey::Series(range, _) => range.end < today,
        }
    }
}

/// Two-tier TTL cache for upstream payloads.
pub struct RatesCache {
    fresh: Cache<RateKey, RatesSnapshot>,
    settled: Cache<RateKey, RatesSnapshot>,
    fresh_series: Cache<RateKey, SeriesSnapshot>,
    settled_series: Cache<RateKey, SeriesSnapshot>,
}

impl RatesCache {
    pub fn new(fresh_ttl: Duration, settled_ttl: Duration) -> Self {
        Self {
            fresh: build(fresh_ttl),
            settled: build(settled_ttl),
            fresh_series: build(fresh_ttl),
            settled_series: build(settled_ttl),
        }
    }

    pub fn get_snapshot(&self, key: &RateKey, today: NaiveDate) -> Option<RatesSnapshot> {
        let hit = if key.is_settled(today) {
            self.settled.get(key)
        } else {
            self.fresh.get(key)
        };
        if hit.is_some() {
            debug!("Rate cache hit for {:?}", key);
        }
        hit
    }

    pub fn put_snapshot(&self, key: RateKey, snapshot: RatesSnapshot, today: NaiveDate) {
        if key.is_settled(today) {
            self.settled.insert(key, snapshot);
        } else {
            self.fresh.insert(key, snapshot);
        }
    }

    pub fn get_series(&self, key: &RateKey, today: NaiveDate) -> Option<SeriesSnapshot> {
        let hit = if key.is_settled(today) {
            self.settled_series.get(key)
        } else {
            self.fresh_series.get(key)
        };
        if hit.is_some() {
            debug!("Series cache hit for {:?}", key);
        }
        hit
    }

    pub fn put_series(&self, key: RateKey, series: SeriesSnapshot, today: NaiveDate) {
        if key.is_settled(today) {
            self.settled_series.insert(key, series);
        } else {
            self.fresh_series.insert(key, series);
        }
    }
}

fn build<V: Clone + Send + Sync + 'static>(ttl: Duration) -> Cache<RateKey, V> {
    Cache::builder()
        .time_to_live(ttl)
        .max_capacity(CacheConfig::MAX_ENTRIES)
        .build()
}

impl Default for RatesCache {
    fn default() -> Self {
        Self::new(CacheConfig::LATEST_TTL, CacheConfig::HISTORICAL_TTL)
    }
}
