//! Data types shared between the upstream client, the service and the
//! gateway's JSON responses.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Rates for a single day as published upstream
/// (`/latest` and `/{date}` endpoints).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatesSnapshot {
    #[serde(default = "default_amount")]
    pub amount: f64,
    pub base: String,
    pub date: NaiveDate,
    pub rates: BTreeMap<String, f64>,
}

/// Rates for a date range as published upstream (`/{start}..{end}`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesSnapshot {
    #[serde(default = "default_amount")]
    pub amount: f64,
    pub base: String,
    pub start_date: NaiveDate,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
    pub rates: BTreeMap<NaiveDate, BTreeMap<String, f64>>,
}

fn default_amount() -> f64 {
    1.0
}

impl RatesSnapshot {
    /// Rate of `currency` against the snapshot's base.
    pub fn rate_for(&self, currency: &str) -> Option<f64> {
        self.rates.get(currency).copied()
    }
}

impl SeriesSnapshot {
    /// Points for `currency`, ordered by date. Days without a rate for
    /// the currency are skipped.
    pub fn points_for(&self, currency: &str) -> Vec<RatePoint> {
        self.rates
            .iter()
            .filter_map(|(date, rates)| {
                rates.get(currency).map(|rate| RatePoint {
                    date: *date,
                    rate: *rate,
                })
            })
            .collect()
    }
}

/// Response of `GET /api/latest?from&to`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LatestRate {
    pub base: String,
    pub date: NaiveDate,
    pub rates: BTreeMap<String, f64>,
}

impl LatestRate {
    /// The single requested rate, if present.
    pub fn rate_for(&self, currency: &str) -> Option<f64> {
        self.rates.get(currency).copied()
    }
}

/// Response of `GET /api/historical?date&from&to`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HistoricalRate {
    pub date: NaiveDate,
    pub rate: f64,
}

/// One day of a time series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RatePoint {
    pub date: NaiveDate,
    pub rate: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_latest_payload() {
        let body = r#"{"amount":1.0,"base":"EUR","date":"2024-05-10","rates":{"GBP":0.86,"USD":1.0783}}"#;
        let snapshot: RatesSnapshot = serde_json::from_str(body).unwrap();
        assert_eq!(snapshot.base, "EUR");
        assert_eq!(snapshot.rate_for("USD"), Some(1.0783));
        assert_eq!(snapshot.rate_for("JPY"), None);
    }

    #[test]
    fn test_series_points_are_ordered_and_sparse() {
        let body = r#"{
            "amount": 1.0, "base": "EUR",
            "start_date": "2024-01-02", "end_date": "2024-01-05",
            "rates": {
                "2024-01-05": {"USD": 1.094},
                "2024-01-02": {"USD": 1.0956},
                "2024-01-03": {"GBP": 0.86}
            }
        }"#;
        let series: SeriesSnapshot = serde_json::from_str(body).unwrap();
        let points = series.points_for("USD");
        assert_eq!(points.len(), 2);
        assert_eq!(points[0].date.to_string(), "2024-01-02");
        assert_eq!(points[1].rate, 1.094);
    }
}
