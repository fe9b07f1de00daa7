//! Records written to the analytics store.

use crate::currency::{CurrencyPair, DATE_FORMAT};
use crate::models::{RatePoint, RatesSnapshot, SeriesSnapshot};
use crate::network::UpstreamCall;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Kind of request the gateway served.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RequestKind {
    #[serde(rename = "getRate")]
    GetRate,
    #[serde(rename = "getCurrencies")]
    GetCurrencies,
    #[serde(rename = "historical")]
    Historical,
    #[serde(rename = "timeSeries")]
    TimeSeries,
    #[serde(rename = "convert")]
    Convert,
}

impl RequestKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestKind::GetRate => "getRate",
            RequestKind::GetCurrencies => "getCurrencies",
            RequestKind::Historical => "historical",
            RequestKind::TimeSeries => "timeSeries",
            RequestKind::Convert => "convert",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "getRate" => Some(RequestKind::GetRate),
            "getCurrencies" => Some(RequestKind::GetCurrencies),
            "historical" => Some(RequestKind::Historical),
            "timeSeries" => Some(RequestKind::TimeSeries),
            "convert" => Some(RequestKind::Convert),
            _ => None,
        }
    }
}

impl std::fmt::Display for RequestKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An incoming request to the gateway's API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientRequestRecord {
    pub endpoint: String,
    pub http_method: String,
    pub device_name: String,
    pub operating_system: String,
    pub ip_address: Option<String>,
    pub from_currency: Option<String>,
    pub to_currency: Option<String>,
    pub date: Option<String>,
    pub to_date: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

impl ClientRequestRecord {
    /// The requested pair, when both sides were supplied.
    pub fn pair(&self) -> Option<(&str, &str)> {
        match (&self.from_currency, &self.to_currency) {
            (Some(from), Some(to)) => Some((from.as_str(), to.as_str())),
            _ => None,
        }
    }
}

/// An outbound request to the upstream rates API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerRequestRecord {
    pub started_at: DateTime<Utc>,
    pub endpoint: String,
    pub http_method: String,
    pub to_date: Option<String>,
    pub from_currency: Option<String>,
    pub to_currency: Option<String>,
    pub upstream_url: String,
}

impl ServerRequestRecord {
    pub fn from_call(
        call: &UpstreamCall,
        pair: Option<&CurrencyPair>,
        to_date: Option<NaiveDate>,
    ) -> Self {
        Self {
            started_at: call.started_at,
            endpoint: call.endpoint.as_str().to_string(),
            http_method: "GET".to_string(),
            to_date: to_date.map(|d| d.format(DATE_FORMAT).to_string()),
            from_currency: pair.map(|p| p.from.to_string()),
            to_currency: pair.map(|p| p.to.to_string()),
            upstream_url: call.url.clone(),
        }
    }
}

/// Numbers describing a payload: how many rates it carried and their mean.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResponseSummary {
    pub number_of_values: usize,
    pub average_rate: Option<f64>,
    pub to_currencies: Vec<String>,
    pub values: Vec<f64>,
}

impl ResponseSummary {
    /// A single rate for one target currency.
    pub fn single_rate(currency: &str, rate: f64) -> Self {
        Self {
            number_of_values: 1,
            average_rate: Some(rate),
            to_currencies: vec![currency.to_string()],
            values: vec![rate],
        }
    }

    /// A list of currency codes; carries no rates.
    pub fn currency_list(codes: &[String]) -> Self {
        Self {
            number_of_values: 0,
            average_rate: None,
            to_currencies: codes.to_vec(),
            values: Vec::new(),
        }
    }

    /// A series of rates for one target currency.
    pub fn series(currency: &str, points: &[RatePoint]) -> Self {
        let values: Vec<f64> = points.iter().map(|p| p.rate).collect();
        Self {
            number_of_values: values.len(),
            average_rate: mean(&values),
            to_currencies: vec![currency.to_string()],
            values,
        }
    }

    /// Every rate of a snapshot.
    pub fn snapshot(snapshot: &RatesSnapshot) -> Self {
        Self::rates(&snapshot.rates)
    }

    /// Rates keyed by target currency.
    pub fn rates(rates: &BTreeMap<String, f64>) -> Self {
        let values: Vec<f64> = rates.values().copied().collect();
        Self {
            number_of_values: values.len(),
            average_rate: mean(&values),
            to_currencies: rates.keys().cloned().collect(),
            values,
        }
    }
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

/// A response received from the upstream rates API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerResponseRecord {
    pub response_time_ms: u64,
    pub status_code: u16,
    pub payload_size: usize,
    pub base: String,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    #[serde(flatten)]
    pub summary: ResponseSummary,
    pub recorded_at: DateTime<Utc>,
}

impl ServerResponseRecord {
    /// Record for a single-day snapshot. `start_date` is set for dated
    /// lookups and left empty for latest rates.
    pub fn from_snapshot(
        call: &UpstreamCall,
        snapshot: &RatesSnapshot,
        start_date: Option<NaiveDate>,
    ) -> Self {
        Self {
            response_time_ms: call.elapsed_ms,
            status_code: call.status,
            payload_size: call.payload_size,
            base: snapshot.base.clone(),
            start_date,
            end_date: Some(snapshot.date),
            summary: ResponseSummary::snapshot(snapshot),
            recorded_at: Utc::now(),
        }
    }

    /// Record for a series, summarized for `currency`.
    pub fn from_series(call: &UpstreamCall, series: &SeriesSnapshot, currency: &str) -> Self {
        let points = series.points_for(currency);
        Self {
            response_time_ms: call.elapsed_ms,
            status_code: call.status,
            payload_size: call.payload_size,
            base: series.base.clone(),
            start_date: Some(series.start_date),
            end_date: series.end_date.or_else(|| points.last().map(|p| p.date)),
            summary: ResponseSummary::series(currency, &points),
            recorded_at: Utc::now(),
        }
    }
}

/// A response the gateway sent to a client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceResponseRecord {
    pub response_time_ms: u64,
    pub status_code: u16,
    pub request_kind: RequestKind,
    #[serde(flatten)]
    pub summary: ResponseSummary,
    pub recorded_at: DateTime<Utc>,
}

/// A stored row with its database id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stored<T> {
    pub id: i64,
    #[serde(flatten)]
    pub record: T,
}

/// Request count for one device name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceCount {
    pub device_name: String,
    pub count: u64,
}

/// Request count for one conversion direction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PairCount {
    pub from_currency: String,
    pub to_currency: String,
    pub count: u64,
}

impl std::fmt::Display for PairCount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} to {}", self.from_currency, self.to_currency)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::UpstreamEndpoint;
    use std::collections::BTreeMap;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, d).unwrap()
    }

    fn call(endpoint: UpstreamEndpoint) -> UpstreamCall {
        UpstreamCall {
            endpoint,
            url: "http://rates.test/latest".into(),
            started_at: Utc::now(),
            elapsed_ms: 12,
            status: 200,
            payload_size: 64,
        }
    }

    #[test]
    fn test_request_kind_names() {
        for kind in [
            RequestKind::GetRate,
            RequestKind::GetCurrencies,
            RequestKind::Historical,
            RequestKind::TimeSeries,
            RequestKind::Convert,
        ] {
            assert_eq!(RequestKind::parse(kind.as_str()), Some(kind));
            let json = serde_json::to_string(&kind).unwrap();
            assert_eq!(json, format!("\"{}\"", kind.as_str()));
        }
        assert_eq!(RequestKind::parse("unknown"), None);
    }

    #[test]
    fn test_summaries() {
        let single = ResponseSummary::single_rate("USD", 1.08);
        assert_eq!(single.number_of_values, 1);
        assert_eq!(single.average_rate, Some(1.08));

        let list = ResponseSummary::currency_list(&["EUR".into(), "USD".into()]);
        assert_eq!(list.number_of_values, 0);
        assert_eq!(list.average_rate, None);
        assert_eq!(list.to_currencies.len(), 2);

        let points = [
            RatePoint { date: day(1), rate: 1.0 },
            RatePoint { date: day(2), rate: 2.0 },
        ];
        let series = ResponseSummary::series("USD", &points);
        assert_eq!(series.number_of_values, 2);
        assert_eq!(series.average_rate, Some(1.5));

        assert_eq!(ResponseSummary::series("USD", &[]).average_rate, None);
    }

    #[test]
    fn test_server_response_from_snapshot() {
        let snapshot = RatesSnapshot {
            amount: 1.0,
            base: "EUR".into(),
            date: day(8),
            rates: BTreeMap::from([("GBP".to_string(), 0.8), ("USD".to_string(), 1.2)]),
        };
        let record =
            ServerResponseRecord::from_snapshot(&call(UpstreamEndpoint::Latest), &snapshot, None);
        assert_eq!(record.base, "EUR");
        assert_eq!(record.end_date, Some(day(8)));
        assert_eq!(record.summary.number_of_values, 2);
        assert!((record.summary.average_rate.unwrap() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_server_request_from_call() {
        let pair = CurrencyPair::parse("EUR", "USD").unwrap();
        let record = ServerRequestRecord::from_call(
            &call(UpstreamEndpoint::TimeSeries),
            Some(&pair),
            Some(day(9)),
        );
        assert_eq!(record.endpoint, "time_series");
        assert_eq!(record.to_date.as_deref(), Some("2024-03-09"));
        assert_eq!(record.from_currency.as_deref(), Some("EUR"));
    }
}
