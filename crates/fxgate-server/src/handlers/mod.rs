//! HTTP handlers, split by concern.

mod analytics;
mod dashboard;
mod error;
mod rates;

use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;

pub use analytics::record_client_request;
pub use dashboard::{handle_dashboard_html, handle_dashboard_json};
pub use rates::{handle_convert, handle_historical, handle_latest};

/// Health check endpoint.
pub async fn handle_health() -> impl IntoResponse {
    Json(json!({"status": "ok"}))
}

pub async fn handle_not_found() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(json!({"error": "Not found", "code": "not_found"})),
    )
}

#[cfg(test)]
mod tests {
    use crate::server::build_router;
    use async_trait::async_trait;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use axum::Router;
    use chrono::NaiveDate;
    use fxgate_core::network::{Exchange, UpstreamCall, UpstreamEndpoint};
    use fxgate_core::{
        AnalyticsStore, CurrencyPair, DateRange, RatesCache, RatesProvider, RatesService,
        RatesSnapshot, Result, SeriesSnapshot,
    };
    use serde_json::Value;
    use std::collections::BTreeMap;
    use std::sync::Arc;
    use tower::ServiceExt;

    struct StaticRates;

    fn call(endpoint: UpstreamEndpoint) -> UpstreamCall {
        UpstreamCall {
            endpoint,
            url: format!("http://rates.test/{}", endpoint),
            started_at: chrono::Utc::now(),
            elapsed_ms: 3,
            status: 200,
            payload_size: 80,
        }
    }

    fn snapshot(date: NaiveDate, rates: &[(&str, f64)]) -> RatesSnapshot {
        RatesSnapshot {
            amount: 1.0,
            base: "EUR".into(),
            date,
            rates: rates.iter().map(|(c, r)| (c.to_string(), *r)).collect(),
        }
    }

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[async_trait]
    impl RatesProvider for StaticRates {
        async fn latest(&self) -> Result<Exchange<RatesSnapshot>> {
            Ok(Exchange {
                value: snapshot(day(2024, 5, 10), &[("USD", 1.25), ("GBP", 0.85)]),
                call: call(UpstreamEndpoint::Latest),
            })
        }

        async fn latest_pair(&self, _pair: &CurrencyPair) -> Result<Exchange<RatesSnapshot>> {
            Ok(Exchange {
                value: snapshot(day(2024, 5, 10), &[("USD", 1.25)]),
                call: call(UpstreamEndpoint::Latest),
            })
        }

        async fn on_date(&self, date: NaiveDate, _pair: &CurrencyPair) -> Result<Exchange<RatesSnapshot>> {
            Ok(Exchange {
                value: snapshot(date, &[("USD", 1.5)]),
                call: call(UpstreamEndpoint::Historical),
            })
        }

        async fn series(&self, range: DateRange, _pair: &CurrencyPair) -> Result<Exchange<SeriesSnapshot>> {
            Ok(Exchange {
                value: SeriesSnapshot {
                    amount: 1.0,
                    base: "EUR".into(),
                    start_date: range.start,
                    end_date: Some(range.end),
                    rates: BTreeMap::from([
                        (range.start, BTreeMap::from([("USD".to_string(), 1.0)])),
                        (range.end, BTreeMap::from([("USD".to_string(), 2.0)])),
                    ]),
                },
                call: call(UpstreamEndpoint::TimeSeries),
            })
        }
    }

    fn app() -> (Router, RatesService) {
        let service = RatesService::with_parts(
            Arc::new(StaticRates),
            RatesCache::default(),
            AnalyticsStore::in_memory().unwrap(),
        );
        (build_router(service.clone()), service)
    }

    async fn get(app: &Router, uri: &str) -> (StatusCode, Value) {
        let response = app
            .clone()
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    #[tokio::test]
    async fn test_health() {
        let (app, _) = app();
        let (status, body) = get(&app, "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn test_latest_without_pair_lists_currencies() {
        let (app, _) = app();
        let (status, body) = get(&app, "/api/latest").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, serde_json::json!(["EUR", "GBP", "USD"]));
    }

    #[tokio::test]
    async fn test_latest_with_pair() {
        let (app, _) = app();
        let (status, body) = get(&app, "/api/latest?from=eur&to=usd").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["base"], "EUR");
        assert_eq!(body["date"], "2024-05-10");
        assert_eq!(body["rates"]["USD"], 1.25);
    }

    #[tokio::test]
    async fn test_same_currency_is_rejected() {
        let (app, _) = app();
        let (status, body) = get(&app, "/api/latest?from=EUR&to=EUR").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "validation");
    }

    #[tokio::test]
    async fn test_historical_single_date() {
        let (app, _) = app();
        let (status, body) = get(&app, "/api/historical?date=2024-03-08&from=EUR&to=USD").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["date"], "2024-03-08");
        assert_eq!(body["rate"], 1.5);
    }

    #[tokio::test]
    async fn test_historical_series() {
        let (app, _) = app();
        let (status, body) = get(
            &app,
            "/api/historical?toDate=2024-02-01&fromDate=2024-01-01&from=EUR&to=USD",
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let points = body.as_array().unwrap();
        assert_eq!(points.len(), 2);
        assert_eq!(points[0]["date"], "2024-01-01");
        assert_eq!(points[1]["rate"], 2.0);
    }

    #[tokio::test]
    async fn test_historical_series_defaults_to_epoch() {
        let (app, _) = app();
        let (_, body) = get(&app, "/api/historical?toDate=2024-02-01&from=EUR&to=USD").await;
        assert_eq!(body[0]["date"], "2005-01-31");
    }

    #[tokio::test]
    async fn test_historical_needs_exactly_one_date() {
        let (app, _) = app();
        for uri in [
            "/api/historical?from=EUR&to=USD",
            "/api/historical?date=2024-03-08&toDate=2024-03-08&from=EUR&to=USD",
        ] {
            let (status, body) = get(&app, uri).await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert_eq!(body["error"], "Invalid request format.");
            assert_eq!(body["code"], "invalid_request");
        }
    }

    #[tokio::test]
    async fn test_convert() {
        let (app, _) = app();
        let (status, body) = get(&app, "/api/convert?from=EUR&to=USD&amount=10").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["result"], 12.5);
        assert_eq!(body["rate"], 1.25);

        let (_, body) = get(&app, "/api/convert?from=EUR&to=USD&amount=2&date=2024-03-08").await;
        assert_eq!(body["result"], 3.0);
    }

    #[tokio::test]
    async fn test_convert_validates_amount() {
        let (app, _) = app();
        for uri in [
            "/api/convert?from=EUR&to=USD",
            "/api/convert?from=EUR&to=USD&amount=abc",
            "/api/convert?from=EUR&to=USD&amount=-1",
        ] {
            let (status, body) = get(&app, uri).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
            assert_eq!(body["code"], "validation");
        }
    }

    #[tokio::test]
    async fn test_malformed_query_uses_json_envelope() {
        let (app, _) = app();
        for uri in [
            "/api/convert?from=EUR&from=GBP&to=USD&amount=1",
            "/api/latest?from=EUR&from=GBP&to=USD",
            "/api/historical?date=2024-03-08&date=2024-03-07&from=EUR&to=USD",
        ] {
            let (status, body) = get(&app, uri).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
            assert_eq!(body["code"], "invalid_request", "{uri}");
            assert!(body["error"].as_str().unwrap().contains("duplicate field"), "{uri}");
        }
    }

    #[tokio::test]
    async fn test_latest_pair_records_rate_summary() {
        let (app, service) = app();
        get(&app, "/api/latest?from=EUR&to=USD").await;
        service.flush_analytics().await;

        let responses = service.store().recent_service_responses(10).unwrap();
        assert_eq!(responses.len(), 1);
        let record = &responses[0].record;
        assert_eq!(record.request_kind.as_str(), "getRate");
        assert_eq!(record.summary.to_currencies, vec!["USD"]);
        assert_eq!(record.summary.average_rate, Some(1.25));
    }

    #[tokio::test]
    async fn test_unknown_route() {
        let (app, _) = app();
        let (status, body) = get(&app, "/api/nope").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["code"], "not_found");
    }

    #[tokio::test]
    async fn test_requests_show_up_on_dashboard() {
        let (app, service) = app();
        get(&app, "/api/convert?from=EUR&to=USD&amount=10").await;
        get(&app, "/api/latest?from=EUR&to=USD").await;
        get(&app, "/api/latest?from=GBP&to=USD").await;
        service.flush_analytics().await;

        let (status, body) = get(&app, "/api/dashboard").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["most_frequent_conversion"], "EUR to USD");
        assert_eq!(body["totals"]["client_requests"], 3);
        assert_eq!(body["totals"]["service_responses"], 3);
        assert_eq!(body["top_devices"][0]["device_name"], "Unknown");

        let response = app
            .clone()
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let html = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let html = String::from_utf8(html.to_vec()).unwrap();
        assert!(html.contains("EUR to USD"));
    }
}
