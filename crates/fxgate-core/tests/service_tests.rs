//! Integration tests for `RatesService` against a local fake upstream.

use axum::extract::{Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use fxgate_core::{CurrencyPair, DateRange, FxError, RatesService, ServiceConfig};
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::json;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

#[derive(Default)]
struct Upstream {
    hits: AtomicUsize,
    failing: AtomicBool,
    rate_limited: AtomicBool,
    stalled: AtomicBool,
}

#[derive(Deserialize)]
struct PairQuery {
    from: Option<String>,
    to: Option<String>,
}

fn rates_for(query: &PairQuery) -> Result<HashMap<String, f64>, Response> {
    let table = HashMap::from([("USD", 1.08), ("GBP", 0.86), ("JPY", 168.25)]);
    match &query.to {
        None => Ok(table.iter().map(|(k, v)| (k.to_string(), *v)).collect()),
        Some(to) => match table.get(to.as_str()) {
            Some(rate) => Ok(HashMap::from([(to.clone(), *rate)])),
            None => Err((
                StatusCode::NOT_FOUND,
                Json(json!({ "message": "not found" })),
            )
                .into_response()),
        },
    }
}

async fn latest(State(up): State<Arc<Upstream>>, Query(query): Query<PairQuery>) -> Response {
    up.hits.fetch_add(1, Ordering::SeqCst);
    if up.failing.load(Ordering::SeqCst) {
        return StatusCode::SERVICE_UNAVAILABLE.into_response();
    }
    if up.rate_limited.load(Ordering::SeqCst) {
        return (StatusCode::TOO_MANY_REQUESTS, [(header::RETRY_AFTER, "7")]).into_response();
    }
    if up.stalled.load(Ordering::SeqCst) {
        tokio::time::sleep(Duration::from_secs(5)).await;
    }
    match rates_for(&query) {
        Ok(rates) => Json(json!({
            "amount": 1.0,
            "base": query.from.as_deref().unwrap_or("EUR"),
            "date": "2024-05-10",
            "rates": rates,
        }))
        .into_response(),
        Err(resp) => resp,
    }
}

async fn dated(
    State(up): State<Arc<Upstream>>,
    Path(segment): Path<String>,
    Query(query): Query<PairQuery>,
) -> Response {
    up.hits.fetch_add(1, Ordering::SeqCst);
    let rates = match rates_for(&query) {
        Ok(rates) => rates,
        Err(resp) => return resp,
    };
    let base = query.from.as_deref().unwrap_or("EUR");

    if let Some((start, end)) = segment.split_once("..") {
        return Json(json!({
            "amount": 1.0,
            "base": base,
            "start_date": start,
            "end_date": end,
            "rates": { start: rates.clone(), end: rates },
        }))
        .into_response();
    }

    // Saturday lookups answer with Friday's rates.
    let date = if segment == "2024-03-09" { "2024-03-08" } else { segment.as_str() };
    Json(json!({ "amount": 1.0, "base": base, "date": date, "rates": rates })).into_response()
}

async fn spawn_upstream() -> (String, Arc<Upstream>) {
    let state = Arc::new(Upstream::default());
    let app = Router::new()
        .route("/latest", get(latest))
        .route("/:segment", get(dated))
        .with_state(state.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{}", addr), state)
}

fn service(url: &str, temp: &TempDir) -> RatesService {
    service_with_timeout(url, temp, Duration::from_secs(5))
}

fn service_with_timeout(url: &str, temp: &TempDir, timeout: Duration) -> RatesService {
    let config = ServiceConfig::builder()
        .upstream_url(url)
        .max_attempts(1)
        .request_timeout(timeout)
        .database_path(temp.path().join("analytics.db"))
        .build()
        .unwrap();
    RatesService::new(&config).unwrap()
}

fn day(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

#[tokio::test]
async fn test_currencies_from_upstream() {
    let (url, upstream) = spawn_upstream().await;
    let temp = TempDir::new().unwrap();
    let service = service(&url, &temp);

    let codes = service.currencies().await.unwrap();
    assert_eq!(codes, ["EUR", "GBP", "JPY", "USD"]);

    // Second call is served from cache.
    service.currencies().await.unwrap();
    assert_eq!(upstream.hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_latest_and_historical_rates() {
    let (url, _) = spawn_upstream().await;
    let temp = TempDir::new().unwrap();
    let service = service(&url, &temp);
    let pair = CurrencyPair::parse("EUR", "USD").unwrap();

    let latest = service.latest_rate(&pair).await.unwrap();
    assert_eq!(latest.date, day(2024, 5, 10));
    assert_eq!(latest.rate_for("USD"), Some(1.08));

    let historical = service.historical_rate(day(2024, 3, 9), &pair).await.unwrap();
    assert_eq!(historical.date, day(2024, 3, 8));
    assert_eq!(historical.rate, 1.08);
}

#[tokio::test]
async fn test_time_series_and_analytics_rows() {
    let (url, _) = spawn_upstream().await;
    let temp = TempDir::new().unwrap();
    let service = service(&url, &temp);
    let pair = CurrencyPair::parse("EUR", "JPY").unwrap();
    let range = DateRange::new(day(2024, 1, 2), day(2024, 1, 31)).unwrap();

    let points = service.time_series(range, &pair).await.unwrap();
    assert_eq!(points.len(), 2);
    assert_eq!(points[0].date, day(2024, 1, 2));
    assert_eq!(points[1].rate, 168.25);

    service.flush_analytics().await;
    let requests = service.store().recent_server_requests(10).unwrap();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].record.endpoint, "time_series");
    assert_eq!(requests[0].record.to_date.as_deref(), Some("2024-01-31"));
    assert!(requests[0].record.upstream_url.ends_with("2024-01-02..2024-01-31?from=EUR&to=JPY"));

    let responses = service.store().recent_server_responses(10).unwrap();
    assert_eq!(responses[0].record.summary.number_of_values, 2);
    assert_eq!(responses[0].record.summary.average_rate, Some(168.25));
}

#[tokio::test]
async fn test_unknown_currency_maps_to_upstream_error() {
    let (url, _) = spawn_upstream().await;
    let temp = TempDir::new().unwrap();
    let service = service(&url, &temp);
    let pair = CurrencyPair::parse("EUR", "XYZ").unwrap();

    let err = service.latest_rate(&pair).await.unwrap_err();
    match err {
        FxError::Upstream { status, message } => {
            assert_eq!(status, 404);
            assert_eq!(message, "not found");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_failing_upstream_opens_breaker() {
    let (url, upstream) = spawn_upstream().await;
    upstream.failing.store(true, Ordering::SeqCst);
    let temp = TempDir::new().unwrap();
    let service = service(&url, &temp);

    for _ in 0..5 {
        let err = service.currencies().await.unwrap_err();
        assert_eq!(err.status_code(), 502);
    }
    let err = service.currencies().await.unwrap_err();
    assert!(matches!(err, FxError::CircuitBreakerOpen { .. }));
    assert_eq!(err.status_code(), 503);
    assert_eq!(upstream.hits.load(Ordering::SeqCst), 5);

    let report = service.dashboard().await.unwrap();
    let stats = report.upstream.unwrap();
    assert_eq!(stats.total_failures, 5);
}

#[tokio::test]
async fn test_rate_limited_upstream_maps_to_429() {
    let (url, upstream) = spawn_upstream().await;
    upstream.rate_limited.store(true, Ordering::SeqCst);
    let temp = TempDir::new().unwrap();
    let service = service(&url, &temp);

    let err = service.currencies().await.unwrap_err();
    match &err {
        FxError::RateLimited {
            service,
            retry_after_secs,
        } => {
            assert_eq!(service, "127.0.0.1");
            assert_eq!(*retry_after_secs, Some(7));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(err.status_code(), 429);
    assert_eq!(err.kind(), "rate_limited");
}

#[tokio::test]
async fn test_stalled_upstream_maps_to_504() {
    let (url, upstream) = spawn_upstream().await;
    upstream.stalled.store(true, Ordering::SeqCst);
    let temp = TempDir::new().unwrap();
    let timeout = Duration::from_millis(200);
    let service = service_with_timeout(&url, &temp, timeout);

    let err = service.currencies().await.unwrap_err();
    assert!(matches!(err, FxError::Timeout(d) if d == timeout), "{err:?}");
    assert_eq!(err.status_code(), 504);
    assert_eq!(err.to_string(), "Request timeout after 200ms");
}

#[tokio::test]
async fn test_analytics_persist_across_reopen() {
    let (url, _) = spawn_upstream().await;
    let temp = TempDir::new().unwrap();

    {
        let service = service(&url, &temp);
        let pair = CurrencyPair::parse("EUR", "GBP").unwrap();
        service.convert(&pair, 10.0, None).await.unwrap();
        service.flush_analytics().await;
    }

    let store = fxgate_core::AnalyticsStore::open(temp.path().join("analytics.db")).unwrap();
    assert_eq!(store.table_counts().unwrap().server_requests, 1);
}
