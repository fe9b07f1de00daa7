//! `/api/latest`, `/api/historical` and `/api/convert`.

use super::error::ApiResult;
use crate::server::AppState;
use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::response::{IntoResponse, Response};
use axum::Json;
use fxgate_core::conversion::parse_amount;
use fxgate_core::currency::{parse_rate_date, today_utc};
use fxgate_core::{CurrencyPair, DateRange, FxError, RequestKind, ResponseSummary};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Instant;

/// Query parameters shared by the rate endpoints. Every field is optional
/// here so that missing values surface as validation errors, not as
/// extractor rejections.
#[derive(Debug, Default, Deserialize)]
pub struct RateParams {
    pub from: Option<String>,
    pub to: Option<String>,
    pub amount: Option<String>,
    pub date: Option<String>,
    #[serde(rename = "toDate")]
    pub to_date: Option<String>,
    #[serde(rename = "fromDate")]
    pub from_date: Option<String>,
}

impl RateParams {
    fn pair(&self) -> fxgate_core::Result<CurrencyPair> {
        let from = required(&self.from, "from")?;
        let to = required(&self.to, "to")?;
        CurrencyPair::parse(from, to)
    }
}

fn required<'a>(value: &'a Option<String>, field: &str) -> fxgate_core::Result<&'a str> {
    match value.as_deref().map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(FxError::validation(field, format!("{} is required", field))),
    }
}

fn present(value: &Option<String>) -> bool {
    value.as_deref().is_some_and(|v| !v.trim().is_empty())
}

/// Latest rate for `from`/`to`, or the currency list when either is absent.
pub async fn handle_latest(
    State(state): State<Arc<AppState>>,
    query: Result<Query<RateParams>, QueryRejection>,
) -> ApiResult<Response> {
    let Query(params) = query?;
    let started = Instant::now();
    let service = &state.service;

    if !(present(&params.from) && present(&params.to)) {
        let codes = service.currencies().await?;
        service.record_service_response(
            RequestKind::GetCurrencies,
            started.elapsed(),
            200,
            ResponseSummary::currency_list(&codes),
        );
        return Ok(Json(codes).into_response());
    }

    let pair = params.pair()?;
    let latest = service.latest_rate(&pair).await?;
    service.record_service_response(
        RequestKind::GetRate,
        started.elapsed(),
        200,
        ResponseSummary::rates(&latest.rates),
    );
    Ok(Json(latest).into_response())
}

/// Rate on `date`, or the series up to `toDate`. Exactly one of the two
/// must be given.
pub async fn handle_historical(
    State(state): State<Arc<AppState>>,
    query: Result<Query<RateParams>, QueryRejection>,
) -> ApiResult<Response> {
    let Query(params) = query?;
    let started = Instant::now();
    let service = &state.service;
    let today = today_utc();

    match (present(&params.date), present(&params.to_date)) {
        (true, false) => {
            let pair = params.pair()?;
            let date = parse_rate_date("date", required(&params.date, "date")?, today)?;
            let rate = service.historical_rate(date, &pair).await?;
            service.record_service_response(
                RequestKind::Historical,
                started.elapsed(),
                200,
                ResponseSummary::single_rate(pair.to.as_str(), rate.rate),
            );
            Ok(Json(rate).into_response())
        }
        (false, true) => {
            let pair = params.pair()?;
            let end = parse_rate_date("toDate", required(&params.to_date, "toDate")?, today)?;
            let range = if present(&params.from_date) {
                let start =
                    parse_rate_date("fromDate", required(&params.from_date, "fromDate")?, today)?;
                DateRange::new(start, end)?
            } else {
                DateRange::ending_at(end)
            };
            let points = service.time_series(range, &pair).await?;
            service.record_service_response(
                RequestKind::TimeSeries,
                started.elapsed(),
                200,
                ResponseSummary::series(pair.to.as_str(), &points),
            );
            Ok(Json(points).into_response())
        }
        _ => Err(FxError::InvalidRequest {
            message: "Invalid request format.".to_string(),
        }
        .into()),
    }
}

/// Convert `amount` of `from` into `to`, at the latest rate or on `date`.
pub async fn handle_convert(
    State(state): State<Arc<AppState>>,
    query: Result<Query<RateParams>, QueryRejection>,
) -> ApiResult<Response> {
    let Query(params) = query?;
    let started = Instant::now();
    let service = &state.service;

    let pair = params.pair()?;
    let amount = parse_amount(params.amount.as_deref().unwrap_or_default())?;
    let date = match params.date.as_deref().map(str::trim) {
        Some(raw) if !raw.is_empty() => Some(parse_rate_date("date", raw, today_utc())?),
        _ => None,
    };

    let conversion = service.convert(&pair, amount, date).await?;
    service.record_service_response(
        RequestKind::Convert,
        started.elapsed(),
        200,
        ResponseSummary::single_rate(pair.to.as_str(), conversion.rate),
    );
    Ok(Json(conversion).into_response())
}
