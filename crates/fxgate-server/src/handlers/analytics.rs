//! Client request recording for `/api/*` routes.

use crate::server::AppState;
use axum::extract::{ConnectInfo, Request, State};
use axum::http::header::USER_AGENT;
use axum::middleware::Next;
use axum::response::Response;
use chrono::Utc;
use fxgate_core::analytics::{classify, ClientRequestRecord};
use std::net::SocketAddr;
use std::sync::Arc;

/// Record the incoming request, then hand it on.
pub async fn record_client_request(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    state.service.record_client_request(client_record(&request));
    next.run(request).await
}

fn client_record(request: &Request) -> ClientRequestRecord {
    let user_agent = request
        .headers()
        .get(USER_AGENT)
        .and_then(|v| v.to_str().ok());
    let device = classify(user_agent);

    let ip_address = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string());

    let mut record = ClientRequestRecord {
        endpoint: request.uri().path().to_string(),
        http_method: request.method().to_string(),
        device_name: device.device_name,
        operating_system: device.operating_system,
        ip_address,
        from_currency: None,
        to_currency: None,
        date: None,
        to_date: None,
        recorded_at: Utc::now(),
    };

    let query = request.uri().query().unwrap_or_default();
    for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
        let value = value.trim();
        if value.is_empty() {
            continue;
        }
        match key.as_ref() {
            "from" => record.from_currency = Some(value.to_ascii_uppercase()),
            "to" => record.to_currency = Some(value.to_ascii_uppercase()),
            "date" => record.date = Some(value.to_string()),
            "toDate" => record.to_date = Some(value.to_string()),
            _ => {}
        }
    }

    record
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;

    #[test]
    fn test_client_record_from_request() {
        let mut request = Request::builder()
            .uri("/api/convert?from=eur&to=usd&amount=10&date=2024-03-08")
            .header(
                USER_AGENT,
                "Dalvik/2.1.0 (Linux; U; Android 14; Pixel 8 Build/UQ1A.240105.004)",
            )
            .body(Body::empty())
            .unwrap();
        request
            .extensions_mut()
            .insert(ConnectInfo(SocketAddr::from(([10, 0, 0, 7], 5555))));

        let record = client_record(&request);
        assert_eq!(record.endpoint, "/api/convert");
        assert_eq!(record.http_method, "GET");
        assert_eq!(record.device_name, "Pixel 8");
        assert_eq!(record.operating_system, "Android 14");
        assert_eq!(record.ip_address.as_deref(), Some("10.0.0.7"));
        assert_eq!(record.pair(), Some(("EUR", "USD")));
        assert_eq!(record.date.as_deref(), Some("2024-03-08"));
        assert_eq!(record.to_date, None);
    }

    #[test]
    fn test_missing_headers_are_unknown() {
        let request = Request::builder()
            .uri("/api/latest")
            .body(Body::empty())
            .unwrap();
        let record = client_record(&request);
        assert_eq!(record.device_name, "Unknown");
        assert_eq!(record.ip_address, None);
        assert_eq!(record.pair(), None);
    }
}
