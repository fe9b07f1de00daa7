//! HTTP server implementation using Axum.

use crate::handlers::{
    handle_convert, handle_dashboard_html, handle_dashboard_json, handle_health,
    handle_historical, handle_latest, handle_not_found, record_client_request,
};
use axum::extract::Request;
use axum::middleware;
use axum::routing::get;
use axum::Router;
use fxgate_core::RatesService;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info, info_span};
use uuid::Uuid;

/// Application state shared across handlers.
pub struct AppState {
    pub service: RatesService,
}

/// Build the router with every route and layer.
pub fn build_router(service: RatesService) -> Router {
    let state = Arc::new(AppState { service });

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/latest", get(handle_latest))
        .route("/api/historical", get(handle_historical))
        .route("/api/convert", get(handle_convert))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            record_client_request,
        ))
        .route("/api/dashboard", get(handle_dashboard_json))
        .route("/health", get(handle_health))
        .route("/", get(handle_dashboard_html))
        .fallback(handle_not_found)
        .layer(
            TraceLayer::new_for_http().make_span_with(|req: &Request| {
                info_span!(
                    "request",
                    id = %Uuid::new_v4(),
                    method = %req.method(),
                    uri = %req.uri(),
                )
            }),
        )
        .layer(cors)
        .with_state(state)
}

/// Start the HTTP server.
///
/// Returns the actual address the server is bound to (useful when port=0).
pub async fn start_server(
    service: RatesService,
    host: &str,
    port: u16,
) -> anyhow::Result<SocketAddr> {
    let app = build_router(service);

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    let actual_addr = listener.local_addr()?;

    info!("Server listening on {}", actual_addr);

    tokio::spawn(async move {
        let served = axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await;
        if let Err(e) = served {
            error!("Server error: {}", e);
        }
    });

    Ok(actual_addr)
}

#[cfg(test)]
mod tests {
    use super::*;
    use fxgate_core::ServiceConfig;

    #[tokio::test]
    async fn test_server_starts() {
        let config = ServiceConfig::builder()
            .upstream_url("http://127.0.0.1:9")
            .in_memory_database()
            .build()
            .unwrap();
        let service = RatesService::new(&config).unwrap();

        let addr = start_server(service, "127.0.0.1", 0).await.unwrap();
        assert!(addr.port() > 0);

        let health: serde_json::Value = reqwest::get(format!("http://{}/health", addr))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(health["status"], "ok");
    }
}
