//! Mapping of core errors onto HTTP responses.

use axum::extract::rejection::QueryRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use fxgate_core::FxError;
use serde_json::json;
use tracing::{debug, warn};

/// Error returned by API handlers, rendered as `{"error", "code"}`.
#[derive(Debug)]
pub struct ApiError(pub FxError);

impl From<FxError> for ApiError {
    fn from(err: FxError) -> Self {
        Self(err)
    }
}

/// Malformed query strings answer with the same JSON envelope as every
/// other client error.
impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self(FxError::InvalidRequest {
            message: rejection.body_text(),
        })
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        StatusCode::from_u16(self.0.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            warn!("Request failed: {}", self.0);
        } else {
            debug!("Request rejected: {}", self.0);
        }
        let body = Json(json!({
            "error": self.0.to_string(),
            "code": self.0.kind(),
        }));
        (status, body).into_response()
    }
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;
