use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

use sentinel_core::error::{ClientCode, SentinelError};

/// `SentinelError` as an HTTP response: `{"error":{"code","message"}}`.
#[derive(Debug, Error)]
#[error(transparent)]
pub struct ApiError(#[from] pub SentinelError);

impl ApiError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self(SentinelError::BadRequest(msg.into()))
    }

    pub fn status(&self) -> StatusCode {
        match self.0.client_code() {
            ClientCode::BadRequest => StatusCode::BAD_REQUEST,
            ClientCode::InvalidPolicy | ClientCode::InvalidConfig | ClientCode::UnsupportedVersion => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            ClientCode::Storage => StatusCode::SERVICE_UNAVAILABLE,
            ClientCode::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::warn!(error = %self.0, "request failed");
        }
        let body = json!({
            "error": {
                "code": self.0.client_code().as_str(),
                "message": self.0.to_string(),
            }
        });
        (status, Json(body)).into_response()
    }
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;
