use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use gateway_core::errors::GatewayError;
use serde_json::json;

/// HTTP adapter for [`GatewayError`]. Bodies are `{"detail": "<message>"}`.
#[derive(Debug)]
pub struct ApiError(pub GatewayError);

impl From<GatewayError> for ApiError {
    fn from(err: GatewayError) -> Self {
        Self(err)
    }
}

impl ApiError {
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            GatewayError::Authentication(_) | GatewayError::Replay(_) => StatusCode::UNAUTHORIZED,
            GatewayError::Authorization(_) => StatusCode::FORBIDDEN,
            GatewayError::Validation(_) => StatusCode::BAD_REQUEST,
            GatewayError::RateLimitExceeded => StatusCode::TOO_MANY_REQUESTS,
            GatewayError::NoBackendsAvailable |
            GatewayError::Forwarding(_) |
            GatewayError::AllAttemptsFailed => StatusCode::SERVICE_UNAVAILABLE,
            GatewayError::Store(_) | GatewayError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();

        let detail = if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %self.0, "request failed");
            "Internal Server Error".to_string()
        } else {
            self.0.to_string()
        };

        (status, Json(json!({ "detail": detail }))).into_response()
    }
}
