use crate::{errors::ApiError, middleware::ClientIp, AppState};
use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use gateway_core::{
    errors::GatewayError,
    types::{CompressMessagesRequest, CompressTextRequest, OrganicRequest, RegisterPayload},
};
use serde::Deserialize;
use serde_json::{json, Value};

pub const MESSAGE_HEADER: &str = "message";
pub const IDENTITY_HEADER: &str = "ss58_address";
pub const SIGNATURE_HEADER: &str = "signature";
pub const ADMIN_KEY_HEADER: &str = "admin-api-key";
pub const USER_KEY_HEADER: &str = "user-api-key";

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

/// Credential headers are also accepted in their `snake_case` spelling.
fn credential<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    header(headers, name).or_else(|| header(headers, &name.replace('-', "_")))
}

fn caller_token(headers: &HeaderMap) -> Result<&str, ApiError> {
    credential(headers, USER_KEY_HEADER)
        .filter(|k| !k.is_empty())
        .ok_or_else(|| GatewayError::Authorization("Unauthorized".to_string()).into())
}

/// `POST /register`: validator self-registration.
pub async fn handle_register(
    State(state): State<AppState>,
    ClientIp(ip_address): ClientIp,
    headers: HeaderMap,
    Json(payload): Json<RegisterPayload>,
) -> Result<Json<Value>, ApiError> {
    let (Some(identity), Some(message), Some(signature)) = (
        header(&headers, IDENTITY_HEADER),
        header(&headers, MESSAGE_HEADER),
        header(&headers, SIGNATURE_HEADER),
    ) else {
        return Err(
            GatewayError::Authentication("Missing authentication headers".to_string()).into()
        );
    };

    state
        .service
        .register_backend(identity, message, signature, &ip_address, payload.port)
        .await?;

    Ok(Json(json!({ "status": "success" })))
}

#[derive(Debug, Deserialize)]
pub struct UserRegisterPayload {
    #[serde(default)]
    pub api_key: Option<String>,
}

/// `POST /api/user-register`: admin-only caller credential creation.
pub async fn handle_user_register(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<UserRegisterPayload>,
) -> Result<Json<Value>, ApiError> {
    let admin_token = credential(&headers, ADMIN_KEY_HEADER).unwrap_or_default();
    state.service.register_caller(admin_token, payload.api_key.as_deref()).await?;

    Ok(Json(json!({ "status": "success", "message": "User API key registered" })))
}

/// `POST /api/organic`: forwards one request and returns the validator's JSON verbatim.
pub async fn handle_organic(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<OrganicRequest>,
) -> Result<Json<Value>, ApiError> {
    let token = caller_token(&headers)?;
    let result = state.service.process_organic(token, request).await?;
    Ok(Json(result))
}

/// `POST /api/v1/compress/messages`
pub async fn handle_compress_messages(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<CompressMessagesRequest>,
) -> Result<Json<Value>, ApiError> {
    let token = caller_token(&headers)?;
    let outcome = state.service.compress_messages(token, request).await?;

    Ok(Json(json!({
        "status": "success",
        "messages": outcome.messages,
    })))
}

/// `POST /api/v1/compress/text`
pub async fn handle_compress_text(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<CompressTextRequest>,
) -> Result<Json<Value>, ApiError> {
    let token = caller_token(&headers)?;
    let (compressed_text, compressed) = state.service.compress_text(token, request).await?;

    Ok(Json(json!({ "compressed_text": compressed_text, "compressed": compressed })))
}

/// `GET /api/organic/uptime`
pub async fn handle_uptime(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let report = state.service.uptime_report().await?;
    let body = serde_json::to_value(report)
        .map_err(|e| GatewayError::Internal(format!("uptime serialization: {e}")))?;
    Ok(Json(body))
}

#[allow(clippy::unused_async)]
pub async fn handle_metrics(State(state): State<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
        state.metrics.render(),
    )
}

#[allow(clippy::unused_async)]
pub async fn handle_health(State(state): State<AppState>) -> impl IntoResponse {
    let live_backends = state.service.live_backends();

    Json(json!({
        "status": if live_backends > 0 { "healthy" } else { "no_backends" },
        "live_backends": live_backends,
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}
