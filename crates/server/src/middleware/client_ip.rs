use crate::errors::ApiError;
use axum::{
    extract::{ConnectInfo, FromRequestParts},
    http::{request::Parts, HeaderMap},
};
use gateway_core::errors::GatewayError;
use std::net::SocketAddr;

/// Address a validator registers from.
///
/// Resolution order: `X-Real-Ip` (set by the fronting proxy), the first `X-Forwarded-For`
/// hop, then the socket peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientIp(pub String);

impl<S: Send + Sync> FromRequestParts<S> for ClientIp {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        if let Some(ip) = forwarded_ip(&parts.headers) {
            return Ok(Self(ip));
        }

        parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| Self(addr.ip().to_string()))
            .ok_or_else(|| {
                GatewayError::Validation("Unable to determine client address".to_string()).into()
            })
    }
}

fn forwarded_ip(headers: &HeaderMap) -> Option<String> {
    let header = |name: &str| {
        headers.get(name).and_then(|v| v.to_str().ok()).map(str::trim).filter(|v| !v.is_empty())
    };

    header("x-real-ip")
        .or_else(|| header("x-forwarded-for").and_then(|v| v.split(',').next()).map(str::trim))
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
