//! HTTP-only middleware and extractors. Business rules (caller auth, rate limiting) live in
//! `gateway_core` and are applied by the handlers through `GatewayService`.

pub mod client_ip;
pub mod correlation_id;

pub use client_ip::ClientIp;
pub use correlation_id::{create_request_id_layers, request_span, X_REQUEST_ID};
