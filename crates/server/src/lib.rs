//! HTTP front end for the validator gateway.

pub mod errors;
pub mod middleware;
pub mod router;

use axum::{
    routing::{get, post},
    Router,
};
use gateway_core::{config::AppConfig, service::GatewayService};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use tower::limit::ConcurrencyLimitLayer;
use tower_http::{compression::CompressionLayer, limit::RequestBodyLimitLayer, trace::TraceLayer};

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<GatewayService>,
    pub metrics: PrometheusHandle,
}

/// Builds the full router: public probes plus the gateway API behind the security layers.
pub fn create_app(state: AppState, config: &AppConfig) -> Router {
    let (set_request_id_public, propagate_request_id_public) =
        middleware::create_request_id_layers();
    let (set_request_id, propagate_request_id) = middleware::create_request_id_layers();

    let public = Router::new()
        .route("/health", get(router::handle_health))
        .route("/metrics", get(router::handle_metrics))
        .route("/api/organic/uptime", get(router::handle_uptime))
        .with_state(state.clone())
        .layer(propagate_request_id_public)
        .layer(set_request_id_public);

    let api = Router::new()
        .route("/register", post(router::handle_register))
        .route("/api/user-register", post(router::handle_user_register))
        .route("/api/organic", post(router::handle_organic))
        .route("/api/v1/compress/messages", post(router::handle_compress_messages))
        .route("/api/v1/compress/text", post(router::handle_compress_text))
        .with_state(state)
        .layer(ConcurrencyLimitLayer::new(config.server.max_concurrent_requests))
        .layer(RequestBodyLimitLayer::new(config.server.max_body_bytes))
        .layer(CompressionLayer::new())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(middleware::request_span::<axum::body::Body>),
        )
        // outermost so the trace span already sees the id
        .layer(propagate_request_id)
        .layer(set_request_id);

    public.merge(api)
}
