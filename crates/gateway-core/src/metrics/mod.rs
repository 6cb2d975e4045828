//! Prometheus metrics for the gateway.
//!
//! Recording goes through the `metrics` facade, so every call is a cheap no-op until
//! [`install_recorder`] has run. The server renders the exposition text at `/metrics`.
//!
//! | Metric | Kind | Labels |
//! |--------|------|--------|
//! | `gateway_live_backends` | gauge | |
//! | `gateway_pool_refresh_total` | counter | |
//! | `gateway_registrations_total` | counter | `outcome` |
//! | `gateway_rate_limited_total` | counter | |
//! | `gateway_forward_total` | counter | `outcome` |
//! | `gateway_forward_duration_seconds` | histogram | |
//! | `gateway_batch_items_total` | counter | `outcome` |
//! | `gateway_uptime_checks_total` | counter | `outcome` |
//! | `gateway_trust_resync_total` | counter | `outcome` |

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::{sync::OnceLock, time::Duration};

static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Installs the global Prometheus recorder once and returns its handle.
///
/// If another recorder is already installed, a detached recorder is used instead so the
/// caller still gets a renderable handle.
pub fn install_recorder() -> PrometheusHandle {
    PROMETHEUS_HANDLE
        .get_or_init(|| match PrometheusBuilder::new().install_recorder() {
            Ok(handle) => handle,
            Err(e) => {
                tracing::warn!(error = %e, "using detached prometheus recorder");
                PrometheusBuilder::new().build_recorder().handle()
            }
        })
        .clone()
}

fn outcome(success: bool) -> &'static str {
    if success {
        "success"
    } else {
        "failure"
    }
}

#[allow(clippy::cast_precision_loss)]
pub fn record_live_backends(count: usize) {
    gauge!("gateway_live_backends").set(count as f64);
}

pub fn record_pool_refresh() {
    counter!("gateway_pool_refresh_total").increment(1);
}

pub fn record_registration(outcome_label: &'static str) {
    counter!("gateway_registrations_total", "outcome" => outcome_label).increment(1);
}

pub fn record_rate_limited() {
    counter!("gateway_rate_limited_total").increment(1);
}

pub fn record_forward(success: bool, elapsed: Duration) {
    counter!("gateway_forward_total", "outcome" => outcome(success)).increment(1);
    histogram!("gateway_forward_duration_seconds").record(elapsed.as_secs_f64());
}

pub fn record_batch_item(outcome_label: &'static str) {
    counter!("gateway_batch_items_total", "outcome" => outcome_label).increment(1);
}

pub fn record_uptime_check(success: bool) {
    counter!("gateway_uptime_checks_total", "outcome" => outcome(success)).increment(1);
}

pub fn record_trust_resync(success: bool) {
    counter!("gateway_trust_resync_total", "outcome" => outcome(success)).increment(1);
}
