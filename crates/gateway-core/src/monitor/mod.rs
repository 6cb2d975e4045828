//! Synthetic uptime probing.
//!
//! Every interval the monitor pushes a random context through the same organic path real
//! callers use, authenticated as root so it is never rate limited. A probe counts as a
//! success only when the validator answers with a non-empty `compressed_context`.

use crate::{
    metrics,
    service::GatewayService,
    store::{RegistryStore, StoreError},
    types::{has_compressed_context, OrganicRequest, UptimeReport, UptimeSample, ANY_MINER},
};
use chrono::Utc;
use rand::Rng;
use std::{sync::Arc, time::Duration};
use tokio::{
    sync::broadcast,
    time::{interval_at, Instant},
};
use tracing::{error, info, warn};

const CONTEXT_CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789 ";

const PROBE_INCENTIVE: f64 = 0.2;

/// Random alphanumeric-and-space text of `len` characters.
#[must_use]
pub fn random_context(len: usize) -> String {
    let mut rng = rand::rng();
    (0..len).map(|_| char::from(CONTEXT_CHARSET[rng.random_range(0..CONTEXT_CHARSET.len())])).collect()
}

/// Periodic end-to-end probe of the organic path.
pub struct UptimeMonitor {
    service: Arc<GatewayService>,
    store: Arc<dyn RegistryStore>,
    root_token: String,
    interval: Duration,
    context_chars: usize,
    tier: String,
    target_model: String,
}

impl UptimeMonitor {
    #[must_use]
    pub fn new(
        service: Arc<GatewayService>,
        root_token: String,
        interval: Duration,
        context_chars: usize,
        tier: String,
        target_model: String,
    ) -> Self {
        let store = service.store();
        Self { service, store, root_token, interval, context_chars, tier, target_model }
    }

    /// Runs one probe and persists its outcome, stamped with the time the probe started.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the sample cannot be written. Probe failures themselves are
    /// recorded as unsuccessful samples, not returned.
    pub async fn probe_once(&self) -> Result<UptimeSample, StoreError> {
        let started_at = Utc::now();
        let request = OrganicRequest {
            context: random_context(self.context_chars),
            tier: self.tier.clone(),
            target_model: self.target_model.clone(),
            miner_uid: ANY_MINER,
            top_incentive: PROBE_INCENTIVE,
        };

        let is_success = match self.service.process_organic(&self.root_token, request).await {
            Ok(result) => {
                let ok = has_compressed_context(&result);
                if !ok {
                    warn!("organic probe returned no compressed context");
                }
                ok
            }
            Err(e) => {
                warn!(error = %e, "organic probe failed");
                false
            }
        };

        let sample = UptimeSample { timestamp: started_at, is_success };
        self.store.insert_sample(&sample).await?;
        metrics::record_uptime_check(is_success);

        info!(is_success, "organic_monitoring_complete");
        Ok(sample)
    }

    /// Spawns the probe loop. The first probe runs one interval after start, once the pool's
    /// initial sweep has had a chance to populate the live pool.
    #[must_use]
    pub fn start_with_shutdown(
        self: Arc<Self>,
        mut shutdown_rx: broadcast::Receiver<()>,
    ) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = interval_at(Instant::now() + self.interval, self.interval);

            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        if let Err(e) = self.probe_once().await {
                            error!(error = %e, "failed to record uptime sample");
                        }
                    }
                    _ = shutdown_rx.recv() => {
                        info!("uptime monitor shutting down");
                        break;
                    }
                }
            }
        })
    }
}

/// Aggregates stored samples. An empty history reports 0%.
///
/// # Errors
///
/// Returns [`StoreError`] if the samples cannot be read.
pub async fn uptime_report(
    store: &dyn RegistryStore,
    recent_limit: u32,
) -> Result<UptimeReport, StoreError> {
    let (total_checks, successful_checks) = store.sample_counts().await?;
    let recent_status = store.recent_samples(recent_limit).await?;
    let last_failed_timestamp = store.last_failure().await?.map(|s| s.timestamp);

    Ok(UptimeReport {
        total_checks,
        successful_checks,
        uptime_percentage: uptime_percentage(successful_checks, total_checks),
        recent_status,
        last_failed_timestamp,
    })
}

#[allow(clippy::cast_precision_loss)]
fn uptime_percentage(successful: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let raw = successful as f64 / total as f64 * 100.0;
    (raw * 100.0).round() / 100.0
}
