use super::{TrustError, TrustSource};
use crate::{config::TrustConfig, metrics};
use rand::Rng;
use std::{sync::Arc, time::Duration};
use tokio::{sync::broadcast, time::interval};
use tracing::{error, info, warn};

/// Jittered exponential backoff.
#[derive(Debug, Clone)]
pub struct BackoffPolicy {
    /// Retries after the first failed attempt.
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    /// Jitter factor (0.0-1.0) spread around each delay.
    pub jitter_factor: f64,
}

impl BackoffPolicy {
    #[must_use]
    pub fn from_config(config: &TrustConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            base_delay_ms: config.base_backoff_ms,
            max_delay_ms: config.max_backoff_ms,
            jitter_factor: config.jitter_factor,
        }
    }

    /// Delay before retry number `attempt` (1-based).
    #[must_use]
    pub fn delay(&self, attempt: u32) -> Duration {
        let base_delay = self.base_delay_ms.saturating_mul(1u64 << attempt.min(10));
        let capped_delay = base_delay.min(self.max_delay_ms);

        #[allow(
            clippy::cast_possible_truncation,
            clippy::cast_sign_loss,
            clippy::cast_precision_loss
        )]
        let jitter_range = (capped_delay as f64 * self.jitter_factor) as u64;
        let jitter_offset =
            if jitter_range > 0 { rand::rng().random_range(0..jitter_range) } else { 0 };

        Duration::from_millis(capped_delay.saturating_sub(jitter_range / 2) + jitter_offset)
    }
}

/// Runs one resync, retrying failures with `policy`.
///
/// # Errors
///
/// Returns [`TrustError::ResyncExhausted`] once `max_retries` retries have also failed.
pub async fn resync_with_backoff(
    source: &dyn TrustSource,
    policy: &BackoffPolicy,
) -> Result<usize, TrustError> {
    let mut attempt = 0u32;

    loop {
        attempt += 1;

        match source.resync().await {
            Ok(count) => {
                metrics::record_trust_resync(true);
                return Ok(count);
            }
            Err(e) => {
                metrics::record_trust_resync(false);
                if attempt > policy.max_retries {
                    return Err(TrustError::ResyncExhausted {
                        attempts: attempt,
                        last_error: e.to_string(),
                    });
                }

                let delay = policy.delay(attempt);
                warn!(
                    attempt,
                    max_retries = policy.max_retries,
                    delay_ms = delay.as_millis(),
                    error = %e,
                    "trust resync failed, backing off"
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}

/// Periodic background resync of a [`TrustSource`].
pub struct TrustResync {
    source: Arc<dyn TrustSource>,
    resync_interval: Duration,
    policy: BackoffPolicy,
}

impl TrustResync {
    #[must_use]
    pub fn new(source: Arc<dyn TrustSource>, resync_interval: Duration, policy: BackoffPolicy) -> Self {
        Self { source, resync_interval, policy }
    }

    /// Spawns the resync loop.
    ///
    /// The task ends with `Err` when a resync exhausts its retries. Request paths keep using
    /// the last table the source loaded.
    #[must_use]
    pub fn start_with_shutdown(
        &self,
        mut shutdown_rx: broadcast::Receiver<()>,
    ) -> tokio::task::JoinHandle<Result<(), TrustError>> {
        let source = self.source.clone();
        let policy = self.policy.clone();
        let resync_interval = self.resync_interval;

        tokio::spawn(async move {
            let mut interval = interval(resync_interval);

            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        let result = tokio::select! {
                            result = resync_with_backoff(source.as_ref(), &policy) => result,
                            _ = shutdown_rx.recv() => {
                                info!("trust resync shutting down");
                                return Ok(());
                            }
                        };

                        if let Err(e) = result {
                            error!(error = %e, "trust_resync_exhausted");
                            return Err(e);
                        }
                    }
                    _ = shutdown_rx.recv() => {
                        info!("trust resync shutting down");
                        return Ok(());
                    }
                }
            }
        })
    }
}
