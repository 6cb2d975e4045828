use super::LivePool;
use crate::{
    client::BackendClient,
    metrics,
    store::{RegistryStore, StoreError},
    types::BackendRecord,
};
use futures::future::join_all;
use std::{sync::Arc, time::Duration};
use tokio::{sync::broadcast, time::interval};
use tracing::{debug, error, info, warn};

/// Owns the [`LivePool`]: periodic health sweeps and incremental registration.
pub struct PoolManager {
    store: Arc<dyn RegistryStore>,
    client: Arc<BackendClient>,
    live: Arc<LivePool>,
    probe_timeout: Duration,
    refresh_interval: Duration,
}

impl PoolManager {
    #[must_use]
    pub fn new(
        store: Arc<dyn RegistryStore>,
        client: Arc<BackendClient>,
        probe_timeout: Duration,
        refresh_interval: Duration,
    ) -> Self {
        Self { store, client, live: Arc::new(LivePool::new()), probe_timeout, refresh_interval }
    }

    #[must_use]
    pub fn live_pool(&self) -> Arc<LivePool> {
        self.live.clone()
    }

    /// Re-probes every durable record and atomically replaces the live pool.
    ///
    /// Probes run concurrently and without holding any lock. A validator that errors, times
    /// out, or answers non-2xx is left out of this cycle and not retried until the next one.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the durable records cannot be loaded; the live pool is left
    /// untouched in that case.
    pub async fn refresh(&self) -> Result<usize, StoreError> {
        let records = self.store.list_backends().await?;
        let total = records.len();

        let probes = records.into_iter().map(|record| async move {
            match self.client.probe(&record.endpoint, self.probe_timeout).await {
                Ok(()) => Some(record),
                Err(e) => {
                    warn!(
                        identity = %record.identity,
                        endpoint = %record.endpoint,
                        error = %e,
                        "validator_unreachable"
                    );
                    None
                }
            }
        });

        let healthy: Vec<BackendRecord> = join_all(probes).await.into_iter().flatten().collect();
        let count = healthy.len();

        self.live.replace(healthy);
        metrics::record_pool_refresh();
        metrics::record_live_backends(self.live.len());

        info!(count, total, "validators_updated");
        Ok(count)
    }

    /// Persists a registration and makes it routable immediately.
    ///
    /// Other records bound to the same endpoint are evicted from the store and from the live
    /// pool, so an endpoint is never routable under two identities.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the write fails; the live pool is not touched.
    pub async fn register_or_update(&self, record: BackendRecord) -> Result<(), StoreError> {
        let evicted = self.store.upsert_backend(&record).await?;
        if !evicted.is_empty() {
            info!(
                endpoint = %record.endpoint,
                evicted = ?evicted,
                "deleted_duplicate_endpoints"
            );
        }

        debug!(identity = %record.identity, endpoint = %record.endpoint, "merging into live pool");
        self.live.merge_evicting(record, &evicted);
        metrics::record_live_backends(self.live.len());
        Ok(())
    }

    /// Spawns the periodic sweep. The first sweep runs immediately.
    #[must_use]
    pub fn start_with_shutdown(
        self: &Arc<Self>,
        mut shutdown_rx: broadcast::Receiver<()>,
    ) -> tokio::task::JoinHandle<()> {
        let manager = Arc::clone(self);

        tokio::spawn(async move {
            let mut interval = interval(manager.refresh_interval);

            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        if let Err(e) = manager.refresh().await {
                            error!(error = %e, "validator refresh failed");
                        }
                    }
                    _ = shutdown_rx.recv() => {
                        info!("pool manager shutting down");
                        break;
                    }
                }
            }
        })
    }
}
