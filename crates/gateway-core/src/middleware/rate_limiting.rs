use crate::{
    auth::RootCredential,
    store::{RegistryStore, StoreError},
};
use chrono::{DateTime, Utc};
use std::{sync::Arc, time::Duration};

/// Rolling-window rate limiter backed by the registry store.
///
/// A caller is admitted while it has fewer than `limit` recorded events in the trailing
/// `window`. Only admitted requests are recorded, so rejected attempts never extend the
/// lockout. Events live in the shared store so every gateway instance sees the same counts;
/// the count-then-insert is not atomic and may over-admit slightly under concurrent bursts.
pub struct WindowRateLimiter {
    store: Arc<dyn RegistryStore>,
    limit: u32,
    window: Duration,
    root: RootCredential,
}

impl WindowRateLimiter {
    #[must_use]
    pub fn new(
        store: Arc<dyn RegistryStore>,
        limit: u32,
        window: Duration,
        root: RootCredential,
    ) -> Self {
        Self { store, limit, window, root }
    }

    /// # Errors
    ///
    /// Returns [`StoreError`] if the event count or insert fails.
    pub async fn admit(&self, token: &str) -> Result<bool, StoreError> {
        self.admit_at(token, Utc::now()).await
    }

    /// Admission check against an explicit clock.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the event count or insert fails.
    pub async fn admit_at(&self, token: &str, now: DateTime<Utc>) -> Result<bool, StoreError> {
        if self.root.matches(token) {
            return Ok(true);
        }

        let window = chrono::Duration::from_std(self.window).unwrap_or(chrono::Duration::MAX);
        let window_start = now.checked_sub_signed(window).unwrap_or(DateTime::<Utc>::MIN_UTC);

        let count = self.store.count_events_since(token, window_start).await?;
        if count >= u64::from(self.limit) {
            tracing::debug!(count, limit = self.limit, "caller rate limited");
            return Ok(false);
        }

        self.store.insert_event(token, now).await?;
        Ok(true)
    }
}
