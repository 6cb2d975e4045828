//! Durable registry storage.
//!
//! Four logical collections back the gateway:
//!
//! | Table | Contents |
//! |-------|----------|
//! | `validators` | [`BackendRecord`] keyed by identity, endpoint unique |
//! | `users` | caller credentials |
//! | `request_logs` | rate-limit events `(api_key, timestamp)` |
//! | `organic_monitoring` | [`UptimeSample`] history |
//!
//! [`RegistryStore`] abstracts the backend so the pool, rate limiter and monitor can be
//! exercised against fakes; [`SqliteStore`] is the production implementation.

pub mod sqlite;

pub use sqlite::SqliteStore;

use crate::types::{BackendRecord, UptimeSample};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    /// A unique constraint rejected the write.
    #[error("Duplicate key: {0}")]
    Duplicate(String),

    #[error("Database error: {0}")]
    Database(String),

    /// A stored row could not be decoded.
    #[error("Corrupt row: {0}")]
    Decode(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            if db_err.is_unique_violation() {
                return StoreError::Duplicate(db_err.message().to_string());
            }
        }
        StoreError::Database(err.to_string())
    }
}

#[async_trait]
pub trait RegistryStore: Send + Sync {
    /// Evicts every other record bound to the record's endpoint, then upserts by identity.
    ///
    /// Returns the identities of the evicted records.
    async fn upsert_backend(&self, record: &BackendRecord) -> Result<Vec<String>, StoreError>;

    async fn list_backends(&self) -> Result<Vec<BackendRecord>, StoreError>;

    /// # Errors
    ///
    /// Returns [`StoreError::Duplicate`] if the credential already exists.
    async fn insert_caller(&self, api_key: &str) -> Result<(), StoreError>;

    async fn caller_exists(&self, api_key: &str) -> Result<bool, StoreError>;

    /// Counts rate-limit events for `api_key` at or after `since`.
    async fn count_events_since(
        &self,
        api_key: &str,
        since: DateTime<Utc>,
    ) -> Result<u64, StoreError>;

    async fn insert_event(&self, api_key: &str, at: DateTime<Utc>) -> Result<(), StoreError>;

    async fn insert_sample(&self, sample: &UptimeSample) -> Result<(), StoreError>;

    /// Returns `(total, successful)` sample counts.
    async fn sample_counts(&self) -> Result<(u64, u64), StoreError>;

    /// Returns up to `limit` samples, newest first.
    async fn recent_samples(&self, limit: u32) -> Result<Vec<UptimeSample>, StoreError>;

    async fn last_failure(&self) -> Result<Option<UptimeSample>, StoreError>;
}
