//! Stake table, identity roster and signature verification.
//!
//! The gateway never talks to the chain directly. Everything it needs from the ledger is
//! captured by [`TrustSource`]:
//!
//! - `verify`: does `signature` sign `message` under `identity`?
//! - `stake_of`: the identity's current stake, if it is on the roster
//! - `resync`: refresh the stake table
//!
//! [`HttpTrustSource`] pulls the roster from an HTTP service and verifies ed25519
//! signatures. [`resync::TrustResync`] keeps it fresh in the background.

pub mod http;
pub mod resync;
pub mod signature;

pub use http::HttpTrustSource;
pub use resync::{BackoffPolicy, TrustResync};

use async_trait::async_trait;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TrustError {
    #[error("roster request failed: {0}")]
    Fetch(String),

    #[error("roster returned HTTP {0}")]
    Status(u16),

    #[error("roster decode failed: {0}")]
    Decode(String),

    #[error("roster resync failed after {attempts} attempts: {last_error}")]
    ResyncExhausted { attempts: u32, last_error: String },
}

#[async_trait]
pub trait TrustSource: Send + Sync {
    /// Checks `signature` over `message` for `identity`. Never errors; malformed input is
    /// simply not valid.
    fn verify(&self, identity: &str, message: &[u8], signature: &str) -> bool;

    /// Current stake of `identity`, or `None` when it is not on the roster.
    fn stake_of(&self, identity: &str) -> Option<f64>;

    /// Refreshes the stake table, returning the number of roster entries.
    async fn resync(&self) -> Result<usize, TrustError>;
}
