//! Stake-weighted validator selection and work dispatch.
//!
//! # Selection
//!
//! ```text
//!   LivePool snapshot
//!         │
//!         ├──> stake_of(identity) >= min_stake      (roster-absent => ineligible)
//!         ├──> identity in allowlist                (when configured)
//!         │
//!         └──> weighted draw, weight = stake
//!                - weight 0 never drawn while any weight > 0
//!                - all weights 0 => uniform among them
//! ```
//!
//! One draw per forward attempt; batch retries re-draw so a failing validator is not
//! pinned for the whole retry budget.

pub mod dispatcher;

pub use crate::client::ForwardError;
pub use dispatcher::{BatchOutcome, BatchPolicy, Dispatcher};

use crate::{errors::GatewayError, pool::LivePool, trust::TrustSource, types::BackendRecord};
use rand::Rng;
use std::{collections::HashSet, sync::Arc};

/// Picks one entry with probability proportional to its weight.
///
/// Non-finite or negative weights count as zero. Returns `None` only for an empty slice.
pub fn select_weighted<'a, T, R: Rng + ?Sized>(
    candidates: &'a [(T, f64)],
    rng: &mut R,
) -> Option<&'a T> {
    if candidates.is_empty() {
        return None;
    }

    let weight = |w: f64| if w.is_finite() && w > 0.0 { w } else { 0.0 };
    let total: f64 = candidates.iter().map(|(_, w)| weight(*w)).sum();

    if total <= 0.0 {
        let index = rng.random_range(0..candidates.len());
        return Some(&candidates[index].0);
    }

    let target = rng.random_range(0.0..total);
    let mut cumulative = 0.0;
    for (item, w) in candidates {
        let w = weight(*w);
        if w == 0.0 {
            continue;
        }
        cumulative += w;
        if target < cumulative {
            return Some(item);
        }
    }

    // float rounding can leave target just above the final sum
    candidates.iter().rev().find(|(_, w)| weight(*w) > 0.0).map(|(item, _)| item)
}

/// Filters live validators down to routable candidates paired with their stake.
pub struct Router {
    pool: Arc<LivePool>,
    trust: Arc<dyn TrustSource>,
    min_stake: f64,
    allowlist: HashSet<String>,
}

impl Router {
    #[must_use]
    pub fn new(
        pool: Arc<LivePool>,
        trust: Arc<dyn TrustSource>,
        min_stake: f64,
        allowlist: impl IntoIterator<Item = String>,
    ) -> Self {
        Self { pool, trust, min_stake, allowlist: allowlist.into_iter().collect() }
    }

    /// Whether `identity` passes the configured allowlist.
    #[must_use]
    pub fn is_allowed(&self, identity: &str) -> bool {
        self.allowlist.is_empty() || self.allowlist.contains(identity)
    }

    /// Live validators with stake at or above the floor, sorted by identity.
    #[must_use]
    pub fn candidates(&self) -> Vec<(BackendRecord, f64)> {
        let snapshot = self.pool.snapshot();
        let mut candidates: Vec<_> = snapshot
            .values()
            .filter(|record| self.is_allowed(&record.identity))
            .filter_map(|record| {
                let stake = self.trust.stake_of(&record.identity)?;
                (stake >= self.min_stake).then(|| (record.clone(), stake))
            })
            .collect();

        candidates.sort_by(|a, b| a.0.identity.cmp(&b.0.identity));
        candidates
    }

    /// # Errors
    ///
    /// Returns [`GatewayError::NoBackendsAvailable`] when no validator is eligible.
    pub fn select(&self) -> Result<BackendRecord, GatewayError> {
        self.select_with(&mut rand::rng())
    }

    /// # Errors
    ///
    /// Returns [`GatewayError::NoBackendsAvailable`] when no validator is eligible.
    pub fn select_with<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<BackendRecord, GatewayError> {
        let candidates = self.candidates();
        select_weighted(&candidates, rng).cloned().ok_or(GatewayError::NoBackendsAvailable)
    }
}
