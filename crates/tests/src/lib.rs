//! Integration tests for the validator gateway.
//!
//! This crate contains the following test modules:
//!
//! - `dispatch_tests`: Batch retries, failure policies and single-shot forwarding
//! - `pool_tests`: Registration merges, endpoint eviction and liveness sweeps
//! - `monitor_tests`: Synthetic uptime probes through the full service
//! - `http_tests`: The HTTP surface end to end, from headers to status codes
//! - `mock_infrastructure`: Reusable fixtures (validator mock server, stake table, keys)
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test --package tests
//! ```
//!
//! Validator backends are simulated with `mockito`, so no network services are needed.

#[cfg(test)]
mod http_tests;
#[cfg(test)]
mod monitor_tests;
#[cfg(test)]
mod pool_tests;
