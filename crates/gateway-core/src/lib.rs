//! # Gateway Core
//!
//! Core library for the validator gateway: a registry of compute-serving validators,
//! stake-weighted routing of client work to them, and a synthetic uptime probe.
//!
//! - **[`pool`]**: Durable validator registry mirrored into an in-memory live pool, refreshed
//!   by periodic liveness probes.
//!
//! - **[`auth`]**: Signed, nonce-fresh validator registration and caller / admin credential
//!   checks.
//!
//! - **[`middleware`]**: Store-backed rolling-window rate limiting.
//!
//! - **[`router`]**: Stake-weighted selection over live, staked, allowlisted validators, plus
//!   single-shot forwarding and per-item batch retries.
//!
//! - **[`trust`]**: The stake roster and signature verification, resynced in the background.
//!
//! - **[`monitor`]**: End-to-end uptime probing and the aggregated uptime report.
//!
//! - **[`store`]**: `SQLite` persistence for validators, callers, request events and samples.
//!
//! - **[`metrics`]**: Prometheus metrics collection.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                        GatewayService                        │
//! │  ┌──────────────────┐  ┌──────────────────┐  ┌─────────────┐ │
//! │  │ RegistrationVer. │  │    Dispatcher    │  │ CallerAuth  │ │
//! │  │ WindowRateLimiter│  │      Router      │  │             │ │
//! │  └────────┬─────────┘  └────────┬─────────┘  └──────┬──────┘ │
//! │           │                     │                   │        │
//! │  ┌────────▼─────────┐  ┌────────▼─────────┐  ┌──────▼──────┐ │
//! │  │   PoolManager    │  │   TrustSource    │  │RegistryStore│ │
//! │  │    LivePool      │  │  (TrustResync)   │  │  (SQLite)   │ │
//! │  └──────────────────┘  └──────────────────┘  └─────────────┘ │
//! └──────────────────────────────────────────────────────────────┘
//!                 ▲
//!                 │ root token
//!          ┌──────┴───────┐
//!          │ UptimeMonitor│
//!          └──────────────┘
//! ```

pub mod auth;
pub mod client;
pub mod config;
pub mod errors;
pub mod metrics;
pub mod middleware;
pub mod monitor;
pub mod pool;
pub mod router;
pub mod service;
pub mod store;
pub mod trust;
pub mod types;
