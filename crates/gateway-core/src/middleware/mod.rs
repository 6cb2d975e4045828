//! Request admission components shared by the HTTP layer and background probes.

pub mod rate_limiting;

pub use rate_limiting::WindowRateLimiter;
