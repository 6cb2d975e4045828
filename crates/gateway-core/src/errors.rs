use crate::{auth::AuthError, router::ForwardError, store::StoreError, trust::TrustError};
use thiserror::Error;

/// Errors surfaced by gateway operations.
///
/// Each variant corresponds to one client-visible failure class; the HTTP layer maps them
/// to status codes.
#[derive(Error, Debug)]
pub enum GatewayError {
    /// Bad signature or malformed registration message.
    #[error("{0}")]
    Authentication(String),

    /// Registration nonce outside the freshness window.
    #[error("{0}")]
    Replay(String),

    /// Unknown caller, bad admin credential, or validator outside the allowlist.
    #[error("{0}")]
    Authorization(String),

    /// Request rejected before dispatch (oversized, empty, duplicate).
    #[error("{0}")]
    Validation(String),

    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    #[error("No validators available")]
    NoBackendsAvailable,

    #[error("Forwarding Error: {0}")]
    Forwarding(String),

    /// Every item of a batch exhausted its attempts.
    #[error("Failed to compress any messages")]
    AllAttemptsFailed,

    #[error("Store error: {0}")]
    Store(StoreError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<StoreError> for GatewayError {
    fn from(err: StoreError) -> Self {
        GatewayError::Store(err)
    }
}

impl From<AuthError> for GatewayError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InvalidSignature | AuthError::MalformedMessage(_) => {
                GatewayError::Authentication(err.to_string())
            }
            AuthError::StaleNonce { .. } => GatewayError::Replay(err.to_string()),
            AuthError::UnknownCaller |
            AuthError::InvalidAdminCredential |
            AuthError::NotAllowlisted(_) => GatewayError::Authorization(err.to_string()),
            AuthError::Store(store) => store.into(),
        }
    }
}

impl From<ForwardError> for GatewayError {
    fn from(err: ForwardError) -> Self {
        GatewayError::Forwarding(err.to_string())
    }
}

impl From<TrustError> for GatewayError {
    fn from(err: TrustError) -> Self {
        GatewayError::Internal(err.to_string())
    }
}
