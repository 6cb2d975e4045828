//! Registration and caller authentication.
//!
//! Two independent credentials guard the gateway:
//!
//! ```text
//!   Validator                                   Client
//!   =========                                   ======
//!
//!   message: "<token>:<nonce_ns>"               user-api-key: <opaque>
//!   ss58_address: <identity>                          │
//!   signature: <hex>                                  ├──> root token? ──> admitted
//!        │                                            │
//!        ├──> nonce age <= max skew                   └──> users lookup ──> admitted / 403
//!        │      (else ReplayError, 401)
//!        │
//!        └──> TrustSource::verify
//!               (else AuthenticationError, 401)
//! ```
//!
//! - [`registration::RegistrationVerifier`] checks validator self-registration.
//! - [`caller::CallerAuth`] resolves client credentials and the admin credential.

pub mod caller;
pub mod registration;

pub use caller::{CallerAuth, CallerKind, RootCredential};
pub use registration::{RegistrationVerifier, VerifiedRegistration};

use crate::store::StoreError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Invalid token")]
    InvalidSignature,

    #[error("Invalid message: {0}")]
    MalformedMessage(String),

    #[error("Invalid nonce, too old: {age_seconds:.3}s")]
    StaleNonce { age_seconds: f64 },

    #[error("Unauthorized")]
    UnknownCaller,

    #[error("Unauthorized")]
    InvalidAdminCredential,

    #[error("Validator not in whitelist: {0}")]
    NotAllowlisted(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}
