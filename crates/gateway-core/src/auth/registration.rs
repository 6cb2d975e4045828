use super::AuthError;
use crate::trust::TrustSource;
use std::{
    sync::Arc,
    time::{Duration, SystemTime, UNIX_EPOCH},
};

/// Outcome of a successful registration check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedRegistration {
    pub identity: String,
    /// The token half of `"<token>:<nonce>"`, stored and echoed back on forwards.
    pub freshness_token: String,
}

/// Verifies validator self-registration: signature validity plus nonce freshness.
///
/// Stateless apart from the injected [`TrustSource`].
pub struct RegistrationVerifier {
    trust: Arc<dyn TrustSource>,
    max_nonce_age: Duration,
}

impl RegistrationVerifier {
    #[must_use]
    pub fn new(trust: Arc<dyn TrustSource>, max_nonce_age: Duration) -> Self {
        Self { trust, max_nonce_age }
    }

    /// # Errors
    ///
    /// See [`verify_at`](Self::verify_at).
    pub fn verify(
        &self,
        identity: &str,
        message: &str,
        signature: &str,
    ) -> Result<VerifiedRegistration, AuthError> {
        self.verify_at(identity, message, signature, now_nanos())
    }

    /// Verifies a registration against an explicit clock, in Unix nanoseconds.
    ///
    /// Freshness is checked first, so a stale nonce is reported as such even when the
    /// signature is also bad. Nonces more than the skew ahead of `now_ns` are rejected too.
    ///
    /// # Errors
    ///
    /// - [`AuthError::MalformedMessage`] if `message` is not `"<token>:<integer nonce>"`
    /// - [`AuthError::StaleNonce`] if the nonce is outside the freshness window
    /// - [`AuthError::InvalidSignature`] if the signature does not verify
    pub fn verify_at(
        &self,
        identity: &str,
        message: &str,
        signature: &str,
        now_ns: i128,
    ) -> Result<VerifiedRegistration, AuthError> {
        let (token, nonce) = parse_message(message)?;

        let age_ns = now_ns - nonce;
        if age_ns.unsigned_abs() > self.max_nonce_age.as_nanos() {
            #[allow(clippy::cast_precision_loss)]
            let age_seconds = age_ns as f64 / 1e9;
            return Err(AuthError::StaleNonce { age_seconds });
        }

        if !self.trust.verify(identity, message.as_bytes(), signature) {
            return Err(AuthError::InvalidSignature);
        }

        Ok(VerifiedRegistration {
            identity: identity.to_string(),
            freshness_token: token.to_string(),
        })
    }
}

fn parse_message(message: &str) -> Result<(&str, i128), AuthError> {
    let mut parts = message.split(':');
    let (Some(token), Some(nonce), None) = (parts.next(), parts.next(), parts.next()) else {
        return Err(AuthError::MalformedMessage("expected '<token>:<nonce>'".to_string()));
    };

    let nonce = nonce
        .trim()
        .parse::<i128>()
        .map_err(|_| AuthError::MalformedMessage("nonce is not an integer".to_string()))?;

    Ok((token, nonce))
}

/// Current time as Unix nanoseconds.
#[must_use]
pub fn now_nanos() -> i128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| i128::try_from(d.as_nanos()).unwrap_or(i128::MAX))
}
