use super::AuthError;
use crate::store::RegistryStore;
use std::sync::Arc;
use subtle::ConstantTimeEq;

/// Resolved class of a client credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallerKind {
    /// The configured root credential: no rate limit, request overrides allowed.
    Root,
    /// A credential registered through `/api/user-register`.
    Registered,
}

/// The configured root credential, compared in constant time. An empty token counts as none.
#[derive(Debug, Clone, Default)]
pub struct RootCredential(Option<String>);

impl RootCredential {
    #[must_use]
    pub fn new(token: Option<String>) -> Self {
        Self(token.filter(|t| !t.is_empty()))
    }

    #[must_use]
    pub fn matches(&self, token: &str) -> bool {
        self.0.as_deref().is_some_and(|root| constant_time_eq(root, token))
    }
}

/// Resolves client and admin credentials.
pub struct CallerAuth {
    store: Arc<dyn RegistryStore>,
    root: RootCredential,
    admin_token: String,
}

impl CallerAuth {
    #[must_use]
    pub fn new(
        store: Arc<dyn RegistryStore>,
        root: RootCredential,
        admin_token: impl Into<String>,
    ) -> Self {
        Self { store, root, admin_token: admin_token.into() }
    }

    #[must_use]
    pub fn is_root(&self, token: &str) -> bool {
        self.root.matches(token)
    }

    /// # Errors
    ///
    /// - [`AuthError::UnknownCaller`] if the credential is not registered
    /// - [`AuthError::Store`] if the lookup fails
    pub async fn authenticate(&self, token: &str) -> Result<CallerKind, AuthError> {
        if self.is_root(token) {
            return Ok(CallerKind::Root);
        }

        if token.is_empty() || !self.store.caller_exists(token).await? {
            return Err(AuthError::UnknownCaller);
        }

        Ok(CallerKind::Registered)
    }

    /// # Errors
    ///
    /// Returns [`AuthError::InvalidAdminCredential`] on mismatch or when no admin credential
    /// is configured.
    pub fn check_admin(&self, presented: &str) -> Result<(), AuthError> {
        if self.admin_token.is_empty() || !constant_time_eq(&self.admin_token, presented) {
            return Err(AuthError::InvalidAdminCredential);
        }
        Ok(())
    }
}

fn constant_time_eq(expected: &str, presented: &str) -> bool {
    expected.as_bytes().ct_eq(presented.as_bytes()).into()
}
