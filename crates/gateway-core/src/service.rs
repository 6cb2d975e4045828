//! Request-level orchestration shared by the HTTP handlers and the uptime monitor.
//!
//! ```text
//!   organic / compress                       register
//!   ==================                       ========
//!   CallerAuth::authenticate                 RegistrationVerifier::verify
//!         │ 403                                    │ 401
//!   validate payload                         allowlist
//!         │ 400                                    │ 403
//!   WindowRateLimiter::admit                 PoolManager::register_or_update
//!         │ 429                                    │ 500
//!   restrict (non-root) + Dispatcher         live immediately
//!         │ 503
//! ```

use crate::{
    auth::{AuthError, CallerAuth, CallerKind, RegistrationVerifier, RootCredential},
    client::BackendClient,
    config::AppConfig,
    errors::GatewayError,
    metrics,
    middleware::WindowRateLimiter,
    monitor,
    pool::PoolManager,
    router::{BatchOutcome, BatchPolicy, Dispatcher, Router},
    store::{RegistryStore, StoreError},
    trust::TrustSource,
    types::{
        BackendRecord, CompressMessagesRequest, CompressTextRequest, OrganicRequest, UptimeReport,
    },
};
use serde_json::Value;
use std::sync::Arc;
use tracing::{info, warn};

pub struct GatewayService {
    store: Arc<dyn RegistryStore>,
    verifier: RegistrationVerifier,
    callers: CallerAuth,
    limiter: WindowRateLimiter,
    pool: Arc<PoolManager>,
    dispatcher: Dispatcher,
    max_context_chars: usize,
    recent_samples: u32,
}

impl GatewayService {
    #[must_use]
    pub fn new(
        config: &AppConfig,
        store: Arc<dyn RegistryStore>,
        trust: Arc<dyn TrustSource>,
        client: Arc<BackendClient>,
    ) -> Self {
        let root = RootCredential::new(config.auth.root_api_key.clone());

        let pool = Arc::new(PoolManager::new(
            store.clone(),
            client.clone(),
            config.probe_timeout(),
            config.pool_refresh_interval(),
        ));

        let router = Router::new(
            pool.live_pool(),
            trust.clone(),
            config.pool.min_stake,
            config.pool.allowlist.iter().cloned(),
        );

        let dispatcher = Dispatcher::new(
            router,
            client,
            config.forward_timeout(),
            BatchPolicy {
                max_attempts: config.router.batch_max_attempts,
                retry_delay: config.batch_retry_delay(),
            },
        );

        Self {
            verifier: RegistrationVerifier::new(trust, config.max_nonce_age()),
            callers: CallerAuth::new(
                store.clone(),
                root.clone(),
                config.auth.admin_api_key.clone(),
            ),
            limiter: WindowRateLimiter::new(
                store.clone(),
                config.rate_limit.limit,
                config.rate_window(),
                root,
            ),
            store,
            pool,
            dispatcher,
            max_context_chars: config.router.max_context_chars,
            recent_samples: config.uptime.recent_samples,
        }
    }

    #[must_use]
    pub fn pool_manager(&self) -> Arc<PoolManager> {
        self.pool.clone()
    }

    #[must_use]
    pub fn store(&self) -> Arc<dyn RegistryStore> {
        self.store.clone()
    }

    #[must_use]
    pub fn live_backends(&self) -> usize {
        self.pool.live_pool().len()
    }

    /// Authenticates and records a validator self-registration.
    ///
    /// # Errors
    ///
    /// - [`GatewayError::Replay`] / [`GatewayError::Authentication`] from verification
    /// - [`GatewayError::Authorization`] if the validator is outside the allowlist
    /// - [`GatewayError::Store`] if the write fails
    pub async fn register_backend(
        &self,
        identity: &str,
        message: &str,
        signature: &str,
        ip_address: &str,
        port: u16,
    ) -> Result<BackendRecord, GatewayError> {
        let verified = self.verifier.verify(identity, message, signature).inspect_err(|e| {
            metrics::record_registration("rejected");
            warn!(identity, error = %e, "validator_authentication_failed");
        })?;

        if !self.dispatcher.router().is_allowed(&verified.identity) {
            metrics::record_registration("not_allowlisted");
            warn!(identity, "validator_not_in_whitelist");
            return Err(AuthError::NotAllowlisted(verified.identity).into());
        }

        let record =
            BackendRecord::new(verified.identity, ip_address, port, verified.freshness_token);
        self.pool.register_or_update(record.clone()).await?;

        metrics::record_registration("success");
        info!(identity = %record.identity, port, "validator_registered");
        Ok(record)
    }

    /// Registers a new caller credential on behalf of the admin.
    ///
    /// # Errors
    ///
    /// - [`GatewayError::Authorization`] for a bad admin credential
    /// - [`GatewayError::Validation`] for a missing or duplicate key
    pub async fn register_caller(
        &self,
        admin_token: &str,
        api_key: Option<&str>,
    ) -> Result<(), GatewayError> {
        self.callers.check_admin(admin_token)?;

        let api_key = api_key
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .ok_or_else(|| GatewayError::Validation("API key required".to_string()))?;

        self.store.insert_caller(api_key).await.map_err(|e| match e {
            StoreError::Duplicate(_) => {
                GatewayError::Validation("API key already exists".to_string())
            }
            other => other.into(),
        })?;
        info!("user_api_key_registered");
        Ok(())
    }

    /// Resolves the caller and charges one request against its rate limit.
    ///
    /// # Errors
    ///
    /// - [`GatewayError::Authorization`] for an unknown caller
    /// - [`GatewayError::RateLimitExceeded`] when the window is full
    pub async fn admit_caller(&self, token: &str) -> Result<CallerKind, GatewayError> {
        let kind = self.callers.authenticate(token).await?;
        self.charge(token).await?;
        Ok(kind)
    }

    /// Records one request against the caller's window. Runs only after the payload is
    /// known to be valid, so a rejected body never costs budget.
    async fn charge(&self, token: &str) -> Result<(), GatewayError> {
        if !self.limiter.admit(token).await? {
            metrics::record_rate_limited();
            return Err(GatewayError::RateLimitExceeded);
        }
        Ok(())
    }

    /// Full organic path: caller auth, validation, rate limit, restriction, one forward.
    ///
    /// # Errors
    ///
    /// Any [`GatewayError`] from the steps above or from [`Dispatcher::forward`].
    pub async fn process_organic(
        &self,
        token: &str,
        mut request: OrganicRequest,
    ) -> Result<Value, GatewayError> {
        let kind = self.callers.authenticate(token).await?;
        request.validate(self.max_context_chars)?;
        self.charge(token).await?;

        if kind != CallerKind::Root {
            request.restrict_for_caller();
        }

        self.dispatcher.forward(&request).await
    }

    /// Batch message compression, charged as a single request.
    ///
    /// # Errors
    ///
    /// Any [`GatewayError`] from admission or [`Dispatcher::dispatch_batch`].
    pub async fn compress_messages(
        &self,
        token: &str,
        mut request: CompressMessagesRequest,
    ) -> Result<BatchOutcome, GatewayError> {
        if request.messages.is_empty() {
            return Err(GatewayError::Validation("No messages provided".to_string()));
        }

        let kind = self.callers.authenticate(token).await?;

        if let Some(oversized) =
            request.messages.iter().find(|m| m.content.chars().count() >= self.max_context_chars)
        {
            return Err(GatewayError::Validation(format!(
                "message content must be less than {} characters (got {})",
                self.max_context_chars,
                oversized.content.chars().count()
            )));
        }
        self.charge(token).await?;

        if kind != CallerKind::Root {
            request.miner_uid = crate::types::ANY_MINER;
            request.top_node_performance =
                request.top_node_performance.max(crate::types::MIN_CALLER_INCENTIVE);
        }

        let outcome = self.dispatcher.dispatch_batch(&request).await?;
        info!(succeeded = outcome.succeeded, failed = outcome.failed, "messages_compressed");
        Ok(outcome)
    }

    /// Single-text compression; falls back to the original text when every attempt fails.
    ///
    /// # Errors
    ///
    /// Any [`GatewayError`] from admission or validation.
    pub async fn compress_text(
        &self,
        token: &str,
        request: CompressTextRequest,
    ) -> Result<(String, bool), GatewayError> {
        let kind = self.callers.authenticate(token).await?;

        let chars = request.text.chars().count();
        if chars >= self.max_context_chars {
            return Err(GatewayError::Validation(format!(
                "text must be less than {} characters (got {chars})",
                self.max_context_chars
            )));
        }
        self.charge(token).await?;

        let incentive = if kind == CallerKind::Root {
            request.top_node_performance
        } else {
            request.top_node_performance.max(crate::types::MIN_CALLER_INCENTIVE)
        };

        Ok(self.dispatcher.compress_text(&request.text, incentive).await)
    }

    /// # Errors
    ///
    /// Returns [`GatewayError::Store`] if the samples cannot be read.
    pub async fn uptime_report(&self) -> Result<UptimeReport, GatewayError> {
        Ok(monitor::uptime_report(self.store.as_ref(), self.recent_samples).await?)
    }
}
