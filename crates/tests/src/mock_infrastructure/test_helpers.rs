//! Test helper functions and fixtures.

use crate::mock_infrastructure::StakeTable;
use ed25519_dalek::{Signer, SigningKey};
use gateway_core::{
    auth::registration::now_nanos,
    client::BackendClient,
    config::AppConfig,
    pool::LivePool,
    router::{BatchPolicy, Dispatcher, Router},
    service::GatewayService,
    store::SqliteStore,
    types::{ChatMessage, CompressMessagesRequest, FailurePolicy, ANY_MINER},
};
use std::{sync::Arc, time::Duration};

pub const ADMIN_KEY: &str = "test-admin-key";
pub const ROOT_KEY: &str = "test-root-key";

/// Deterministic ed25519 validator identity.
pub struct TestValidatorKey {
    signing: SigningKey,
    pub identity: String,
}

impl TestValidatorKey {
    #[must_use]
    pub fn new(seed: u8) -> Self {
        let signing = SigningKey::from_bytes(&[seed; 32]);
        let identity = hex::encode(signing.verifying_key().to_bytes());
        Self { signing, identity }
    }

    /// `(message, signature)` for `"<token>:<nonce_ns>"`.
    #[must_use]
    pub fn sign_registration(&self, token: &str, nonce_ns: i128) -> (String, String) {
        let message = format!("{token}:{nonce_ns}");
        let signature = hex::encode(self.signing.sign(message.as_bytes()).to_bytes());
        (message, signature)
    }

    #[must_use]
    pub fn fresh_registration(&self, token: &str) -> (String, String) {
        self.sign_registration(token, now_nanos())
    }
}

/// Config with test credentials, fast batch retries and uptime disabled.
#[must_use]
pub fn test_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.auth.admin_api_key = ADMIN_KEY.to_string();
    config.auth.root_api_key = Some(ROOT_KEY.to_string());
    config.router.batch_retry_delay_ms = 10;
    config.router.forward_timeout_seconds = 5;
    config.pool.probe_timeout_seconds = 1;
    config.uptime.enabled = false;
    config
}

/// Fully wired service over an in-memory store.
///
/// # Panics
///
/// Panics if the in-memory store or HTTP client cannot be created.
#[allow(clippy::expect_used)]
pub async fn create_test_service(config: &AppConfig, trust: StakeTable) -> Arc<GatewayService> {
    let store = Arc::new(SqliteStore::in_memory().await.expect("in-memory store"));
    let client = Arc::new(BackendClient::new(64).expect("http client"));
    Arc::new(GatewayService::new(config, store, Arc::new(trust), client))
}

/// Dispatcher over a fixed live pool, bypassing registration.
///
/// # Panics
///
/// Panics if the HTTP client cannot be created.
#[allow(clippy::expect_used)]
#[must_use]
pub fn create_test_dispatcher(
    pool: Arc<LivePool>,
    trust: StakeTable,
    max_attempts: u32,
) -> Dispatcher {
    let router = Router::new(pool, Arc::new(trust), 1000.0, Vec::new());
    let client = Arc::new(BackendClient::new(64).expect("http client"));
    Dispatcher::new(
        router,
        client,
        Duration::from_secs(5),
        BatchPolicy { max_attempts, retry_delay: Duration::from_millis(10) },
    )
}

#[must_use]
pub fn user_message(content: &str) -> ChatMessage {
    ChatMessage { role: "user".to_string(), content: content.to_string() }
}

#[must_use]
pub fn batch_request(messages: Vec<ChatMessage>, on_failure: FailurePolicy) -> CompressMessagesRequest {
    CompressMessagesRequest {
        messages,
        compress_user: true,
        compress_assistant: true,
        top_node_performance: 0.4,
        miner_uid: ANY_MINER,
        on_failure,
    }
}
