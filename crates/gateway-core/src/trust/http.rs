use super::{signature::verify_ed25519, TrustError, TrustSource};
use crate::config::TrustConfig;
use arc_swap::ArcSwap;
use async_trait::async_trait;
use reqwest::{Client, ClientBuilder};
use serde::Deserialize;
use std::{collections::HashMap, sync::Arc, time::Duration};
use tracing::{debug, info};

#[derive(Debug, Deserialize)]
struct RosterResponse {
    neurons: Vec<RosterEntry>,
}

#[derive(Debug, Deserialize)]
struct RosterEntry {
    hotkey: String,
    stake: f64,
}

/// [`TrustSource`] backed by an HTTP roster service.
///
/// The stake table is an immutable snapshot swapped in whole on every successful resync,
/// so request paths keep serving the last good table while a refresh is failing.
pub struct HttpTrustSource {
    client: Client,
    config: TrustConfig,
    stakes: ArcSwap<HashMap<String, f64>>,
}

impl HttpTrustSource {
    /// # Errors
    ///
    /// Returns [`TrustError::Fetch`] if the HTTP client cannot be built.
    pub fn new(config: TrustConfig) -> Result<Self, TrustError> {
        let client = ClientBuilder::new()
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(config.request_timeout_seconds))
            .use_rustls_tls()
            .user_agent("validator-gateway/0.1.0")
            .build()
            .map_err(|e| TrustError::Fetch(format!("HTTP client build failed: {e}")))?;

        Ok(Self { client, config, stakes: ArcSwap::from_pointee(HashMap::new()) })
    }

    /// Number of identities in the current table.
    #[must_use]
    pub fn roster_size(&self) -> usize {
        self.stakes.load().len()
    }

    async fn fetch_roster(&self) -> Result<HashMap<String, f64>, TrustError> {
        let mut request = self.client.get(&self.config.roster_url).query(&[
            ("netuid", self.config.netuid.to_string()),
            ("network", self.config.network.clone()),
        ]);
        if let Some(api_key) = &self.config.api_key {
            request = request.header(reqwest::header::AUTHORIZATION, api_key);
        }

        let response = request.send().await.map_err(|e| TrustError::Fetch(sanitize(&e)))?;
        if !response.status().is_success() {
            return Err(TrustError::Status(response.status().as_u16()));
        }

        let roster: RosterResponse =
            response.json().await.map_err(|e| TrustError::Decode(e.to_string()))?;

        Ok(roster.neurons.into_iter().map(|n| (n.hotkey, n.stake)).collect())
    }
}

fn sanitize(error: &reqwest::Error) -> String {
    if error.is_connect() {
        "connection refused or unreachable".to_string()
    } else if error.is_timeout() {
        "connection timed out".to_string()
    } else {
        "network error".to_string()
    }
}

#[async_trait]
impl TrustSource for HttpTrustSource {
    fn verify(&self, identity: &str, message: &[u8], signature: &str) -> bool {
        verify_ed25519(identity, message, signature)
    }

    fn stake_of(&self, identity: &str) -> Option<f64> {
        self.stakes.load().get(identity).copied()
    }

    async fn resync(&self) -> Result<usize, TrustError> {
        let table = self.fetch_roster().await?;
        let count = table.len();
        self.stakes.store(Arc::new(table));

        debug!(netuid = self.config.netuid, network = %self.config.network, "roster fetched");
        info!(count, "trust_roster_resynced");
        Ok(count)
    }
}
