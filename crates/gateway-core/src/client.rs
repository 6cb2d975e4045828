use reqwest::{Client, ClientBuilder};
use serde::Serialize;
use serde_json::Value;
use std::{sync::Arc, time::Duration};
use thiserror::Error;
use tokio::sync::Semaphore;

/// Header carrying the validator's stored freshness token on every forward.
pub const MESSAGE_HEADER: &str = "message";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ForwardError {
    #[error("request timed out")]
    Timeout,

    #[error("{0}")]
    Transport(String),

    #[error("validator returned HTTP {0}")]
    Status(u16),

    #[error("invalid validator response: {0}")]
    Decode(String),

    #[error("validator returned an empty result")]
    EmptyResult,

    #[error("outbound concurrency limit reached")]
    ConcurrencyLimit,
}

/// HTTP client for validator traffic: liveness probes and work forwarding.
///
/// Every call carries an explicit timeout, and a semaphore bounds the number of in-flight
/// requests across the process.
pub struct BackendClient {
    client: Client,
    permits: Arc<Semaphore>,
    permit_timeout: Duration,
}

impl BackendClient {
    /// # Errors
    ///
    /// Returns [`ForwardError::Transport`] if the underlying client fails to build.
    pub fn new(concurrent_limit: usize) -> Result<Self, ForwardError> {
        let client = ClientBuilder::new()
            .pool_idle_timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(5))
            .use_rustls_tls()
            .redirect(reqwest::redirect::Policy::none())
            .user_agent("validator-gateway/0.1.0")
            .tcp_nodelay(true)
            .build()
            .map_err(|e| {
                tracing::error!(error = %e, "failed to build http client");
                ForwardError::Transport(format!("HTTP client build failed: {e}"))
            })?;

        Ok(Self {
            client,
            permits: Arc::new(Semaphore::new(concurrent_limit.max(1))),
            permit_timeout: Duration::from_secs(5),
        })
    }

    /// `GET {endpoint}/health`; any 2xx within `timeout` counts as alive.
    ///
    /// # Errors
    ///
    /// Returns the transport, status or timeout failure.
    pub async fn probe(&self, endpoint: &str, timeout: Duration) -> Result<(), ForwardError> {
        let _permit = self.acquire().await?;

        let response = self
            .client
            .get(format!("{endpoint}/health"))
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| sanitize_network_error(&e))?;

        if !response.status().is_success() {
            return Err(ForwardError::Status(response.status().as_u16()));
        }
        Ok(())
    }

    /// `POST {endpoint}/forward` with the freshness token in the `message` header.
    ///
    /// # Errors
    ///
    /// Returns the transport, status, timeout or decode failure.
    pub async fn forward<T: Serialize + ?Sized>(
        &self,
        endpoint: &str,
        message: &str,
        payload: &T,
        timeout: Duration,
    ) -> Result<Value, ForwardError> {
        let _permit = self.acquire().await?;

        let response = self
            .client
            .post(format!("{endpoint}/forward"))
            .header(MESSAGE_HEADER, message)
            .json(payload)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| sanitize_network_error(&e))?;

        if !response.status().is_success() {
            return Err(ForwardError::Status(response.status().as_u16()));
        }

        response.json::<Value>().await.map_err(|e| ForwardError::Decode(e.to_string()))
    }

    async fn acquire(&self) -> Result<tokio::sync::OwnedSemaphorePermit, ForwardError> {
        tokio::time::timeout(self.permit_timeout, Arc::clone(&self.permits).acquire_owned())
            .await
            .map_err(|_| {
                tracing::warn!(
                    available_permits = self.permits.available_permits(),
                    "backend client semaphore acquisition timeout"
                );
                ForwardError::ConcurrencyLimit
            })?
            .map_err(|_| ForwardError::ConcurrencyLimit)
    }
}

/// Maps network errors to short messages that do not leak validator addresses.
fn sanitize_network_error(error: &reqwest::Error) -> ForwardError {
    if error.is_timeout() {
        ForwardError::Timeout
    } else if error.is_connect() {
        ForwardError::Transport("connection refused or unreachable".to_string())
    } else if error.is_body() || error.is_decode() {
        ForwardError::Transport("response body error".to_string())
    } else {
        ForwardError::Transport("network error".to_string())
    }
}
