use super::Router;
use crate::{
    client::{BackendClient, ForwardError},
    config::{default_target_model, default_tier},
    errors::GatewayError,
    metrics,
    types::{compressed_context, ChatMessage, CompressMessagesRequest, FailurePolicy, OrganicRequest},
};
use futures::future::join_all;
use serde_json::Value;
use std::{
    sync::Arc,
    time::{Duration, Instant},
};
use tracing::{debug, error, warn};

/// Retry budget for batch items.
#[derive(Debug, Clone, Copy)]
pub struct BatchPolicy {
    pub max_attempts: u32,
    pub retry_delay: Duration,
}

impl Default for BatchPolicy {
    fn default() -> Self {
        Self { max_attempts: 3, retry_delay: Duration::from_secs(1) }
    }
}

/// Result of a batch dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchOutcome {
    /// Result messages in input order, minus dropped items.
    pub messages: Vec<ChatMessage>,
    /// Items compressed or passed through.
    pub succeeded: usize,
    /// Items that exhausted every attempt.
    pub failed: usize,
}

enum ItemOutcome {
    Compressed(ChatMessage),
    Passthrough(ChatMessage),
    Failed(ChatMessage),
}

/// Forwards work to validators chosen by the [`Router`].
pub struct Dispatcher {
    router: Router,
    client: Arc<BackendClient>,
    forward_timeout: Duration,
    batch: BatchPolicy,
}

impl Dispatcher {
    #[must_use]
    pub fn new(
        router: Router,
        client: Arc<BackendClient>,
        forward_timeout: Duration,
        batch: BatchPolicy,
    ) -> Self {
        Self { router, client, forward_timeout, batch }
    }

    #[must_use]
    pub fn router(&self) -> &Router {
        &self.router
    }

    /// Forwards one request to one validator. No retry at this layer.
    ///
    /// # Errors
    ///
    /// - [`GatewayError::NoBackendsAvailable`] if no validator is eligible
    /// - [`GatewayError::Forwarding`] on transport failure, timeout or non-2xx status
    pub async fn forward(&self, request: &OrganicRequest) -> Result<Value, GatewayError> {
        let backend = self.router.select()?;
        debug!(identity = %backend.identity, endpoint = %backend.endpoint, "forwarding organic request");

        let started = Instant::now();
        let result =
            self.client.forward(&backend.endpoint, &backend.message, request, self.forward_timeout).await;
        metrics::record_forward(result.is_ok(), started.elapsed());

        result.map_err(|e| {
            error!(identity = %backend.identity, error = %e, "organic_request_forwarding_error");
            GatewayError::from(e)
        })
    }

    /// Compresses every eligible message concurrently.
    ///
    /// System messages, empty messages, and roles excluded by the request pass through
    /// unchanged. Each remaining message gets up to `max_attempts` forwards, each to a fresh
    /// draw, with `retry_delay` between them. An attempt succeeds only if the validator
    /// returns a non-empty `compressed_context`. Exhausted messages are dropped or kept
    /// verbatim per `on_failure`.
    ///
    /// # Errors
    ///
    /// - [`GatewayError::Validation`] for an empty message list
    /// - [`GatewayError::NoBackendsAvailable`] if work is pending and no validator is eligible
    /// - [`GatewayError::AllAttemptsFailed`] if no message succeeded
    pub async fn dispatch_batch(
        &self,
        request: &CompressMessagesRequest,
    ) -> Result<BatchOutcome, GatewayError> {
        if request.messages.is_empty() {
            return Err(GatewayError::Validation("No messages provided".to_string()));
        }

        if request.messages.iter().any(|m| request.should_compress(m))
            && self.router.candidates().is_empty()
        {
            return Err(GatewayError::NoBackendsAvailable);
        }

        let items = request.messages.iter().map(|message| async move {
            if !request.should_compress(message) {
                return ItemOutcome::Passthrough(message.clone());
            }

            let work = OrganicRequest {
                context: message.content.clone(),
                tier: default_tier(),
                target_model: default_target_model(),
                miner_uid: request.miner_uid,
                top_incentive: request.top_node_performance,
            };

            match self.compress_with_retry(&work).await {
                Some(content) => {
                    ItemOutcome::Compressed(ChatMessage { role: message.role.clone(), content })
                }
                None => ItemOutcome::Failed(message.clone()),
            }
        });

        let mut outcome = BatchOutcome { messages: Vec::new(), succeeded: 0, failed: 0 };
        for item in join_all(items).await {
            match item {
                ItemOutcome::Compressed(message) => {
                    metrics::record_batch_item("compressed");
                    outcome.succeeded += 1;
                    outcome.messages.push(message);
                }
                ItemOutcome::Passthrough(message) => {
                    metrics::record_batch_item("passthrough");
                    outcome.succeeded += 1;
                    outcome.messages.push(message);
                }
                ItemOutcome::Failed(message) => {
                    outcome.failed += 1;
                    match request.on_failure {
                        FailurePolicy::Drop => metrics::record_batch_item("dropped"),
                        FailurePolicy::KeepOriginal => {
                            metrics::record_batch_item("kept_original");
                            outcome.messages.push(message);
                        }
                    }
                }
            }
        }

        if outcome.succeeded == 0 {
            return Err(GatewayError::AllAttemptsFailed);
        }
        Ok(outcome)
    }

    /// Compresses a single text, returning the original when every attempt fails.
    ///
    /// The boolean is `true` when the text was actually compressed.
    pub async fn compress_text(&self, text: &str, top_incentive: f64) -> (String, bool) {
        if text.is_empty() {
            return (String::new(), false);
        }

        let work = OrganicRequest {
            context: text.to_string(),
            tier: default_tier(),
            target_model: default_target_model(),
            miner_uid: crate::types::ANY_MINER,
            top_incentive,
        };

        match self.compress_with_retry(&work).await {
            Some(compressed) => (compressed, true),
            None => (text.to_string(), false),
        }
    }

    async fn compress_with_retry(&self, work: &OrganicRequest) -> Option<String> {
        let attempts = self.batch.max_attempts.max(1);

        for attempt in 1..=attempts {
            match self.compress_once(work).await {
                Ok(content) => return Some(content),
                Err(e) => {
                    warn!(attempt, max_attempts = attempts, error = %e, "compression attempt failed");
                    if attempt < attempts {
                        tokio::time::sleep(self.batch.retry_delay).await;
                    }
                }
            }
        }

        error!(max_attempts = attempts, "failed to compress message after all attempts");
        None
    }

    async fn compress_once(&self, work: &OrganicRequest) -> Result<String, GatewayError> {
        let result = self.forward(work).await?;
        compressed_context(&result)
            .map(str::to_string)
            .ok_or_else(|| GatewayError::from(ForwardError::EmptyResult))
    }
}
