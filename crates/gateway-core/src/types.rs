use crate::errors::GatewayError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Non-root callers never get a floor below this value.
pub const MIN_CALLER_INCENTIVE: f64 = 0.2;

/// `miner_uid` value meaning "let the validator choose".
pub const ANY_MINER: i64 = -1;

/// A validator's durable registration.
///
/// `identity` is the primary key; `endpoint` is unique across records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendRecord {
    pub identity: String,
    pub ip_address: String,
    pub port: u16,
    pub endpoint: String,
    /// Freshness token presented on the last successful registration; sent back to the
    /// validator in the `message` header on every forward.
    pub message: String,
}

impl BackendRecord {
    #[must_use]
    pub fn new(
        identity: impl Into<String>,
        ip_address: impl Into<String>,
        port: u16,
        message: impl Into<String>,
    ) -> Self {
        let ip_address = ip_address.into();
        let endpoint = endpoint_for(&ip_address, port);
        Self { identity: identity.into(), ip_address, port, endpoint, message: message.into() }
    }
}

/// Builds `http://host:port`, bracketing IPv6 literals.
#[must_use]
pub fn endpoint_for(ip_address: &str, port: u16) -> String {
    if ip_address.contains(':') && !ip_address.starts_with('[') {
        format!("http://[{ip_address}]:{port}")
    } else {
        format!("http://{ip_address}:{port}")
    }
}

/// Body of `POST /register`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterPayload {
    pub port: u16,
}

/// A unit of client work forwarded to one validator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrganicRequest {
    pub context: String,
    pub tier: String,
    pub target_model: String,
    #[serde(default = "default_miner_uid")]
    pub miner_uid: i64,
    #[serde(default = "default_organic_incentive")]
    pub top_incentive: f64,
}

fn default_miner_uid() -> i64 {
    ANY_MINER
}

fn default_organic_incentive() -> f64 {
    0.9
}

impl OrganicRequest {
    /// Rejects contexts of `max_context_chars` characters or more.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Validation`] when the context is too long.
    pub fn validate(&self, max_context_chars: usize) -> Result<(), GatewayError> {
        let chars = self.context.chars().count();
        if chars >= max_context_chars {
            return Err(GatewayError::Validation(format!(
                "context must be less than {max_context_chars} characters (got {chars})"
            )));
        }
        Ok(())
    }

    /// Applies the overrides allowed only to the root caller.
    pub fn restrict_for_caller(&mut self) {
        self.miner_uid = ANY_MINER;
        self.top_incentive = self.top_incentive.max(MIN_CALLER_INCENTIVE);
    }
}

/// Chat message carried by `/api/v1/compress/messages`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    #[serde(default)]
    pub content: String,
}

/// What to do with a batch item once every attempt has failed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Remove the item from the result set.
    #[default]
    Drop,
    /// Return the item with its original content.
    KeepOriginal,
}

/// Body of `POST /api/v1/compress/messages`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompressMessagesRequest {
    pub messages: Vec<ChatMessage>,
    #[serde(default = "default_true")]
    pub compress_user: bool,
    #[serde(default = "default_true")]
    pub compress_assistant: bool,
    #[serde(default = "default_batch_incentive", alias = "top_incentive")]
    pub top_node_performance: f64,
    #[serde(default = "default_miner_uid")]
    pub miner_uid: i64,
    #[serde(default)]
    pub on_failure: FailurePolicy,
}

fn default_true() -> bool {
    true
}

fn default_batch_incentive() -> f64 {
    0.4
}

impl CompressMessagesRequest {
    /// Whether a message is sent to a validator or passed through untouched.
    #[must_use]
    pub fn should_compress(&self, message: &ChatMessage) -> bool {
        if message.content.is_empty() {
            return false;
        }
        match message.role.as_str() {
            "system" => false,
            "user" => self.compress_user,
            "assistant" => self.compress_assistant,
            _ => true,
        }
    }
}

/// Body of `POST /api/v1/compress/text`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompressTextRequest {
    pub text: String,
    #[serde(default = "default_text_incentive")]
    pub top_node_performance: f64,
}

fn default_text_incentive() -> f64 {
    0.1
}

/// One synthetic probe outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UptimeSample {
    pub timestamp: DateTime<Utc>,
    pub is_success: bool,
}

/// Aggregate served by `GET /api/organic/uptime`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UptimeReport {
    pub total_checks: u64,
    pub successful_checks: u64,
    pub uptime_percentage: f64,
    pub recent_status: Vec<UptimeSample>,
    pub last_failed_timestamp: Option<DateTime<Utc>>,
}

/// Returns `true` when a validator result carries a non-empty `compressed_context`.
#[must_use]
pub fn has_compressed_context(result: &serde_json::Value) -> bool {
    compressed_context(result).is_some()
}

/// Extracts a non-empty `compressed_context` from a validator result.
#[must_use]
pub fn compressed_context(result: &serde_json::Value) -> Option<&str> {
    result.get("compressed_context").and_then(serde_json::Value::as_str).filter(|s| !s.is_empty())
}
