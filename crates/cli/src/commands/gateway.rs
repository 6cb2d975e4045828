use super::utils::{print_success, CliError, CliResult};
use gateway_core::types::{OrganicRequest, ANY_MINER};
use serde_json::{json, Value};
use std::time::Duration;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Thin HTTP client for the gateway's caller-facing endpoints.
pub struct GatewayClient {
    http: reqwest::Client,
    api_url: String,
}

impl GatewayClient {
    /// # Errors
    ///
    /// Returns [`CliError::Network`] if the HTTP client cannot be built.
    pub fn new(api_url: &str) -> CliResult<Self> {
        let http = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self { http, api_url: api_url.trim_end_matches('/').to_string() })
    }

    /// # Errors
    ///
    /// Returns [`CliError::Rejected`] for any non-2xx answer.
    pub async fn register_user(&self, admin_api_key: &str, api_key: &str) -> CliResult<Value> {
        let response = self
            .http
            .post(format!("{}/api/user-register", self.api_url))
            .header("admin-api-key", admin_api_key)
            .json(&json!({ "api_key": api_key }))
            .send()
            .await?;
        read_json(response).await
    }

    /// # Errors
    ///
    /// Returns [`CliError::Rejected`] for any non-2xx answer.
    pub async fn organic(&self, api_key: &str, request: &OrganicRequest) -> CliResult<Value> {
        let response = self
            .http
            .post(format!("{}/api/organic", self.api_url))
            .header("user-api-key", api_key)
            .json(request)
            .send()
            .await?;
        read_json(response).await
    }
}

async fn read_json(response: reqwest::Response) -> CliResult<Value> {
    let status = response.status();
    let body = response.text().await?;

    if !status.is_success() {
        let detail = serde_json::from_str::<Value>(&body)
            .ok()
            .and_then(|v| v.get("detail").and_then(Value::as_str).map(str::to_string))
            .unwrap_or(body);
        return Err(CliError::Rejected { status: status.as_u16(), detail });
    }

    Ok(serde_json::from_str(&body)?)
}

/// # Errors
///
/// Propagates any [`CliError`] from the request.
pub async fn register_user(api_url: &str, admin_api_key: &str, api_key: &str) -> CliResult<()> {
    GatewayClient::new(api_url)?.register_user(admin_api_key, api_key).await?;
    print_success("User API key registered successfully.");
    Ok(())
}

/// # Errors
///
/// Returns [`CliError::General`] for a blank context, otherwise propagates any
/// [`CliError`] from the request.
pub async fn organic_request(
    api_url: &str,
    api_key: &str,
    context: String,
    tier: String,
    target_model: String,
) -> CliResult<()> {
    if context.trim().is_empty() {
        return Err(CliError::General("Context must not be empty".to_string()));
    }

    let request =
        OrganicRequest { context, tier, target_model, miner_uid: ANY_MINER, top_incentive: 0.9 };

    let result = GatewayClient::new(api_url)?.organic(api_key, &request).await?;
    print_success("Response received:");
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}
