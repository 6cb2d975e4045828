//! Validator mock for pool probing and work forwarding.

use gateway_core::types::BackendRecord;
use mockito::{Matcher, Mock, Server, ServerGuard};
use serde_json::json;
use std::time::Duration;

/// Builder for a mock validator.
///
/// Each mock is registered against a context so several items of one batch can be given
/// different outcomes on the same server.
pub struct ValidatorMockBuilder {
    server: ServerGuard,
    mocks: Vec<Mock>,
    expectations: Vec<Mock>,
}

impl ValidatorMockBuilder {
    pub async fn new() -> Self {
        Self { server: Server::new_async().await, mocks: Vec::new(), expectations: Vec::new() }
    }

    #[must_use]
    pub fn url(&self) -> String {
        self.server.url()
    }

    /// `(host, port)` of the mock server.
    ///
    /// # Panics
    ///
    /// Panics if mockito reports an address without a port.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn host_port(&self) -> (String, u16) {
        let host_port = self.server.host_with_port();
        let (host, port) = host_port.rsplit_once(':').expect("host:port");
        (host.to_string(), port.parse().expect("numeric port"))
    }

    /// A registration record pointing at this server.
    #[must_use]
    pub fn record(&self, identity: &str) -> BackendRecord {
        let (host, port) = self.host_port();
        BackendRecord::new(identity, host, port, "test-token")
    }

    pub fn mock_health(&mut self) -> &mut Self {
        let mock = self.server.mock("GET", "/health").with_status(200).create();
        self.mocks.push(mock);
        self
    }

    pub fn mock_health_status(&mut self, status: usize) -> &mut Self {
        let mock = self.server.mock("GET", "/health").with_status(status).create();
        self.mocks.push(mock);
        self
    }

    /// Any forward succeeds with `compressed`.
    pub fn mock_compress_any(&mut self, compressed: &str) -> &mut Self {
        let mock = self
            .server
            .mock("POST", "/forward")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(json!({ "compressed_context": compressed }).to_string())
            .create();
        self.mocks.push(mock);
        self
    }

    /// Any forward succeeds with `compressed`, but only after `delay`.
    pub fn mock_compress_slow(&mut self, compressed: &str, delay: Duration) -> &mut Self {
        let body = json!({ "compressed_context": compressed }).to_string();
        let mock = self
            .server
            .mock("POST", "/forward")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body_from_request(move |_| {
                std::thread::sleep(delay);
                body.clone().into_bytes()
            })
            .create();
        self.mocks.push(mock);
        self
    }

    /// Forwards whose `context` equals `context` succeed with `compressed`.
    pub fn mock_compress(&mut self, context: &str, compressed: &str) -> &mut Self {
        let mock = self
            .server
            .mock("POST", "/forward")
            .match_body(Matcher::PartialJson(json!({ "context": context })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(json!({ "compressed_context": compressed }).to_string())
            .create();
        self.mocks.push(mock);
        self
    }

    /// Forwards whose `context` equals `context` fail with `status`, exactly `hits` times.
    pub fn mock_forward_failure(&mut self, context: &str, status: usize, hits: usize) -> &mut Self {
        let mock = self
            .server
            .mock("POST", "/forward")
            .match_body(Matcher::PartialJson(json!({ "context": context })))
            .with_status(status)
            .with_body("validator overloaded")
            .expect(hits)
            .create();
        self.expectations.push(mock);
        self
    }

    /// Forwards with the given `context` must never arrive.
    pub fn mock_forward_never(&mut self, context: &str) -> &mut Self {
        let mock = self
            .server
            .mock("POST", "/forward")
            .match_body(Matcher::PartialJson(json!({ "context": context })))
            .with_status(200)
            .with_body(json!({ "compressed_context": "unexpected" }).to_string())
            .expect(0)
            .create();
        self.expectations.push(mock);
        self
    }

    /// Asserts the hit counts of failure and never-called mocks.
    pub fn assert(&self) {
        for mock in &self.expectations {
            mock.assert();
        }
    }
}
