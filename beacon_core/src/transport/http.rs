/*!
 * HTTP request executor for the collector's envelope endpoint.
 *
 * Uses `ureq`, a pure-Rust blocking HTTP client. Each request runs on
 * Tokio's blocking pool via `spawn_blocking`, so the async side of the
 * transport never blocks a runtime worker.
 *
 * Design decisions:
 * - **Statuses are data**: `http_status_as_error(false)` keeps 4xx/5xx
 *   responses as responses; the transport maps them to outcomes.
 * - **Single attempt**: no retries here. Retrying is a decision for the
 *   layer above the transport.
 * - **Errors only for the network**: `Err` means no status was received.
 */
use std::time::Duration;

use futures::future::FutureExt;
use http::HeaderMap;
use ureq::Agent;

use super::base::{ExecutorFuture, RequestExecutor, TransportRequest, TransportResponse};
use crate::error::ExecutorError;
use crate::protocol::constants::{AUTH_HEADER, ENVELOPE_CONTENT_TYPE};
use crate::protocol::dsn::Dsn;

/**
 * Executor POSTing serialized envelopes to the DSN's envelope endpoint.
 *
 * Cloning is cheap; clones share the agent's connection pool.
 */
#[derive(Clone)]
pub struct UreqExecutor {
    agent: Agent,
    endpoint: String,
    auth: String,
}

impl UreqExecutor {
    /**
     * Creates an executor for `dsn` with a configured `ureq::Agent`.
     *
     * Timeouts:
     * - 10 s connect
     * - 30 s total per request
     */
    pub fn new(dsn: &Dsn) -> Self {
        let agent: Agent = Agent::config_builder()
            .timeout_connect(Some(Duration::from_secs(10)))
            .timeout_global(Some(Duration::from_secs(30)))
            .http_status_as_error(false)
            .build()
            .into();

        Self { agent, endpoint: dsn.envelope_endpoint(), auth: dsn.auth_header() }
    }

    /// URL requests are sent to.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Blocking part of a request; runs on the blocking pool.
    fn post(&self, request: &TransportRequest) -> Result<TransportResponse, ExecutorError> {
        tracing::debug!(
            category = %request.category,
            bytes = request.body.len(),
            endpoint = %self.endpoint,
            "Sending envelope"
        );

        let response = self
            .agent
            .post(&self.endpoint)
            .header("content-type", ENVELOPE_CONTENT_TYPE)
            .header(AUTH_HEADER, &self.auth)
            .send(&request.body[..])
            .map_err(|e| {
                tracing::warn!(endpoint = %self.endpoint, "Failed to send envelope: {e}");
                ExecutorError::network(e.to_string())
            })?;

        let status = response.status().as_u16();
        let headers: HeaderMap = response.headers().clone();
        let body = response
            .into_body()
            .read_to_string()
            .unwrap_or_else(|_| "<unreadable body>".into());

        if !(200..300).contains(&status) {
            tracing::warn!(
                status,
                category = %request.category,
                "Collector responded with an error: {body}"
            );
        }

        Ok(TransportResponse {
            status_code: Some(status),
            headers: Some(headers),
            reason: None,
            body: if body.is_empty() { None } else { Some(body) },
        })
    }
}

impl RequestExecutor for UreqExecutor {
    fn execute(&self, request: TransportRequest) -> ExecutorFuture {
        let executor = self.clone();

        async move {
            match tokio::task::spawn_blocking(move || executor.post(&request)).await {
                Ok(result) => result,
                Err(e) => Err(ExecutorError::job(e.to_string())),
            }
        }
        .boxed()
    }
}
