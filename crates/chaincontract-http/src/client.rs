//! HTTP JSON-RPC client backed by `reqwest`.
//!
//! Transient failures (connection errors, non-2xx statuses, timeouts) are
//! retried with exponential backoff. JSON-RPC error objects are answers, not
//! failures, and are returned to the caller untouched.

use std::time::Duration;

use async_trait::async_trait;
use chaincontract_core::{JsonRpcRequest, JsonRpcResponse, RpcTransport, TransportError};
use serde_json::Value;
use tracing::{debug, error, warn};

use crate::retry::{RetryConfig, RetryPolicy};

/// Configuration for [`HttpRpcClient`].
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    pub retry: RetryConfig,
    pub request_timeout: Duration,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            retry: RetryConfig::default(),
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// HTTP JSON-RPC transport.
pub struct HttpRpcClient {
    url: String,
    http: reqwest::Client,
    retry: RetryPolicy,
    request_timeout: Duration,
}

impl HttpRpcClient {
    /// Create a client for the given JSON-RPC endpoint URL.
    pub fn new(url: impl Into<String>, config: HttpClientConfig) -> Result<Self, TransportError> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| TransportError::Other(format!("cannot build HTTP client: {e}")))?;
        Ok(Self {
            url: url.into(),
            http,
            retry: RetryPolicy::new(config.retry),
            request_timeout: config.request_timeout,
        })
    }

    /// Create with default configuration.
    pub fn default_for(url: impl Into<String>) -> Result<Self, TransportError> {
        Self::new(url, HttpClientConfig::default())
    }

    fn map_reqwest(&self, e: reqwest::Error) -> TransportError {
        if e.is_timeout() {
            TransportError::Timeout {
                ms: self.request_timeout.as_millis() as u64,
            }
        } else {
            TransportError::Http(e.to_string())
        }
    }

    async fn post(&self, body: &impl serde::Serialize) -> Result<Value, TransportError> {
        let resp = self
            .http
            .post(&self.url)
            .json(body)
            .send()
            .await
            .map_err(|e| self.map_reqwest(e))?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(TransportError::Http(format!("HTTP {status}: {body}")));
        }
        let bytes = resp.bytes().await.map_err(|e| self.map_reqwest(e))?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// POST `body`, retrying transient failures.
    async fn post_with_retry(&self, body: &impl serde::Serialize, what: &str) -> Result<Value, TransportError> {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match self.post(body).await {
                Ok(v) => return Ok(v),
                Err(e) if e.is_retryable() => match self.retry.next_delay(attempt) {
                    Some(delay) => {
                        warn!(
                            attempt,
                            delay_ms = delay.as_millis() as u64,
                            error = %e,
                            url = %self.url,
                            what,
                            "retrying request"
                        );
                        tokio::time::sleep(delay).await;
                    }
                    None => {
                        error!(attempt, error = %e, url = %self.url, what, "max retries exceeded");
                        return Err(e);
                    }
                },
                Err(e) => return Err(e),
            }
        }
    }
}

#[async_trait]
impl RpcTransport for HttpRpcClient {
    async fn send(&self, req: JsonRpcRequest) -> Result<JsonRpcResponse, TransportError> {
        debug!(method = %req.method, url = %self.url, "http rpc");
        let value = self.post_with_retry(&req, &req.method).await?;
        Ok(serde_json::from_value(value)?)
    }

    /// One HTTP call carrying all requests as a JSON array. Responses are
    /// returned in request order regardless of the order the node used.
    async fn send_batch(&self, reqs: Vec<JsonRpcRequest>) -> Result<Vec<JsonRpcResponse>, TransportError> {
        if reqs.is_empty() {
            return Ok(vec![]);
        }
        debug!(size = reqs.len(), url = %self.url, "http rpc batch");
        let value = self.post_with_retry(&reqs, "batch").await?;
        let mut responses: Vec<JsonRpcResponse> = serde_json::from_value(value)?;

        let mut ordered = Vec::with_capacity(reqs.len());
        for req in &reqs {
            let pos = responses
                .iter()
                .position(|r| r.id == req.id)
                .ok_or_else(|| TransportError::UnexpectedResponse {
                    method: req.method.clone(),
                    reason: "missing from batch response".into(),
                })?;
            ordered.push(responses.swap_remove(pos));
        }
        Ok(ordered)
    }

    fn url(&self) -> &str {
        &self.url
    }
}
