//! HTTP access with rate limiting and bounded retries.

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::rate_limit::RateLimiter;
use crate::config::ApiSettings;
use crate::error::{Error, Result};
use crate::metadata::SourceKind;

const USER_AGENT: &str = concat!("audiobook-meta/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

/// Failure below the HTTP layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    Timeout,
    Network(String),
}

impl std::fmt::Display for TransportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransportError::Timeout => f.write_str("request timed out"),
            TransportError::Network(msg) => write!(f, "network error: {}", msg),
        }
    }
}

/// One GET request. Tests substitute a scripted implementation.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn get(
        &self,
        url: &str,
        bearer: Option<&str>,
    ) -> std::result::Result<HttpResponse, TransportError>;
}

/// Production transport over reqwest
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| Error::unavailable(SourceKind::Api, e.to_string(), false))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn get(
        &self,
        url: &str,
        bearer: Option<&str>,
    ) -> std::result::Result<HttpResponse, TransportError> {
        let mut request = self.client.get(url);
        if let Some(key) = bearer {
            request = request.bearer_auth(key);
        }
        let response = request.send().await.map_err(classify_reqwest)?;
        let status = response.status().as_u16();
        let body = response.text().await.map_err(classify_reqwest)?;
        Ok(HttpResponse { status, body })
    }
}

fn classify_reqwest(e: reqwest::Error) -> TransportError {
    if e.is_timeout() {
        TransportError::Timeout
    } else {
        TransportError::Network(e.to_string())
    }
}

/// Exponential backoff: attempt n waits `base * factor^(n-1)` before retrying
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base: Duration,
    pub factor: u32,
}

impl RetryPolicy {
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1);
        self.base
            .saturating_mul(self.factor.saturating_pow(exponent))
    }
}

impl From<&ApiSettings> for RetryPolicy {
    fn from(settings: &ApiSettings) -> Self {
        Self {
            max_attempts: settings.max_attempts.max(1),
            base: Duration::from_millis(settings.backoff_base_ms),
            factor: settings.backoff_factor.max(1),
        }
    }
}

/// Map a non-success status to an error, flagging the retry-worthy ones
pub fn status_error(status: u16, url: &str) -> Error {
    match status {
        404 => Error::unavailable(SourceKind::Api, format!("not found: {}", url), false),
        401 | 403 => Error::unavailable(
            SourceKind::Api,
            format!("HTTP {} (check the API key)", status),
            false,
        ),
        408 | 429 => Error::unavailable(SourceKind::Api, format!("HTTP {}", status), true),
        500..=599 => Error::unavailable(SourceKind::Api, format!("HTTP {}", status), true),
        _ => Error::unavailable(SourceKind::Api, format!("HTTP {}", status), false),
    }
}

/// JSON client shared by every lookup
#[derive(Clone)]
pub struct ApiClient {
    transport: Arc<dyn HttpTransport>,
    limiter: Arc<RateLimiter>,
    retry: RetryPolicy,
    api_key: Option<String>,
}

impl ApiClient {
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        limiter: Arc<RateLimiter>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            transport,
            limiter,
            retry,
            api_key: None,
        }
    }

    pub fn with_api_key(mut self, api_key: Option<String>) -> Self {
        self.api_key = api_key;
        self
    }

    /// GET and decode JSON, retrying temporary failures.
    ///
    /// Cancellation is honored before each attempt and during backoff.
    pub async fn get_json(&self, url: &str, cancel: &CancellationToken) -> Result<Value> {
        let mut attempt = 1;
        loop {
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }

            self.limiter.wait().await;
            debug!(url, attempt, "GET");

            let err = match self.transport.get(url, self.api_key.as_deref()).await {
                Ok(response) if (200..300).contains(&response.status) => {
                    return serde_json::from_str(&response.body).map_err(|e| {
                        Error::extraction(SourceKind::Api, format!("invalid JSON from {}: {}", url, e))
                    });
                }
                Ok(response) => status_error(response.status, url),
                Err(e) => Error::unavailable(SourceKind::Api, e.to_string(), true),
            };

            if !err.is_temporary() || attempt >= self.retry.max_attempts {
                return Err(err);
            }

            let delay = self.retry.delay_after(attempt);
            warn!(
                url,
                attempt,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "retrying after temporary failure"
            );
            tokio::select! {
                _ = cancel.cancelled() => return Err(Error::Cancelled),
                _ = tokio::time::sleep(delay) => {}
            }
            attempt += 1;
        }
    }
}
