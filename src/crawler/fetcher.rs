//! Page fetcher backed by the external rendering service
//!
//! This module handles every page request of a job:
//! - Building the HTTP client with mandatory timeouts
//! - Wrapping the target URL in the service's JSON envelope
//! - Decoding the service's reply, defensively
//! - Retry with linear backoff and jitter
//! - Proxy session rotation before every retry

use crate::config::FetchServiceConfig;
use crate::crawler::session::{ProxyCredential, SessionProvider};
use async_trait::async_trait;
use rand::Rng;
use reqwest::{Client, StatusCode};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Typed failure of one fetch
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchFailure {
    #[error("timeout")]
    Timeout,

    #[error("http_status:{0}")]
    HttpStatus(u16),

    #[error("empty_body")]
    EmptyBody,

    #[error("invalid_envelope: {0}")]
    InvalidEnvelope(String),

    #[error("transport_error: {0}")]
    Transport(String),
}

impl FetchFailure {
    /// Short taxonomy code, used in error placeholders
    pub fn kind(&self) -> String {
        match self {
            Self::Timeout => "timeout".to_string(),
            Self::HttpStatus(code) => format!("http_status:{}", code),
            Self::EmptyBody => "empty_body".to_string(),
            Self::InvalidEnvelope(_) => "invalid_envelope".to_string(),
            Self::Transport(_) => "transport_error".to_string(),
        }
    }

    /// Whether another attempt could succeed
    ///
    /// | Failure | Retried |
    /// |---------|---------|
    /// | Timeout, transport error | yes |
    /// | Empty body, invalid envelope | yes |
    /// | HTTP 5xx, 403, 429 | yes |
    /// | Any other status | no |
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout | Self::Transport(_) | Self::EmptyBody | Self::InvalidEnvelope(_) => true,
            Self::HttpStatus(code) => *code >= 500 || *code == 403 || *code == 429,
        }
    }

    fn from_reqwest(error: &reqwest::Error) -> Self {
        if error.is_timeout() {
            Self::Timeout
        } else {
            Self::Transport(error.to_string())
        }
    }
}

/// Resolves a URL to its rendered HTML
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<String, FetchFailure>;
}

/// Attempt budget and delays between attempts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff_base: Duration,
    pub backoff_jitter: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &FetchServiceConfig) -> Self {
        Self {
            max_attempts: config.max_retries,
            backoff_base: Duration::from_millis(config.backoff_base_ms),
            backoff_jitter: Duration::from_millis(config.backoff_jitter_ms),
        }
    }

    /// Linear part of the wait before `attempt` (1-based)
    pub fn base_delay(&self, attempt: u32) -> Duration {
        self.backoff_base * attempt.saturating_sub(1)
    }

    /// Full wait before `attempt`, jitter included
    pub fn delay_before(&self, attempt: u32) -> Duration {
        let jitter_ms = self.backoff_jitter.as_millis() as u64;
        let jitter = if jitter_ms == 0 {
            Duration::ZERO
        } else {
            Duration::from_millis(rand::thread_rng().gen_range(0..=jitter_ms))
        };
        self.base_delay(attempt) + jitter
    }
}

#[derive(Debug, Serialize)]
struct FetchRequest<'a> {
    url: &'a str,
    mode: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    proxy: Option<String>,
}

/// Builds the HTTP client used to talk to the rendering service
///
/// # Arguments
///
/// * `config` - Fetch service settings; both timeouts are applied
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
pub fn build_http_client(config: &FetchServiceConfig) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(concat!("offer-harvest/", env!("CARGO_PKG_VERSION")))
        .connect_timeout(config.connect_timeout())
        .timeout(config.request_timeout())
        .gzip(true)
        .brotli(true)
        .build()
}

/// Decodes the rendering service's reply body into page HTML
///
/// # Accepted Shapes
///
/// - `{"code": 200, "source": "<html>..."}` (code may also be `"200"`)
/// - `{"code": 200, "data": "<html>..."}`
/// - A bare JSON string holding the page
/// - A non-JSON body that looks like markup, taken as raw HTML
pub fn parse_envelope(body: &str) -> Result<String, FetchFailure> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return Err(FetchFailure::EmptyBody);
    }

    let envelope = match serde_json::from_str::<Value>(trimmed) {
        Ok(value @ Value::Object(_)) => value,
        Ok(Value::String(html)) if !html.trim().is_empty() => return Ok(html),
        Ok(Value::String(_)) => return Err(FetchFailure::EmptyBody),
        Ok(_) => {
            return Err(FetchFailure::InvalidEnvelope(
                "envelope is not an object".to_string(),
            ))
        }
        Err(_) if trimmed.contains('<') => return Ok(body.to_string()),
        Err(e) => return Err(FetchFailure::InvalidEnvelope(e.to_string())),
    };

    let code = envelope.get("code").ok_or_else(|| {
        FetchFailure::InvalidEnvelope("missing status code".to_string())
    })?;
    let succeeded = match code {
        Value::Number(n) => n.as_u64() == Some(200),
        Value::String(s) => s.trim() == "200",
        _ => false,
    };
    if !succeeded {
        return Err(FetchFailure::InvalidEnvelope(format!(
            "service reported code {}",
            code
        )));
    }

    ["source", "data"]
        .iter()
        .filter_map(|key| envelope.get(*key).and_then(Value::as_str))
        .find(|html| !html.trim().is_empty())
        .map(str::to_string)
        .ok_or(FetchFailure::EmptyBody)
}

/// Fetches pages through the rendering service, with retry and rotation
pub struct ServiceFetcher {
    client: Client,
    endpoint: String,
    retry: RetryPolicy,
    sessions: Option<Arc<dyn SessionProvider>>,
}

impl ServiceFetcher {
    /// Creates a fetcher for the configured service
    ///
    /// Without a session provider requests go out without a `proxy` field.
    pub fn new(
        config: &FetchServiceConfig,
        sessions: Option<Arc<dyn SessionProvider>>,
    ) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: build_http_client(config)?,
            endpoint: config.endpoint.clone(),
            retry: RetryPolicy::from_config(config),
            sessions,
        })
    }

    async fn attempt(
        &self,
        url: &str,
        credential: Option<&ProxyCredential>,
    ) -> Result<String, FetchFailure> {
        let request = FetchRequest {
            url,
            mode: "source",
            proxy: credential.map(ProxyCredential::proxy_url),
        };

        let response = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|e| FetchFailure::from_reqwest(&e))?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(FetchFailure::HttpStatus(status.as_u16()));
        }

        let body = response
            .text()
            .await
            .map_err(|e| FetchFailure::from_reqwest(&e))?;
        parse_envelope(&body)
    }
}

#[async_trait]
impl PageFetcher for ServiceFetcher {
    async fn fetch(&self, url: &str) -> Result<String, FetchFailure> {
        let max_attempts = self.retry.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            let credential = self.sessions.as_ref().map(|sessions| {
                if attempt == 1 {
                    sessions.acquire()
                } else {
                    sessions.rotate()
                }
            });

            match self.attempt(url, credential.as_ref()).await {
                Ok(html) => {
                    tracing::debug!("Fetched {} on attempt {}", url, attempt);
                    return Ok(html);
                }
                Err(failure) if failure.is_retryable() && attempt < max_attempts => {
                    let delay = self.retry.delay_before(attempt + 1);
                    tracing::warn!(
                        "Fetch of {} failed ({}), attempt {}/{}, retrying in {:?}",
                        url,
                        failure,
                        attempt,
                        max_attempts,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(failure) => {
                    tracing::debug!("Giving up on {} after {} attempts: {}", url, attempt, failure);
                    return Err(failure);
                }
            }
        }
    }
}
