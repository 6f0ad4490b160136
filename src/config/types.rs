use serde::Deserialize;
use std::time::Duration;

/// Main configuration structure for Offer-Harvest
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(rename = "fetch-service")]
    pub fetch_service: FetchServiceConfig,
    #[serde(default)]
    pub proxy: Option<ProxyConfig>,
    #[serde(default)]
    pub workers: WorkerConfig,
    pub site: SiteConfig,
    #[serde(default)]
    pub images: Option<ImageHostConfig>,
}

/// External rendering/bypass service configuration
#[derive(Debug, Clone, Deserialize)]
pub struct FetchServiceConfig {
    /// Full endpoint URL accepting the `{url, mode, proxy}` envelope
    pub endpoint: String,

    /// TCP connect timeout (milliseconds)
    #[serde(rename = "connect-timeout-ms", default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,

    /// Whole-request timeout including the body read (milliseconds)
    #[serde(rename = "request-timeout-ms", default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    /// Maximum number of attempts per URL
    #[serde(rename = "max-retries", default = "default_max_retries")]
    pub max_retries: u32,

    /// Linear backoff step between attempts (milliseconds)
    #[serde(rename = "backoff-base-ms", default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,

    /// Upper bound of the random jitter added to each backoff (milliseconds)
    #[serde(rename = "backoff-jitter-ms", default = "default_backoff_jitter_ms")]
    pub backoff_jitter_ms: u64,
}

impl FetchServiceConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

/// Rotating proxy base credential
#[derive(Debug, Clone, Deserialize)]
pub struct ProxyConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,

    /// Lower bound of the randomized per-session request budget
    #[serde(rename = "min-session-requests", default = "default_min_session_requests")]
    pub min_session_requests: u32,

    /// Upper bound of the randomized per-session request budget
    #[serde(rename = "max-session-requests", default = "default_max_session_requests")]
    pub max_session_requests: u32,
}

/// Work distribution settings
#[derive(Debug, Clone, Deserialize)]
pub struct WorkerConfig {
    /// Number of isolated worker tasks a phase is split across
    #[serde(rename = "worker-count", default = "default_worker_count")]
    pub worker_count: usize,

    /// Concurrent units inside each worker
    #[serde(rename = "per-worker-concurrency", default = "default_per_worker_concurrency")]
    pub per_worker_concurrency: usize,

    /// How often the progress monitor flushes the shared counter (milliseconds)
    #[serde(rename = "progress-interval-ms", default = "default_progress_interval_ms")]
    pub progress_interval_ms: u64,
}

impl WorkerConfig {
    pub fn progress_interval(&self) -> Duration {
        Duration::from_millis(self.progress_interval_ms)
    }
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            worker_count: default_worker_count(),
            per_worker_concurrency: default_per_worker_concurrency(),
            progress_interval_ms: default_progress_interval_ms(),
        }
    }
}

/// Target site conventions
#[derive(Debug, Clone, Deserialize)]
pub struct SiteConfig {
    /// Base URL relative product paths are resolved against
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// Base URL relative image paths are resolved against
    #[serde(rename = "image-base-url")]
    pub image_base_url: String,

    /// Seller label used when an offer carries no marketplace data
    #[serde(rename = "default-seller", default = "default_seller")]
    pub default_seller: String,
}

/// Image re-hosting collaborator
#[derive(Debug, Clone, Deserialize)]
pub struct ImageHostConfig {
    /// Upload endpoint accepting the raw image bytes
    #[serde(rename = "upload-url")]
    pub upload_url: String,

    /// Bearer token sent with each upload
    #[serde(rename = "auth-token")]
    pub auth_token: String,

    /// Host every returned image URL is rewritten to
    #[serde(rename = "canonical-host")]
    pub canonical_host: String,

    #[serde(rename = "connect-timeout-ms", default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,

    /// Whole-call timeout for one download or upload (milliseconds)
    #[serde(rename = "timeout-ms", default = "default_image_timeout_ms")]
    pub timeout_ms: u64,
}

impl ImageHostConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

fn default_connect_timeout_ms() -> u64 {
    10_000
}

fn default_request_timeout_ms() -> u64 {
    90_000
}

fn default_max_retries() -> u32 {
    4
}

fn default_backoff_base_ms() -> u64 {
    2_000
}

fn default_backoff_jitter_ms() -> u64 {
    1_000
}

fn default_min_session_requests() -> u32 {
    1_000
}

fn default_max_session_requests() -> u32 {
    1_500
}

fn default_worker_count() -> usize {
    4
}

fn default_per_worker_concurrency() -> usize {
    8
}

fn default_progress_interval_ms() -> u64 {
    2_000
}

fn default_seller() -> String {
    "Carrefour".to_string()
}

fn default_image_timeout_ms() -> u64 {
    30_000
}
