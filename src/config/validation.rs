use crate::config::types::{
    Config, FetchServiceConfig, ImageHostConfig, ProxyConfig, SiteConfig, WorkerConfig,
};
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_fetch_service(&config.fetch_service)?;
    if let Some(proxy) = &config.proxy {
        validate_proxy(proxy)?;
    }
    validate_workers(&config.workers)?;
    validate_site(&config.site)?;
    if let Some(images) = &config.images {
        validate_images(images)?;
    }
    Ok(())
}

fn validate_fetch_service(config: &FetchServiceConfig) -> Result<(), ConfigError> {
    validate_http_url("fetch-service.endpoint", &config.endpoint)?;

    if config.max_retries < 1 || config.max_retries > 10 {
        return Err(ConfigError::Validation(format!(
            "max_retries must be between 1 and 10, got {}",
            config.max_retries
        )));
    }

    if config.connect_timeout_ms == 0 || config.request_timeout_ms == 0 {
        return Err(ConfigError::Validation(
            "fetch-service timeouts must be greater than zero".to_string(),
        ));
    }

    if config.connect_timeout_ms > config.request_timeout_ms {
        return Err(ConfigError::Validation(format!(
            "connect_timeout_ms ({}) cannot exceed request_timeout_ms ({})",
            config.connect_timeout_ms, config.request_timeout_ms
        )));
    }

    Ok(())
}

fn validate_proxy(config: &ProxyConfig) -> Result<(), ConfigError> {
    if config.host.is_empty() {
        return Err(ConfigError::Validation(
            "proxy.host cannot be empty".to_string(),
        ));
    }

    if config.username.is_empty() {
        return Err(ConfigError::Validation(
            "proxy.username cannot be empty".to_string(),
        ));
    }

    if config.min_session_requests < 1 {
        return Err(ConfigError::Validation(
            "min_session_requests must be >= 1".to_string(),
        ));
    }

    if config.min_session_requests > config.max_session_requests {
        return Err(ConfigError::Validation(format!(
            "min_session_requests ({}) cannot exceed max_session_requests ({})",
            config.min_session_requests, config.max_session_requests
        )));
    }

    Ok(())
}

fn validate_workers(config: &WorkerConfig) -> Result<(), ConfigError> {
    if config.worker_count < 1 || config.worker_count > 64 {
        return Err(ConfigError::Validation(format!(
            "worker_count must be between 1 and 64, got {}",
            config.worker_count
        )));
    }

    if config.per_worker_concurrency < 1 || config.per_worker_concurrency > 256 {
        return Err(ConfigError::Validation(format!(
            "per_worker_concurrency must be between 1 and 256, got {}",
            config.per_worker_concurrency
        )));
    }

    if config.progress_interval_ms < 10 {
        return Err(ConfigError::Validation(format!(
            "progress_interval_ms must be >= 10ms, got {}ms",
            config.progress_interval_ms
        )));
    }

    Ok(())
}

fn validate_site(config: &SiteConfig) -> Result<(), ConfigError> {
    validate_http_url("site.base-url", &config.base_url)?;
    validate_http_url("site.image-base-url", &config.image_base_url)?;

    if config.default_seller.trim().is_empty() {
        return Err(ConfigError::Validation(
            "default_seller cannot be empty".to_string(),
        ));
    }

    Ok(())
}

fn validate_images(config: &ImageHostConfig) -> Result<(), ConfigError> {
    validate_http_url("images.upload-url", &config.upload_url)?;

    if config.auth_token.is_empty() {
        return Err(ConfigError::Validation(
            "images.auth_token cannot be empty".to_string(),
        ));
    }

    validate_host(&config.canonical_host)?;

    if config.timeout_ms == 0 || config.connect_timeout_ms == 0 {
        return Err(ConfigError::Validation(
            "images timeouts must be greater than zero".to_string(),
        ));
    }

    if config.connect_timeout_ms > config.timeout_ms {
        return Err(ConfigError::Validation(format!(
            "images.connect_timeout_ms ({}) cannot exceed images.timeout_ms ({})",
            config.connect_timeout_ms, config.timeout_ms
        )));
    }

    Ok(())
}

/// Checks that `value` parses as an absolute http(s) URL with a host
fn validate_http_url(field: &str, value: &str) -> Result<(), ConfigError> {
    let url = Url::parse(value)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid {}: {}", field, e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::InvalidUrl(format!(
            "{} must use http or https, got '{}'",
            field,
            url.scheme()
        )));
    }

    if url.host_str().is_none() {
        return Err(ConfigError::InvalidUrl(format!("{} has no host", field)));
    }

    Ok(())
}

/// Validates a bare host name (no scheme, no path)
fn validate_host(host: &str) -> Result<(), ConfigError> {
    if host.is_empty() {
        return Err(ConfigError::Validation(
            "canonical_host cannot be empty".to_string(),
        ));
    }

    if !host
        .chars()
        .all(|c| c.is_alphanumeric() || c == '.' || c == '-')
    {
        return Err(ConfigError::Validation(format!(
            "canonical_host '{}' contains invalid characters",
            host
        )));
    }

    if host.starts_with('.') || host.ends_with('.') || !host.contains('.') {
        return Err(ConfigError::Validation(format!(
            "canonical_host '{}' is not a valid host name",
            host
        )));
    }

    Ok(())
}
