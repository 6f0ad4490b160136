//! Image re-hosting
//!
//! Full-detail records reference product images on our own host rather than
//! the retailer's CDN. Each image is downloaded, uploaded to the image host,
//! and the returned URL is rewritten onto the canonical public host.

use crate::config::ImageHostConfig;
use async_trait::async_trait;
use futures::future::join_all;
use reqwest::Client;
use serde::Deserialize;
use thiserror::Error;
use url::Url;

/// Failures while re-hosting one image
#[derive(Debug, Error)]
pub enum ImageError {
    #[error("image download failed: {0}")]
    Download(String),

    #[error("image upload failed: {0}")]
    Upload(String),

    #[error("invalid upload response: {0}")]
    InvalidResponse(String),
}

/// Destination for product images
#[async_trait]
pub trait ImageStore: Send + Sync {
    /// Copies the image at `source_url` and returns its new public URL
    async fn rehost(&self, source_url: &str) -> Result<String, ImageError>;
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    url: String,
}

/// Image store backed by an HTTP upload endpoint with bearer auth
pub struct HttpImageStore {
    client: Client,
    upload_url: String,
    auth_token: String,
    canonical_host: String,
}

impl HttpImageStore {
    pub fn new(config: &ImageHostConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .user_agent(concat!("offer-harvest/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(config.connect_timeout())
            .timeout(config.timeout())
            .build()?;

        Ok(Self {
            client,
            upload_url: config.upload_url.clone(),
            auth_token: config.auth_token.clone(),
            canonical_host: config.canonical_host.clone(),
        })
    }
}

#[async_trait]
impl ImageStore for HttpImageStore {
    async fn rehost(&self, source_url: &str) -> Result<String, ImageError> {
        let download = self
            .client
            .get(source_url)
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(|e| ImageError::Download(e.to_string()))?;

        let content_type = download
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("application/octet-stream")
            .to_string();

        let bytes = download
            .bytes()
            .await
            .map_err(|e| ImageError::Download(e.to_string()))?;
        if bytes.is_empty() {
            return Err(ImageError::Download("empty image body".to_string()));
        }

        let uploaded: UploadResponse = self
            .client
            .post(&self.upload_url)
            .bearer_auth(&self.auth_token)
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(bytes)
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(|e| ImageError::Upload(e.to_string()))?
            .json()
            .await
            .map_err(|e| ImageError::InvalidResponse(e.to_string()))?;

        rewrite_host(&uploaded.url, &self.canonical_host)
    }
}

/// Moves a URL onto `canonical_host`, dropping any explicit port
pub fn rewrite_host(url: &str, canonical_host: &str) -> Result<String, ImageError> {
    let mut parsed =
        Url::parse(url).map_err(|e| ImageError::InvalidResponse(format!("{}: {}", url, e)))?;

    parsed
        .set_host(Some(canonical_host))
        .map_err(|e| ImageError::InvalidResponse(format!("{}: {}", canonical_host, e)))?;
    parsed
        .set_port(None)
        .map_err(|_| ImageError::InvalidResponse(format!("cannot clear port of {}", url)))?;

    Ok(parsed.to_string())
}

/// Re-hosts every image, keeping slot order
///
/// A failed image leaves its slot empty. Without a store the source URLs are
/// reported unchanged.
pub async fn rehost_all(store: Option<&dyn ImageStore>, urls: &[String]) -> Vec<Option<String>> {
    let Some(store) = store else {
        return urls.iter().cloned().map(Some).collect();
    };

    join_all(urls.iter().map(|url| async move {
        match store.rehost(url).await {
            Ok(hosted) => Some(hosted),
            Err(e) => {
                tracing::warn!("Could not re-host image {}: {}", url, e);
                None
            }
        }
    }))
    .await
}
