//! Crawler module for page fetching and job execution
//!
//! This module contains the core pipeline logic, including:
//! - Fetching through the rendering service with retry and backoff
//! - Rotating proxy sessions under a request budget
//! - Product link discovery on listing pages
//! - Fan-out of work units across bounded worker pools
//! - Overall job coordination

mod coordinator;
mod distributor;
mod fetcher;
mod links;
mod session;

pub use coordinator::Pipeline;
pub use distributor::{distribute, partition, Distribution};
pub use fetcher::{
    build_http_client, parse_envelope, FetchFailure, PageFetcher, RetryPolicy, ServiceFetcher,
};
pub use links::{extract_links, PRODUCT_SEGMENT};
pub use session::{ProxyCredential, ProxySessionManager, SessionProvider};
