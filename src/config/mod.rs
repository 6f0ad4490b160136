//! Configuration module for Offer-Harvest
//!
//! This module handles loading, parsing, and validating the TOML configuration
//! file. Configuration is read once at startup and treated as immutable for
//! the lifetime of the process.
//!
//! # Example
//!
//! ```no_run
//! use offer_harvest::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("harvest.toml")).unwrap();
//! println!("Workers: {}", config.workers.worker_count);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    Config, FetchServiceConfig, ImageHostConfig, ProxyConfig, SiteConfig, WorkerConfig,
};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};
pub use validation::validate;
