//! Output module for reporting job outcomes
//!
//! This module handles:
//! - Summarizing a finished job for humans
//! - Exporting the status snapshot as JSON

pub mod stats;

pub use stats::{job_statistics, render_statistics, JobStatistics};

use crate::state::JobStatus;
use crate::HarvestError;
use std::path::Path;

/// Serializes a status snapshot as pretty-printed JSON
pub fn status_json(status: &JobStatus) -> Result<String, HarvestError> {
    Ok(serde_json::to_string_pretty(status)?)
}

/// Writes a status snapshot to `path` as JSON
///
/// # Arguments
///
/// * `status` - The snapshot to export
/// * `path` - Destination file, replaced if it exists
pub fn write_status_json(status: &JobStatus, path: &Path) -> Result<(), HarvestError> {
    let json = status_json(status)?;
    std::fs::write(path, json)?;
    tracing::info!("Wrote job status to {}", path.display());
    Ok(())
}
