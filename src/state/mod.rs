//! State module for tracking job progress
//!
//! # Components
//!
//! - `JobPhase`: lifecycle phases and their legal transitions
//! - `Job` / `JobStatus`: the tracked record and the caller-facing snapshot
//! - `JobTracker`: mutex-guarded registry of jobs
//! - `ProgressCounter` / `ProgressMonitor`: lock-free counting with periodic flush

mod job;
mod phase;
mod progress;
mod tracker;

// Re-export main types
pub use job::{Job, JobId, JobKind, JobResult, JobStatus};
pub use phase::JobPhase;
pub use progress::{ProgressCounter, ProgressMonitor};
pub use tracker::{
    scan_phase_failed, scrape_phase_failed, JobTracker, MAX_ERROR_RATE, MIN_ITEMS_FOR_FAILURE,
};
