//! Statistics over a finished job
//!
//! This module condenses a job status snapshot into counts a human can scan:
//! successes, failures grouped by error code, and the success rate.

use crate::state::{JobResult, JobStatus};
use std::collections::BTreeMap;
use std::fmt::Write;

/// Job outcome summary
#[derive(Debug, Clone, PartialEq)]
pub struct JobStatistics {
    /// Entries in the results, placeholders included
    pub results_count: usize,

    /// Entries carrying a product view
    pub succeeded: usize,

    /// Placeholder entries grouped by error code
    pub errors_by_code: BTreeMap<String, usize>,

    /// Total failures across all phases, as counted by the job
    pub error_count: usize,

    /// Seconds between creation and completion, when finished
    pub duration_seconds: Option<i64>,
}

/// Computes statistics from a status snapshot
///
/// # Arguments
///
/// * `status` - A terminal snapshot; results are empty while a job is active
pub fn job_statistics(status: &JobStatus) -> JobStatistics {
    let results = status.results.as_deref().unwrap_or_default();

    let mut errors_by_code = BTreeMap::new();
    let mut succeeded = 0;
    for result in results {
        match result {
            JobResult::Ok(_) => succeeded += 1,
            JobResult::Error { error, .. } => *errors_by_code.entry(error.clone()).or_insert(0) += 1,
        }
    }

    JobStatistics {
        results_count: results.len(),
        succeeded,
        errors_by_code,
        error_count: status.error_count,
        duration_seconds: status
            .completed_at
            .map(|done| (done - status.created_at).num_seconds()),
    }
}

/// Renders the human-readable job report
pub fn render_statistics(status: &JobStatus, stats: &JobStatistics) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "=== Job {} ===\n", status.job_id);
    let _ = writeln!(out, "Overview:");
    let _ = writeln!(out, "  Kind: {}", status.kind);
    let _ = writeln!(out, "  Phase: {}", status.phase);
    if let Some(message) = &status.message {
        let _ = writeln!(out, "  Message: {}", message);
    }
    if let Some(seconds) = stats.duration_seconds {
        let _ = writeln!(out, "  Duration: {}s", seconds);
    }
    let _ = writeln!(out);

    if !stats.errors_by_code.is_empty() {
        let _ = writeln!(out, "Errors by Code:");
        let mut by_count: Vec<_> = stats.errors_by_code.iter().collect();
        by_count.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));
        for (code, count) in by_count {
            let _ = writeln!(out, "  {}: {}", code, count);
        }
        let _ = writeln!(out);
    }

    let success_rate = if stats.results_count > 0 {
        (stats.succeeded as f64 / stats.results_count as f64) * 100.0
    } else {
        0.0
    };
    let _ = write!(
        out,
        "Success Rate: {:.1}% ({} / {} results, {} errors in total)",
        success_rate, stats.succeeded, stats.results_count, stats.error_count
    );

    out
}
