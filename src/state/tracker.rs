//! In-memory job registry
//!
//! Every mutation goes through a single mutex so a polling caller never
//! observes a half-applied update.

use crate::state::job::{Job, JobId, JobKind, JobResult, JobStatus};
use crate::state::JobPhase;
use crate::HarvestError;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

/// Product phases with more items than this may be marked failed
pub const MIN_ITEMS_FOR_FAILURE: usize = 10;

/// Error rate above which a large product phase is marked failed
pub const MAX_ERROR_RATE: f64 = 0.9;

/// Decides whether a finished product phase counts as failed
///
/// Low-volume jobs always complete, whatever their error rate.
pub fn scrape_phase_failed(total: usize, errors: usize) -> bool {
    total > MIN_ITEMS_FOR_FAILURE && (errors as f64 / total as f64) > MAX_ERROR_RATE
}

/// Decides whether a finished page-scan phase counts as failed
///
/// The scan fails only when no page at all could be fetched.
pub fn scan_phase_failed(total_pages: usize, failed_pages: usize) -> bool {
    total_pages > 0 && failed_pages >= total_pages
}

/// Thread-safe store of job records
#[derive(Debug, Default)]
pub struct JobTracker {
    jobs: Mutex<HashMap<JobId, Job>>,
}

impl JobTracker {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<JobId, Job>> {
        self.jobs
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn with_job<T>(
        &self,
        id: JobId,
        f: impl FnOnce(&mut Job) -> Result<T, HarvestError>,
    ) -> Result<T, HarvestError> {
        let mut jobs = self.lock();
        let job = jobs
            .get_mut(&id)
            .ok_or_else(|| HarvestError::UnknownJob(id.to_string()))?;
        f(job)
    }

    /// Registers a new pending job
    pub fn create(&self, kind: JobKind) -> JobId {
        let job = Job::new(kind);
        let id = job.id;
        self.lock().insert(id, job);
        tracing::debug!("Created {} job {}", kind, id);
        id
    }

    /// Moves a job into a work phase with a fresh progress window
    pub fn begin_phase(&self, id: JobId, phase: JobPhase, total: usize) -> Result<(), HarvestError> {
        self.with_job(id, |job| {
            transition(job, phase)?;
            job.total = total;
            job.processed = 0;
            Ok(())
        })
    }

    /// Publishes the live processed count
    ///
    /// Values lower than the current one are ignored so `processed` never goes
    /// backwards within a phase.
    pub fn record_progress(&self, id: JobId, processed: usize) -> Result<(), HarvestError> {
        self.with_job(id, |job| {
            if job.phase.is_active() && processed > job.processed {
                job.processed = processed;
            }
            Ok(())
        })
    }

    /// Adds failed work items to the job's running error count
    pub fn add_errors(&self, id: JobId, count: usize) -> Result<(), HarvestError> {
        self.with_job(id, |job| {
            job.error_count += count;
            Ok(())
        })
    }

    /// Sets the human-readable progress message
    pub fn set_message(&self, id: JobId, message: impl Into<String>) -> Result<(), HarvestError> {
        let message = message.into();
        self.with_job(id, |job| {
            job.message = Some(message);
            Ok(())
        })
    }

    /// Marks the job completed and publishes its results
    pub fn complete(&self, id: JobId, results: Vec<JobResult>) -> Result<(), HarvestError> {
        self.with_job(id, |job| {
            transition(job, JobPhase::Completed)?;
            job.processed = job.total;
            job.results = results;
            job.completed_at = Some(Utc::now());
            Ok(())
        })
    }

    /// Marks the job failed with a reason
    pub fn fail(&self, id: JobId, reason: impl Into<String>) -> Result<(), HarvestError> {
        let reason = reason.into();
        self.with_job(id, |job| {
            transition(job, JobPhase::Failed)?;
            job.message = Some(reason);
            job.completed_at = Some(Utc::now());
            Ok(())
        })
    }

    /// Returns the caller-facing snapshot of a job
    pub fn status(&self, id: JobId) -> Option<JobStatus> {
        self.lock().get(&id).map(Job::status)
    }

    /// Returns the current phase of a job
    pub fn phase(&self, id: JobId) -> Option<JobPhase> {
        self.lock().get(&id).map(|job| job.phase)
    }

    /// Number of tracked jobs
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

fn transition(job: &mut Job, next: JobPhase) -> Result<(), HarvestError> {
    if !job.phase.can_transition_to(next) {
        return Err(HarvestError::InvalidTransition {
            from: job.phase,
            to: next,
        });
    }
    tracing::debug!("Job {}: {} -> {}", job.id, job.phase, next);
    job.phase = next;
    Ok(())
}
