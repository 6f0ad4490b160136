//! Shared progress counting with periodic publication
//!
//! Workers bump an atomic counter once per finished item. A monitor task
//! copies the counter into the job record on a fixed interval, so the job
//! mutex is touched a bounded number of times no matter how wide the fan-out.

use crate::state::{JobId, JobTracker};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

/// Cloneable handle to a shared processed-items counter
#[derive(Debug, Clone, Default)]
pub struct ProgressCounter {
    count: Arc<AtomicUsize>,
}

impl ProgressCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one finished item, successful or not
    pub fn increment(&self) {
        self.count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get(&self) -> usize {
        self.count.load(Ordering::Relaxed)
    }
}

/// Background task flushing a counter into a job record
pub struct ProgressMonitor {
    stop_tx: Option<oneshot::Sender<()>>,
    handle: JoinHandle<()>,
    tracker: Arc<JobTracker>,
    job_id: JobId,
    counter: ProgressCounter,
}

impl ProgressMonitor {
    /// Starts flushing `counter` into `job_id` every `interval`
    pub fn spawn(
        tracker: Arc<JobTracker>,
        job_id: JobId,
        counter: ProgressCounter,
        interval: Duration,
    ) -> Self {
        let (stop_tx, mut stop_rx) = oneshot::channel::<()>();
        let task_tracker = Arc::clone(&tracker);
        let task_counter = counter.clone();

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = &mut stop_rx => break,
                    _ = ticker.tick() => {
                        let processed = task_counter.get();
                        if let Err(e) = task_tracker.record_progress(job_id, processed) {
                            tracing::warn!("Progress flush for job {} failed: {}", job_id, e);
                            break;
                        }
                        tracing::trace!("Job {} progress: {}", job_id, processed);
                    }
                }
            }
        });

        Self {
            stop_tx: Some(stop_tx),
            handle,
            tracker,
            job_id,
            counter,
        }
    }

    /// Stops the monitor and publishes the final count
    pub async fn stop(mut self) {
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(());
        }
        if let Err(e) = (&mut self.handle).await {
            tracing::warn!("Progress monitor for job {} ended abnormally: {}", self.job_id, e);
        }
        if let Err(e) = self.tracker.record_progress(self.job_id, self.counter.get()) {
            tracing::warn!("Final progress flush for job {} failed: {}", self.job_id, e);
        }
    }
}
