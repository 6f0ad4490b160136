//! Work distribution across bounded worker pools
//!
//! Two levels of parallelism:
//! - The item list is cut into contiguous batches, one spawned worker each
//! - Inside a worker, units run with bounded concurrency, each on its own
//!   task so a panicking unit is isolated and counted as a failure

use crate::state::ProgressCounter;
use futures::stream::{self, StreamExt};
use std::future::Future;
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Aggregated outcome of a distributed run
///
/// Outcomes are in completion order, not input order.
#[derive(Debug)]
pub struct Distribution<I, T, E> {
    pub succeeded: Vec<T>,
    pub failed: Vec<E>,
    /// Items whose unit panicked
    pub crashed: Vec<I>,
    /// Items of a batch whose worker task ended without a report
    pub lost: Vec<I>,
}

impl<I, T, E> Distribution<I, T, E> {
    fn empty() -> Self {
        Self {
            succeeded: Vec::new(),
            failed: Vec::new(),
            crashed: Vec::new(),
            lost: Vec::new(),
        }
    }

    fn merge(&mut self, other: Self) {
        self.succeeded.extend(other.succeeded);
        self.failed.extend(other.failed);
        self.crashed.extend(other.crashed);
        self.lost.extend(other.lost);
    }

    /// Failed, crashed and lost units
    pub fn error_count(&self) -> usize {
        self.failed.len() + self.crashed.len() + self.lost.len()
    }

    pub fn total(&self) -> usize {
        self.succeeded.len() + self.error_count()
    }
}

/// Cuts `items` into contiguous batches of `ceil(len / worker_count)`
pub fn partition<I>(items: Vec<I>, worker_count: usize) -> Vec<Vec<I>> {
    if items.is_empty() {
        return Vec::new();
    }

    let batch_size = items.len().div_ceil(worker_count.max(1));
    let mut remaining = items;
    let mut batches = Vec::new();
    while !remaining.is_empty() {
        let tail = remaining.split_off(batch_size.min(remaining.len()));
        batches.push(std::mem::replace(&mut remaining, tail));
    }
    batches
}

/// Runs `unit_fn` over every item
///
/// # Arguments
///
/// * `items` - Work items, one unit each
/// * `worker_count` - Number of spawned worker tasks
/// * `per_worker_concurrency` - Units in flight per worker
/// * `progress` - Incremented once per finished unit, whatever its outcome
/// * `unit_fn` - The unit of work
pub async fn distribute<I, T, E, F, Fut>(
    items: Vec<I>,
    worker_count: usize,
    per_worker_concurrency: usize,
    progress: ProgressCounter,
    unit_fn: F,
) -> Distribution<I, T, E>
where
    I: Clone + Send + 'static,
    T: Send + 'static,
    E: Send + 'static,
    F: Fn(I) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, E>> + Send + 'static,
{
    let unit_fn = Arc::new(unit_fn);
    let concurrency = per_worker_concurrency.max(1);

    let workers: Vec<_> = partition(items, worker_count)
        .into_iter()
        .enumerate()
        .map(|(worker_id, batch)| {
            let unit_fn = Arc::clone(&unit_fn);
            let progress = progress.clone();
            let retained = batch.clone();
            let handle = tokio::spawn(run_worker(worker_id, batch, concurrency, progress, unit_fn));
            (retained, handle)
        })
        .collect();

    collect_reports(workers).await
}

/// Merges worker reports; a worker that ended abnormally loses its whole batch
async fn collect_reports<I, T, E>(
    workers: Vec<(Vec<I>, JoinHandle<Distribution<I, T, E>>)>,
) -> Distribution<I, T, E> {
    let mut distribution = Distribution::empty();
    for (batch, worker) in workers {
        match worker.await {
            Ok(report) => distribution.merge(report),
            Err(e) => {
                tracing::error!(
                    "Worker task ended abnormally, {} items lost: {}",
                    batch.len(),
                    e
                );
                distribution.lost.extend(batch);
            }
        }
    }
    distribution
}

async fn run_worker<I, T, E, F, Fut>(
    worker_id: usize,
    batch: Vec<I>,
    concurrency: usize,
    progress: ProgressCounter,
    unit_fn: Arc<F>,
) -> Distribution<I, T, E>
where
    I: Clone + Send + 'static,
    T: Send + 'static,
    E: Send + 'static,
    F: Fn(I) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, E>> + Send + 'static,
{
    tracing::debug!("Worker {} starting on {} items", worker_id, batch.len());

    let mut report = Distribution::empty();
    let mut units = stream::iter(batch)
        .map(|item| {
            let retained = item.clone();
            let unit = tokio::spawn(unit_fn(item));
            async move { (retained, unit.await) }
        })
        .buffer_unordered(concurrency);

    while let Some((item, joined)) = units.next().await {
        progress.increment();
        match joined {
            Ok(Ok(value)) => report.succeeded.push(value),
            Ok(Err(error)) => report.failed.push(error),
            Err(e) => {
                tracing::warn!("Worker {} unit crashed: {}", worker_id, e);
                report.crashed.push(item);
            }
        }
    }

    tracing::debug!(
        "Worker {} done: {} ok, {} failed, {} crashed",
        worker_id,
        report.succeeded.len(),
        report.failed.len(),
        report.crashed.len()
    );
    report
}
