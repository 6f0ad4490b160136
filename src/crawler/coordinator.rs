//! Job orchestration
//!
//! The pipeline owns the shared components of a process and runs every
//! submitted job on its own task:
//! - Planning the first phase's work units from the request
//! - Scanning listing pages for product links (store jobs)
//! - Scraping, extracting and projecting product pages
//! - Publishing progress and the terminal outcome to the job tracker

use crate::config::{validate, Config};
use crate::crawler::distributor::distribute;
use crate::crawler::fetcher::{FetchFailure, PageFetcher, ServiceFetcher};
use crate::crawler::links::extract_links;
use crate::crawler::session::{ProxySessionManager, SessionProvider};
use crate::extract::{extract_product_with, project, ExtractorSettings, OutputMode};
use crate::media::{rehost_all, HttpImageStore, ImageStore};
use crate::state::{
    scan_phase_failed, scrape_phase_failed, JobId, JobKind, JobPhase, JobResult, JobStatus,
    JobTracker, ProgressCounter, ProgressMonitor,
};
use crate::url::page_scan_units;
use crate::{HarvestError, Result};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use url::Url;

/// Error code reported for a unit whose task panicked
const UNIT_PANICKED: &str = "unit_panicked";
const WORKER_LOST: &str = "worker_lost";

/// Shared components and the entry points for running jobs
#[derive(Clone)]
pub struct Pipeline {
    config: Arc<Config>,
    fetcher: Arc<dyn PageFetcher>,
    images: Option<Arc<dyn ImageStore>>,
    tracker: Arc<JobTracker>,
    settings: Arc<ExtractorSettings>,
}

impl Pipeline {
    /// Builds a pipeline with the HTTP-backed components the config describes
    ///
    /// # Arguments
    ///
    /// * `config` - Configuration, validated again here
    ///
    /// # Returns
    ///
    /// * `Ok(Pipeline)` - Ready to accept jobs
    /// * `Err(HarvestError)` - Invalid configuration, or an HTTP client could not be built
    pub fn new(config: Config) -> Result<Self> {
        validate(&config)?;
        let sessions: Option<Arc<dyn SessionProvider>> = config
            .proxy
            .clone()
            .map(|proxy| Arc::new(ProxySessionManager::new(proxy)) as Arc<dyn SessionProvider>);
        let fetcher = ServiceFetcher::new(&config.fetch_service, sessions)?;

        let images = match &config.images {
            Some(host) => Some(Arc::new(HttpImageStore::new(host)?) as Arc<dyn ImageStore>),
            None => None,
        };

        Ok(Self::assemble(config, Arc::new(fetcher), images))
    }

    /// Builds a pipeline around caller-supplied fetcher and image store
    pub fn with_components(
        config: Config,
        fetcher: Arc<dyn PageFetcher>,
        images: Option<Arc<dyn ImageStore>>,
    ) -> Result<Self> {
        validate(&config)?;
        Ok(Self::assemble(config, fetcher, images))
    }

    fn assemble(
        config: Config,
        fetcher: Arc<dyn PageFetcher>,
        images: Option<Arc<dyn ImageStore>>,
    ) -> Self {
        let settings = ExtractorSettings::from_site(&config.site);
        Self {
            config: Arc::new(config),
            fetcher,
            images,
            tracker: Arc::new(JobTracker::new()),
            settings: Arc::new(settings),
        }
    }

    pub fn tracker(&self) -> Arc<JobTracker> {
        Arc::clone(&self.tracker)
    }

    pub fn status(&self, id: JobId) -> Option<JobStatus> {
        self.tracker.status(id)
    }

    /// Validates a request and returns the units its first phase will run
    ///
    /// Store jobs expand every base URL into `pages` listing-page units;
    /// other jobs use their URLs as given.
    pub fn plan_units(kind: JobKind, urls: &[String], pages: u32) -> Result<Vec<String>> {
        if pages == 0 {
            return Err(HarvestError::InvalidRequest(
                "pages must be at least 1".to_string(),
            ));
        }

        for url in urls {
            let parsed = Url::parse(url)
                .map_err(|e| HarvestError::InvalidRequest(format!("{}: {}", url, e)))?;
            if parsed.scheme() != "http" && parsed.scheme() != "https" {
                return Err(HarvestError::InvalidRequest(format!(
                    "{}: only http and https URLs are accepted",
                    url
                )));
            }
        }

        if kind.discovers_products() {
            Ok(page_scan_units(urls, pages))
        } else {
            Ok(urls.to_vec())
        }
    }

    /// Registers a job and starts it in the background
    ///
    /// Must be called from within a Tokio runtime. A job task that errors or
    /// panics leaves the job `failed`.
    ///
    /// # Returns
    ///
    /// * `Ok(JobId)` - The job is running; poll `status` for progress
    /// * `Err(HarvestError::InvalidRequest)` - Rejected before a job was created
    pub fn submit(&self, kind: JobKind, urls: Vec<String>, pages: u32) -> Result<JobId> {
        let units = Self::plan_units(kind, &urls, pages)?;
        let id = self.tracker.create(kind);
        tracing::info!(
            "Submitted {} job {} with {} input URLs ({} units)",
            kind,
            id,
            urls.len(),
            units.len()
        );

        let pipeline = self.clone();
        let job = tokio::spawn(async move { pipeline.run_job(id, kind, units).await });

        let tracker = Arc::clone(&self.tracker);
        tokio::spawn(async move {
            let reason = match job.await {
                Ok(Ok(())) => return,
                Ok(Err(e)) => format!("Job aborted: {}", e),
                Err(e) => format!("Job task crashed: {}", e),
            };
            tracing::error!("Job {}: {}", id, reason);
            if let Err(e) = tracker.fail(id, reason) {
                tracing::error!("Could not mark job {} failed: {}", id, e);
            }
        });

        Ok(id)
    }

    /// Polls a job until it reaches a terminal phase
    ///
    /// Returns `None` for an unknown job.
    pub async fn wait_for(&self, id: JobId, poll_interval: Duration) -> Option<JobStatus> {
        loop {
            let status = self.tracker.status(id)?;
            if status.phase.is_terminal() {
                return Some(status);
            }
            tokio::time::sleep(poll_interval).await;
        }
    }

    async fn run_job(&self, id: JobId, kind: JobKind, units: Vec<String>) -> Result<()> {
        let started = Instant::now();

        let product_urls = if kind.discovers_products() {
            match self.scan_pages(id, units).await? {
                Some(urls) => urls,
                None => {
                    self.log_summary(id, started);
                    return Ok(());
                }
            }
        } else {
            units
        };

        if product_urls.is_empty() && kind.discovers_products() {
            self.tracker
                .set_message(id, "No product links discovered on the scanned pages")?;
            self.tracker.complete(id, Vec::new())?;
        } else {
            self.scrape_products(id, kind.output_mode(), product_urls)
                .await?;
        }

        self.log_summary(id, started);
        Ok(())
    }

    /// Fetches every listing-page unit and collects the product links
    ///
    /// Returns `None` when the job was marked failed.
    async fn scan_pages(&self, id: JobId, units: Vec<String>) -> Result<Option<Vec<String>>> {
        let total = units.len();
        self.tracker.begin_phase(id, JobPhase::ScanningPages, total)?;

        let counter = ProgressCounter::new();
        let monitor = self.monitor(id, &counter);

        let fetcher = Arc::clone(&self.fetcher);
        let base_url = self.config.site.base_url.clone();
        let distribution = distribute(
            units,
            self.config.workers.worker_count,
            self.config.workers.per_worker_concurrency,
            counter,
            move |unit: String| {
                let fetcher = Arc::clone(&fetcher);
                let base_url = base_url.clone();
                async move {
                    match fetcher.fetch(&unit).await {
                        Ok(html) => Ok(extract_links(&html, &base_url)),
                        Err(failure) => Err((unit, failure)),
                    }
                }
            },
        )
        .await;

        monitor.stop().await;

        for (unit, failure) in &distribution.failed {
            tracing::warn!("Page scan of {} failed: {}", unit, failure);
        }
        let failed_pages = distribution.error_count();
        self.tracker.add_errors(id, failed_pages)?;

        if scan_phase_failed(total, failed_pages) {
            let reason = scan_failure_message(total, &distribution.failed);
            tracing::warn!("Job {}: {}", id, reason);
            self.tracker.fail(id, reason)?;
            return Ok(None);
        }

        let discovered: BTreeSet<String> = distribution.succeeded.into_iter().flatten().collect();
        let message = format!(
            "Discovered {} products on {} of {} listing pages",
            discovered.len(),
            total - failed_pages,
            total
        );
        tracing::info!("Job {}: {}", id, message);
        self.tracker.set_message(id, message)?;

        Ok(Some(discovered.into_iter().collect()))
    }

    /// Fetches, extracts and projects every product page, then finishes the job
    async fn scrape_products(&self, id: JobId, mode: OutputMode, urls: Vec<String>) -> Result<()> {
        let total = urls.len();
        self.tracker
            .begin_phase(id, JobPhase::ScrapingProducts, total)?;

        let counter = ProgressCounter::new();
        let monitor = self.monitor(id, &counter);

        let fetcher = Arc::clone(&self.fetcher);
        let images = self.images.clone();
        let settings = Arc::clone(&self.settings);
        let distribution = distribute(
            urls,
            self.config.workers.worker_count,
            self.config.workers.per_worker_concurrency,
            counter,
            move |url: String| {
                let fetcher = Arc::clone(&fetcher);
                let images = images.clone();
                let settings = Arc::clone(&settings);
                async move { scrape_one(url, mode, fetcher, images, settings).await }
            },
        )
        .await;

        monitor.stop().await;

        let errors = distribution.error_count();
        self.tracker.add_errors(id, errors)?;

        if scrape_phase_failed(total, errors) {
            let reason = format!(
                "Product scrape failed: {} of {} product pages could not be processed",
                errors, total
            );
            tracing::warn!("Job {}: {}", id, reason);
            self.tracker.fail(id, reason)?;
            return Ok(());
        }

        let mut results = distribution.succeeded;
        results.extend(distribution.failed);
        results.extend(distribution.crashed.into_iter().map(|url| JobResult::Error {
            url,
            error: UNIT_PANICKED.to_string(),
        }));
        results.extend(distribution.lost.into_iter().map(|url| JobResult::Error {
            url,
            error: WORKER_LOST.to_string(),
        }));

        self.tracker.set_message(
            id,
            format!("Scraped {} of {} product pages", total - errors, total),
        )?;
        self.tracker.complete(id, results)
    }

    fn monitor(&self, id: JobId, counter: &ProgressCounter) -> ProgressMonitor {
        ProgressMonitor::spawn(
            Arc::clone(&self.tracker),
            id,
            counter.clone(),
            self.config.workers.progress_interval(),
        )
    }

    fn log_summary(&self, id: JobId, started: Instant) {
        if let Some(status) = self.tracker.status(id) {
            tracing::info!(
                "Job {} ({}) ended {} in {:.1}s: {} results, {} errors",
                id,
                status.kind,
                status.phase,
                started.elapsed().as_secs_f64(),
                status.results_count,
                status.error_count
            );
        }
    }
}

/// Runs one product unit, turning every failure into a placeholder
async fn scrape_one(
    url: String,
    mode: OutputMode,
    fetcher: Arc<dyn PageFetcher>,
    images: Option<Arc<dyn ImageStore>>,
    settings: Arc<ExtractorSettings>,
) -> std::result::Result<JobResult, JobResult> {
    let html = match fetcher.fetch(&url).await {
        Ok(html) => html,
        Err(failure) => {
            tracing::debug!("Fetch of {} failed: {}", url, failure);
            return Err(JobResult::Error {
                url,
                error: failure.kind(),
            });
        }
    };

    let record = match extract_product_with(&html, &url, &settings) {
        Ok(record) => record,
        Err(e) => {
            tracing::debug!("Extraction from {} failed: {}", url, e);
            return Err(JobResult::Error { url, error: e.code() });
        }
    };

    let slots = if mode.wants_images() {
        rehost_all(images.as_deref(), &record.image_urls).await
    } else {
        Vec::new()
    };

    project(&record, mode, slots)
        .map(JobResult::Ok)
        .map_err(|e| JobResult::Error { url, error: e.code() })
}

fn scan_failure_message(total: usize, failed: &[(String, FetchFailure)]) -> String {
    let mut kinds: Vec<String> = failed.iter().map(|(_, failure)| failure.kind()).collect();
    kinds.sort();
    kinds.dedup();

    if kinds.is_empty() {
        format!("Page scan failed: none of the {} listing pages could be fetched", total)
    } else {
        format!(
            "Page scan failed: none of the {} listing pages could be fetched ({})",
            total,
            kinds.join(", ")
        )
    }
}
