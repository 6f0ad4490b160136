use crate::extract::{OutputMode, ProductView};
use crate::state::JobPhase;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Opaque job identifier handed back to the submitting caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct JobId(Uuid);

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for JobId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// What a submitted job does with its input URLs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    /// Direct product URLs, full-detail records
    Product,
    /// Store/category URLs to scan for products, then full-detail records
    Store,
    /// Page-accurate price and featured seller
    PriceCheck,
    /// Featured price plus ranked competitor offers
    Repricing,
    /// Lowest listed price
    ListingPrice,
}

impl JobKind {
    /// Returns true if the input URLs are listing pages to scan first
    pub fn discovers_products(&self) -> bool {
        matches!(self, Self::Store)
    }

    /// The projection applied to every extracted record
    pub fn output_mode(&self) -> OutputMode {
        match self {
            Self::Product | Self::Store => OutputMode::FullDetail,
            Self::PriceCheck => OutputMode::PriceCheck,
            Self::Repricing => OutputMode::Repricing,
            Self::ListingPrice => OutputMode::ListingPrice,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Product => "product",
            Self::Store => "store",
            Self::PriceCheck => "price_check",
            Self::Repricing => "repricing",
            Self::ListingPrice => "listing_price",
        }
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for JobKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "product" => Ok(Self::Product),
            "store" => Ok(Self::Store),
            "price_check" => Ok(Self::PriceCheck),
            "repricing" => Ok(Self::Repricing),
            "listing_price" => Ok(Self::ListingPrice),
            other => Err(format!(
                "unknown job kind '{}' (expected product, store, price_check, repricing or listing_price)",
                other
            )),
        }
    }
}

/// One entry of a finished job's results
///
/// Failed items stay in the results as placeholders so the caller can see
/// which URLs did not produce a record and why.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", content = "data", rename_all = "snake_case")]
pub enum JobResult {
    Ok(ProductView),
    Error { url: String, error: String },
}

/// Job record owned by the tracker
#[derive(Debug, Clone)]
pub struct Job {
    pub id: JobId,
    pub kind: JobKind,
    pub phase: JobPhase,
    pub total: usize,
    pub processed: usize,
    pub results: Vec<JobResult>,
    pub error_count: usize,
    pub message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Job {
    pub fn new(kind: JobKind) -> Self {
        Self {
            id: JobId::new(),
            kind,
            phase: JobPhase::Pending,
            total: 0,
            processed: 0,
            results: Vec::new(),
            error_count: 0,
            message: None,
            created_at: Utc::now(),
            completed_at: None,
        }
    }

    /// Builds the caller-facing view, withholding results until terminal
    pub fn status(&self) -> JobStatus {
        let terminal = self.phase.is_terminal();
        JobStatus {
            job_id: self.id,
            kind: self.kind,
            phase: self.phase,
            processed: self.processed,
            total: self.total,
            results_count: if terminal { self.results.len() } else { 0 },
            error_count: self.error_count,
            message: self.message.clone(),
            created_at: self.created_at,
            completed_at: self.completed_at,
            results: if terminal {
                Some(self.results.clone())
            } else {
                None
            },
        }
    }
}

/// Snapshot returned to status pollers
#[derive(Debug, Clone, Serialize)]
pub struct JobStatus {
    pub job_id: JobId,
    pub kind: JobKind,
    pub phase: JobPhase,
    pub processed: usize,
    pub total: usize,
    pub results_count: usize,
    pub error_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub results: Option<Vec<JobResult>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_kind_parsing() {
        assert_eq!("product".parse::<JobKind>(), Ok(JobKind::Product));
        assert_eq!("Store".parse::<JobKind>(), Ok(JobKind::Store));
        assert_eq!("price-check".parse::<JobKind>(), Ok(JobKind::PriceCheck));
        assert_eq!("repricing".parse::<JobKind>(), Ok(JobKind::Repricing));
        assert_eq!("listing_price".parse::<JobKind>(), Ok(JobKind::ListingPrice));
        assert!("catalogue".parse::<JobKind>().is_err());
    }

    #[test]
    fn test_only_store_jobs_discover() {
        assert!(JobKind::Store.discovers_products());
        assert!(!JobKind::Product.discovers_products());
        assert!(!JobKind::Repricing.discovers_products());
    }

    #[test]
    fn test_job_id_roundtrip() {
        let id = JobId::new();
        let parsed: JobId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn test_results_withheld_while_active() {
        let mut job = Job::new(JobKind::Product);
        job.phase = JobPhase::ScrapingProducts;
        job.results.push(JobResult::Error {
            url: "https://www.carrefour.fr/p/x-1".to_string(),
            error: "timeout".to_string(),
        });

        let status = job.status();
        assert!(status.results.is_none());
        assert_eq!(status.results_count, 0);

        let json = serde_json::to_value(&status).unwrap();
        assert!(json.get("results").is_none());
        assert_eq!(json["phase"], "scraping_products");
    }

    #[test]
    fn test_results_exposed_when_terminal() {
        let mut job = Job::new(JobKind::Product);
        job.phase = JobPhase::Completed;
        job.results.push(JobResult::Error {
            url: "https://www.carrefour.fr/p/x-1".to_string(),
            error: "timeout".to_string(),
        });

        let status = job.status();
        assert_eq!(status.results_count, 1);

        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["results"][0]["status"], "error");
        assert_eq!(json["results"][0]["data"]["error"], "timeout");
    }
}
