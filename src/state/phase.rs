/// Job phase definitions
///
/// Store jobs move `Pending -> ScanningPages -> ScrapingProducts -> terminal`;
/// product-URL jobs skip the scan phase.
use serde::Serialize;
use std::fmt;

/// Represents the current phase of a job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobPhase {
    // ===== Active Phases =====
    /// Job is registered but no work has started
    Pending,

    /// Listing pages are being fetched to discover product URLs
    ScanningPages,

    /// Product pages are being fetched and extracted
    ScrapingProducts,

    // ===== Terminal Phases =====
    /// Job finished; results are available
    Completed,

    /// Job crossed a failure threshold or crashed
    Failed,
}

impl JobPhase {
    /// Returns true if no further transitions can happen
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Returns true if the job is still doing work
    pub fn is_active(&self) -> bool {
        !self.is_terminal()
    }

    /// Checks whether moving from `self` to `next` is a legal transition
    ///
    /// Any active phase may fail. Discovery can complete directly when it
    /// yields no products.
    pub fn can_transition_to(&self, next: JobPhase) -> bool {
        use JobPhase::*;
        match (self, next) {
            (_, Failed) => self.is_active(),
            (Pending, ScanningPages) => true,
            (Pending, ScrapingProducts) => true,
            (Pending, Completed) => true,
            (ScanningPages, ScrapingProducts) => true,
            (ScanningPages, Completed) => true,
            (ScrapingProducts, Completed) => true,
            _ => false,
        }
    }

    /// Returns the wire representation used in status payloads
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::ScanningPages => "scanning_pages",
            Self::ScrapingProducts => "scraping_products",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    /// Returns all phases in lifecycle order
    pub fn all_phases() -> Vec<Self> {
        vec![
            Self::Pending,
            Self::ScanningPages,
            Self::ScrapingProducts,
            Self::Completed,
            Self::Failed,
        ]
    }
}

impl fmt::Display for JobPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
