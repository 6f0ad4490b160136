//! Product extraction module
//!
//! This module turns a fetched product page into a canonical `ProductRecord`:
//! - Locating and decoding the embedded state blob
//! - Typed access to entity attributes and offers
//! - Offer ranking and featured-offer resolution
//! - A regex fallback for pages without usable state
//! - Per-mode projection into the caller-facing `ProductView`

mod embedded;
mod fallback;
mod fields;
mod product;
mod projection;

pub use embedded::{entity_map, parse_state, select_entity, ENTITY_PATH, STATE_MARKER};
pub use fallback::{scan_price, scan_title};
pub use fields::{
    parse_amount, resolve_brand, resolve_category_path, resolve_ean, resolve_image_paths,
    resolve_price, resolve_seller, resolve_shipping, strip_html, FORMAT_PLACEHOLDER,
    HIGH_RES_FORMAT, MAX_IMAGES,
};
pub use product::{extract_product, extract_product_with, ExtractorSettings};
pub use projection::{project, CompetitorOffer, OutputMode, PricePolicy, ProductView};

use serde::Serialize;
use thiserror::Error;

/// Failures the extractor can report for one page
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExtractionError {
    /// The embedded state could not be read; recoverable through the fallback
    #[error("json_parse_failed: {0}")]
    JsonParseFailed(String),

    /// Neither offers nor the page markup yielded a price
    #[error("no_price_resolved")]
    NoPriceResolved,

    /// A field the requested output mode needs is absent
    #[error("missing_required_field:{0}")]
    MissingRequiredField(&'static str),
}

impl ExtractionError {
    /// Short taxonomy code, used in error placeholders
    pub fn code(&self) -> String {
        match self {
            Self::JsonParseFailed(_) => "json_parse_failed".to_string(),
            Self::NoPriceResolved => "no_price_resolved".to_string(),
            Self::MissingRequiredField(field) => format!("missing_required_field:{}", field),
        }
    }
}

/// Where a record's data came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordSource {
    /// Parsed from the embedded state blob
    EmbeddedState,
    /// Scanned from the markup after the state blob was unusable
    HtmlFallback,
}

/// One resolved offer
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Offer {
    pub offer_id: String,
    pub seller: String,
    pub price: f64,
    pub shipping_cost: f64,
    /// True for the offer the page features by default
    pub is_buybox: bool,
}

/// Canonical, fully populated product record
///
/// `offers` is sorted ascending by price with ties broken by offer id.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProductRecord {
    pub url: String,
    pub product_id: Option<String>,
    pub ean: Option<String>,
    pub title: Option<String>,
    pub brand: Option<String>,
    pub category_path: Vec<String>,
    pub description: Option<String>,
    pub image_urls: Vec<String>,
    pub offers: Vec<Offer>,
    /// Microdata price, only set on the fallback path
    pub fallback_price: Option<f64>,
    pub source: RecordSource,
}

impl ProductRecord {
    /// Category breadcrumb joined for display
    pub fn category_display(&self) -> Option<String> {
        if self.category_path.is_empty() {
            None
        } else {
            Some(self.category_path.join(" > "))
        }
    }

    pub fn lowest_offer(&self) -> Option<&Offer> {
        self.offers.first()
    }

    pub fn featured_offer(&self) -> Option<&Offer> {
        self.offers.iter().find(|offer| offer.is_buybox)
    }

    /// The offer whose price is reported under `policy`
    pub fn selling_offer(&self, policy: PricePolicy) -> Option<&Offer> {
        match policy {
            PricePolicy::Lowest => self.lowest_offer(),
            PricePolicy::Featured => self.featured_offer().or_else(|| self.lowest_offer()),
        }
    }

    /// The selling price under `policy`
    ///
    /// Always one of the offer prices; the microdata price only applies to
    /// fallback records, which have no offers.
    pub fn selling_price(&self, policy: PricePolicy) -> Option<f64> {
        match self.selling_offer(policy) {
            Some(offer) => Some(offer.price),
            None if self.offers.is_empty() => self.fallback_price,
            None => None,
        }
    }

    /// Cheapest offers other than the one reported under `policy`
    pub fn competitors(&self, policy: PricePolicy, limit: usize) -> Vec<&Offer> {
        let reported_id = self
            .selling_offer(policy)
            .map(|offer| offer.offer_id.as_str());
        self.offers
            .iter()
            .filter(|offer| Some(offer.offer_id.as_str()) != reported_id)
            .take(limit)
            .collect()
    }
}
