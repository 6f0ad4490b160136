//! Product page extraction
//!
//! # Extraction Flow
//!
//! 1. Parse the embedded state blob
//! 2. Pick the product entity (URL identifier, else first key)
//! 3. Read attributes through the typed accessors in `fields`
//! 4. Resolve, rank and flag offers
//! 5. On an unusable state blob, fall back to scanning the markup

use crate::config::SiteConfig;
use crate::extract::embedded::{entity_map, parse_state, select_entity};
use crate::extract::fallback::{scan_price, scan_title};
use crate::extract::fields::{
    non_empty_str, resolve_brand, resolve_category_path, resolve_ean, resolve_image_paths,
    resolve_price, resolve_seller, resolve_shipping, strip_html,
};
use crate::extract::{ExtractionError, Offer, ProductRecord, RecordSource};
use crate::url::{absolutize, product_id_from_url};
use serde_json::Value;

/// Site conventions the extractor needs
#[derive(Debug, Clone)]
pub struct ExtractorSettings {
    /// Seller label for offers without marketplace data
    pub default_seller: String,
    /// Base URL image paths are resolved against
    pub image_base_url: String,
}

impl ExtractorSettings {
    pub fn from_site(site: &SiteConfig) -> Self {
        Self {
            default_seller: site.default_seller.clone(),
            image_base_url: site.image_base_url.clone(),
        }
    }
}

impl Default for ExtractorSettings {
    fn default() -> Self {
        Self {
            default_seller: "Carrefour".to_string(),
            image_base_url: "https://media.carrefour.fr/medias/".to_string(),
        }
    }
}

/// Extracts a product record using the default site conventions
///
/// # Example
///
/// ```
/// use offer_harvest::extract::extract_product;
///
/// let html = r#"<h1>Lait 1L</h1><meta itemprop="price" content="1.09">"#;
/// let record = extract_product(html, "https://www.carrefour.fr/p/lait-123").unwrap();
/// assert_eq!(record.title.as_deref(), Some("Lait 1L"));
/// assert!(record.offers.is_empty());
/// ```
pub fn extract_product(html: &str, url: &str) -> Result<ProductRecord, ExtractionError> {
    extract_product_with(html, url, &ExtractorSettings::default())
}

/// Extracts a product record from a fetched page
///
/// # Returns
///
/// * `Ok(ProductRecord)` - From the embedded state, or from the markup fallback
/// * `Err(ExtractionError::NoPriceResolved)` - No usable price on either path
pub fn extract_product_with(
    html: &str,
    url: &str,
    settings: &ExtractorSettings,
) -> Result<ProductRecord, ExtractionError> {
    let url_id = product_id_from_url(url);

    let from_state = parse_state(html)
        .and_then(|state| record_from_state(&state, url, url_id.as_deref(), settings));

    match from_state {
        Ok(record) => Ok(record),
        Err(ExtractionError::JsonParseFailed(reason)) => {
            tracing::debug!("Embedded state unusable for {}: {}", url, reason);
            record_from_markup(html, url, url_id)
        }
        Err(e) => Err(e),
    }
}

fn record_from_state(
    state: &Value,
    url: &str,
    url_id: Option<&str>,
    settings: &ExtractorSettings,
) -> Result<ProductRecord, ExtractionError> {
    let entities = entity_map(state)?;
    let (product_id, entity) = select_entity(entities, url_id).ok_or_else(|| {
        ExtractionError::JsonParseFailed("entity map has no entries".to_string())
    })?;

    if url_id.is_some() && url_id != Some(product_id) {
        tracing::debug!(
            "URL identifier {:?} not in entity map for {}, using {}",
            url_id,
            url,
            product_id
        );
    }

    let attributes = entity.get("attributes").unwrap_or(entity);

    let selected = non_empty_str(attributes.get("selectedOfferId"));
    let offers = rank_offers(
        resolve_offers(attributes, product_id, &settings.default_seller),
        selected.as_deref(),
    );
    if offers.is_empty() {
        return Err(ExtractionError::NoPriceResolved);
    }

    let image_urls = resolve_image_paths(attributes)
        .into_iter()
        .filter_map(|path| match absolutize(&path, &settings.image_base_url) {
            Ok(absolute) => Some(absolute),
            Err(e) => {
                tracing::debug!("Skipping image path {}: {}", path, e);
                None
            }
        })
        .collect();

    Ok(ProductRecord {
        url: url.to_string(),
        product_id: Some(product_id.to_string()),
        ean: resolve_ean(attributes, product_id),
        title: non_empty_str(attributes.get("title")),
        brand: resolve_brand(attributes),
        category_path: resolve_category_path(attributes),
        description: non_empty_str(attributes.get("description"))
            .map(|d| strip_html(&d))
            .filter(|d| !d.is_empty()),
        image_urls,
        offers,
        fallback_price: None,
        source: RecordSource::EmbeddedState,
    })
}

/// Reads every offer with a resolvable price
///
/// Offers live under `offers.<product id>` as either an id-keyed map or a
/// list. A bare list directly under `offers` is accepted too.
fn resolve_offers(attributes: &Value, product_id: &str, default_seller: &str) -> Vec<Offer> {
    let Some(offers) = attributes.get("offers") else {
        return Vec::new();
    };

    let subtree = match (offers.get(product_id), offers) {
        (Some(subtree), _) => subtree,
        (None, Value::Array(_)) => offers,
        (None, _) => return Vec::new(),
    };

    let entries: Vec<(String, &Value)> = match subtree {
        Value::Object(map) => map.iter().map(|(key, offer)| (key.clone(), offer)).collect(),
        Value::Array(items) => items
            .iter()
            .enumerate()
            .map(|(index, offer)| (index.to_string(), offer))
            .collect(),
        _ => return Vec::new(),
    };

    entries
        .into_iter()
        .filter_map(|(fallback_id, offer)| {
            let price = resolve_price(offer)?;
            Some(Offer {
                offer_id: non_empty_str(offer.get("offerId")).unwrap_or(fallback_id),
                seller: resolve_seller(offer, default_seller),
                price,
                shipping_cost: resolve_shipping(offer),
                is_buybox: false,
            })
        })
        .collect()
}

/// Sorts offers by price and flags the featured one
///
/// The featured offer is the one matching `selected`; when nothing matches,
/// the cheapest offer is featured.
fn rank_offers(mut offers: Vec<Offer>, selected: Option<&str>) -> Vec<Offer> {
    offers.sort_by(|a, b| {
        a.price
            .total_cmp(&b.price)
            .then_with(|| a.offer_id.cmp(&b.offer_id))
    });

    let featured = selected
        .and_then(|id| offers.iter().position(|offer| offer.offer_id == id))
        .unwrap_or(0);
    if let Some(offer) = offers.get_mut(featured) {
        offer.is_buybox = true;
    }

    offers
}

fn record_from_markup(
    html: &str,
    url: &str,
    url_id: Option<String>,
) -> Result<ProductRecord, ExtractionError> {
    let price = scan_price(html).ok_or(ExtractionError::NoPriceResolved)?;

    Ok(ProductRecord {
        url: url.to_string(),
        product_id: url_id,
        ean: None,
        title: scan_title(html),
        brand: None,
        category_path: Vec::new(),
        description: None,
        image_urls: Vec::new(),
        offers: Vec::new(),
        fallback_price: Some(price),
        source: RecordSource::HtmlFallback,
    })
}
