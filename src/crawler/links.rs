//! Product link discovery on listing pages
//!
//! Listing pages expose product links in two places:
//! - Ordinary `<a href>` attributes in the rendered markup
//! - JSON payloads inlined in scripts, where slashes are escaped (`\/p\/...`)
//!
//! Both are collected, stripped of query and fragment, resolved against the
//! site base URL, and de-duplicated.

use crate::url::absolutize;
use regex::Regex;
use scraper::{Html, Selector};
use std::collections::BTreeSet;
use std::sync::OnceLock;
use url::Url;

/// Path segment that marks a product page
pub const PRODUCT_SEGMENT: &str = "/p/";

fn escaped_path_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"\\/p\\/[A-Za-z0-9%._~\-]+").expect("escaped path pattern is valid")
    })
}

/// Extracts the set of product URLs referenced by a page
///
/// An empty set is a normal outcome for a page past the last listing page.
///
/// # Arguments
///
/// * `html` - The listing page content
/// * `base_url` - Site base URL for resolving relative paths
///
/// # Example
///
/// ```
/// use offer_harvest::crawler::extract_links;
///
/// let html = r#"<a href="/p/lait-123?x=1">Lait</a><a href="/promo">Promo</a>"#;
/// let links = extract_links(html, "https://www.carrefour.fr");
/// assert_eq!(links.len(), 1);
/// assert!(links.contains("https://www.carrefour.fr/p/lait-123"));
/// ```
pub fn extract_links(html: &str, base_url: &str) -> BTreeSet<String> {
    let mut candidates: Vec<String> = Vec::new();

    let document = Html::parse_document(html);
    if let Ok(selector) = Selector::parse("a[href]") {
        candidates.extend(
            document
                .select(&selector)
                .filter_map(|element| element.value().attr("href"))
                .filter(|href| href.contains(PRODUCT_SEGMENT))
                .map(str::to_string),
        );
    }

    candidates.extend(
        escaped_path_pattern()
            .find_iter(html)
            .map(|m| m.as_str().to_string()),
    );

    candidates
        .iter()
        .filter_map(|candidate| resolve_product_link(candidate, base_url))
        .collect()
}

/// Resolves one candidate, keeping it only if it is a product page
fn resolve_product_link(candidate: &str, base_url: &str) -> Option<String> {
    let absolute = absolutize(candidate, base_url).ok()?;
    let mut url = Url::parse(&absolute).ok()?;

    let is_product = url
        .path()
        .strip_prefix(PRODUCT_SEGMENT)
        .is_some_and(|rest| !rest.is_empty());
    if !is_product {
        return None;
    }

    url.set_query(None);
    url.set_fragment(None);
    Some(url.to_string())
}
