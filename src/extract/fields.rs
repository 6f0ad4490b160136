//! Typed access to the embedded page state
//!
//! Each accessor documents its default. `None` always means "absent or not
//! usable", never a parse error of the surrounding document.

use scraper::Html;
use serde_json::Value;

/// Token substituted for the `{format}` placeholder in image paths
pub const HIGH_RES_FORMAT: &str = "1500x1500";

/// Placeholder the site leaves in image paths for the rendition size
pub const FORMAT_PLACEHOLDER: &str = "{format}";

/// Maximum number of images kept per product
pub const MAX_IMAGES: usize = 5;

/// Reads a monetary amount from a JSON number or a numeric string
///
/// Strings may use `.` or `,` as decimal separator, may group thousands with
/// the other one (or with spaces), and may carry a currency sign. Negative and
/// non-finite values are rejected.
pub fn parse_amount(value: &Value) -> Option<f64> {
    let amount = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => {
            let cleaned: String = s
                .chars()
                .filter(|c| c.is_ascii_digit() || *c == '.' || *c == ',' || *c == '-')
                .collect();
            if cleaned.is_empty() {
                return None;
            }
            normalize_decimal(&cleaned).parse::<f64>().ok()?
        }
        _ => return None,
    };

    if amount.is_finite() && amount >= 0.0 {
        Some(amount)
    } else {
        None
    }
}

/// Rewrites a digit string so `.` is the only, decimal, separator
///
/// When both separators appear the last one is the decimal point. A single
/// separator kind repeated more than once only groups thousands.
fn normalize_decimal(cleaned: &str) -> String {
    let decimal = match (cleaned.rfind('.'), cleaned.rfind(',')) {
        (Some(dot), Some(comma)) => Some(dot.max(comma)),
        (Some(pos), None) if cleaned.matches('.').count() == 1 => Some(pos),
        (None, Some(pos)) if cleaned.matches(',').count() == 1 => Some(pos),
        _ => None,
    };

    cleaned
        .char_indices()
        .filter_map(|(i, c)| match c {
            '.' | ',' if Some(i) == decimal => Some('.'),
            '.' | ',' => None,
            other => Some(other),
        })
        .collect()
}

/// Reads a non-empty, trimmed string
pub fn non_empty_str(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_string())
            }
        }
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Resolves the effective price of one offer
///
/// A promotion's `discountedPrice` wins over the base `price`. The base price
/// may be nested (`price.price`) or given directly (`price`). Returns `None`
/// when neither yields a usable amount; such offers are discarded.
pub fn resolve_price(offer: &Value) -> Option<f64> {
    let price = offer.get("price")?;

    let promoted = price
        .get("promotion")
        .and_then(|promo| promo.get("discountedPrice"))
        .and_then(parse_amount);
    if promoted.is_some() {
        return promoted;
    }

    match price {
        Value::Object(_) => price.get("price").and_then(parse_amount),
        other => parse_amount(other),
    }
}

/// Resolves the shipping charge of one offer
///
/// `0` when the free-shipping flag is set, else the listed `charge`, else `0`.
pub fn resolve_shipping(offer: &Value) -> f64 {
    let Some(shipping) = offer.get("shipping") else {
        return 0.0;
    };

    if shipping.get("free").and_then(Value::as_bool) == Some(true) {
        return 0.0;
    }

    shipping
        .get("charge")
        .and_then(parse_amount)
        .unwrap_or(0.0)
}

/// Resolves the seller label of one offer
///
/// Marketplace offers carry `marketplace.seller.name`; anything else is sold
/// by the site itself and gets `default_seller`.
pub fn resolve_seller(offer: &Value, default_seller: &str) -> String {
    non_empty_str(
        offer
            .get("marketplace")
            .and_then(|m| m.get("seller"))
            .and_then(|s| s.get("name")),
    )
    .unwrap_or_else(|| default_seller.to_string())
}

/// Resolves the brand, given either as a string or as `{name}`
pub fn resolve_brand(attributes: &Value) -> Option<String> {
    let brand = attributes.get("brand")?;
    match brand {
        Value::Object(_) => non_empty_str(brand.get("name")),
        other => non_empty_str(Some(other)),
    }
}

/// Resolves the category breadcrumb, ordered by its `level` field
///
/// Source order does not follow hierarchy depth, so entries are sorted by
/// `level`; entries without a level go last in source order. Empty labels are
/// dropped. Returns an empty list when no categories are present.
pub fn resolve_category_path(attributes: &Value) -> Vec<String> {
    let Some(categories) = attributes.get("categories").and_then(Value::as_array) else {
        return Vec::new();
    };

    let mut levelled: Vec<(u64, String)> = categories
        .iter()
        .filter_map(|category| {
            let label = non_empty_str(category.get("label"))
                .or_else(|| non_empty_str(category.get("name")))?;
            let level = category
                .get("level")
                .and_then(|l| l.as_u64().or_else(|| l.as_str()?.trim().parse().ok()))
                .unwrap_or(u64::MAX);
            Some((level, label))
        })
        .collect();

    // Stable sort keeps source order among equal levels
    levelled.sort_by_key(|(level, _)| *level);
    levelled.into_iter().map(|(_, label)| label).collect()
}

/// Resolves the EAN, falling back to a numeric product identifier
pub fn resolve_ean(attributes: &Value, product_id: &str) -> Option<String> {
    non_empty_str(attributes.get("ean")).or_else(|| {
        let looks_like_ean = (8..=14).contains(&product_id.len())
            && product_id.chars().all(|c| c.is_ascii_digit());
        looks_like_ean.then(|| product_id.to_string())
    })
}

/// Collects up to five image paths with the high-resolution format applied
///
/// Accepts `images.paths: [...]` or a bare `images: [...]` array.
pub fn resolve_image_paths(attributes: &Value) -> Vec<String> {
    let Some(images) = attributes.get("images") else {
        return Vec::new();
    };

    let paths = match images {
        Value::Array(items) => items.as_slice(),
        Value::Object(_) => match images.get("paths").and_then(Value::as_array) {
            Some(items) => items.as_slice(),
            None => return Vec::new(),
        },
        _ => return Vec::new(),
    };

    paths
        .iter()
        .filter_map(|p| non_empty_str(Some(p)))
        .take(MAX_IMAGES)
        .map(|p| p.replace(FORMAT_PLACEHOLDER, HIGH_RES_FORMAT))
        .collect()
}

/// Strips markup from an HTML fragment and unescapes entities
///
/// Whitespace runs collapse to a single space.
pub fn strip_html(fragment: &str) -> String {
    let parsed = Html::parse_fragment(fragment);
    let text: String = parsed.root_element().text().collect::<Vec<_>>().join(" ");
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
