//! Regex scan used when the embedded state is unusable
//!
//! Only the heading and the microdata price survive a page whose state blob
//! cannot be read, so fallback records carry no offers and no EAN.

use crate::extract::fields::{parse_amount, strip_html};
use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;

fn title_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?is)<h1[^>]*>(.*?)</h1>").expect("title pattern is valid")
    })
}

fn price_patterns() -> &'static [Regex; 2] {
    static PATTERNS: OnceLock<[Regex; 2]> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            Regex::new(r#"(?is)<meta[^>]*itemprop=["']price["'][^>]*content=["']([^"']+)["']"#)
                .expect("price pattern is valid"),
            Regex::new(r#"(?is)<meta[^>]*content=["']([^"']+)["'][^>]*itemprop=["']price["']"#)
                .expect("price pattern is valid"),
        ]
    })
}

/// Finds the first `<h1>` text, tags stripped
pub fn scan_title(html: &str) -> Option<String> {
    let raw = title_pattern().captures(html)?.get(1)?.as_str();
    let title = strip_html(raw);
    if title.is_empty() {
        None
    } else {
        Some(title)
    }
}

/// Finds the `itemprop="price"` meta value, in either attribute order
pub fn scan_price(html: &str) -> Option<f64> {
    price_patterns().iter().find_map(|pattern| {
        let raw = pattern.captures(html)?.get(1)?.as_str();
        parse_amount(&Value::String(raw.to_string()))
    })
}
