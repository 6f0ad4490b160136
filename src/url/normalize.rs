use crate::{UrlError, UrlResult};
use url::Url;

/// Resolves a discovered product link against the site base URL
///
/// # Normalization Steps
///
/// 1. Undo JSON slash escaping (`\/p\/x` becomes `/p/x`)
/// 2. Absolute http(s) URLs pass through unchanged
/// 3. Protocol-relative links (`//host/path`) take the base scheme
/// 4. Anything else is joined onto the base URL
///
/// # Examples
///
/// ```
/// use offer_harvest::url::absolutize;
///
/// let url = absolutize("/p/lait-123", "https://www.carrefour.fr").unwrap();
/// assert_eq!(url, "https://www.carrefour.fr/p/lait-123");
/// ```
pub fn absolutize(link: &str, base_url: &str) -> UrlResult<String> {
    let link = unescape_slashes(link.trim());

    if link.is_empty() {
        return Err(UrlError::Parse("empty link".to_string()));
    }

    if link.starts_with("http://") || link.starts_with("https://") {
        let parsed = Url::parse(&link).map_err(|e| UrlError::Parse(e.to_string()))?;
        if parsed.host_str().is_none() {
            return Err(UrlError::MissingHost);
        }
        return Ok(link);
    }

    let base = Url::parse(base_url).map_err(|e| UrlError::Parse(e.to_string()))?;
    if base.scheme() != "http" && base.scheme() != "https" {
        return Err(UrlError::InvalidScheme(base.scheme().to_string()));
    }

    let joined = base
        .join(&link)
        .map_err(|e| UrlError::Parse(format!("{}: {}", link, e)))?;

    if joined.host_str().is_none() {
        return Err(UrlError::MissingHost);
    }

    Ok(joined.to_string())
}

/// Replaces JSON-escaped slashes with plain ones
pub fn unescape_slashes(value: &str) -> String {
    value.replace("\\/", "/")
}

/// Pulls the product identifier out of a product URL
///
/// The identifier is the trailing run of digits in the last path segment,
/// e.g. `3560070472888` for `/p/lait-demi-ecreme-3560070472888`.
pub fn product_id_from_url(url: &str) -> Option<String> {
    let path = match Url::parse(url) {
        Ok(parsed) => parsed.path().to_string(),
        Err(_) => url.split(['?', '#']).next().unwrap_or(url).to_string(),
    };

    let segment = path.trim_end_matches('/').rsplit('/').next()?;
    let prefix_len = segment
        .trim_end_matches(|c: char| c.is_ascii_digit())
        .len();
    let digits = &segment[prefix_len..];

    if digits.is_empty() {
        None
    } else {
        Some(digits.to_string())
    }
}
