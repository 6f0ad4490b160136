/// Builds the URL of one listing page for a store/category base URL
///
/// The site paginates with `noRedirect=1&page=N`; the pair is appended with
/// `?` or `&` depending on whether the base URL already has a query string.
///
/// # Examples
///
/// ```
/// use offer_harvest::url::page_scan_url;
///
/// assert_eq!(
///     page_scan_url("https://www.carrefour.fr/r/lait", 2),
///     "https://www.carrefour.fr/r/lait?noRedirect=1&page=2"
/// );
/// ```
pub fn page_scan_url(base_url: &str, page: u32) -> String {
    let base = base_url.trim();
    let separator = if base.contains('?') { '&' } else { '?' };
    format!("{}{}noRedirect=1&page={}", base, separator, page)
}

/// Expands every base URL into `pages` page-scan units
///
/// Units are ordered by base URL then page number, starting at page 1.
pub fn page_scan_units(base_urls: &[String], pages: u32) -> Vec<String> {
    base_urls
        .iter()
        .flat_map(|base| (1..=pages).map(move |page| page_scan_url(base, page)))
        .collect()
}
