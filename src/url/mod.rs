//! URL handling module for Offer-Harvest
//!
//! This module provides product-link normalization, product identifier
//! extraction, and the store pagination convention.

mod normalize;
mod pagination;

pub use normalize::{absolutize, product_id_from_url, unescape_slashes};
pub use pagination::{page_scan_units, page_scan_url};
