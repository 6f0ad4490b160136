//! Locating and decoding the page's embedded state blob

use crate::extract::ExtractionError;
use serde_json::{Map, Value};

/// Assignment the site uses to ship its initial state to the browser
pub const STATE_MARKER: &str = "window.__INITIAL_STATE__";

/// Terminates the inline script carrying the state
const SCRIPT_END: &str = "</script>";

/// Path from the state root to the map of product entities keyed by id
pub const ENTITY_PATH: &[&str] = &["vuex", "pdp", "productEntities"];

/// Cuts the state assignment out of the HTML and parses it
///
/// The blob runs from the `=` after the marker to the closing script tag,
/// with an optional trailing `;` removed.
pub fn parse_state(html: &str) -> Result<Value, ExtractionError> {
    let marker_at = html
        .find(STATE_MARKER)
        .ok_or_else(|| ExtractionError::JsonParseFailed("state marker not found".to_string()))?;
    let after_marker = &html[marker_at + STATE_MARKER.len()..];

    let equals_at = after_marker.find('=').ok_or_else(|| {
        ExtractionError::JsonParseFailed("state assignment not found".to_string())
    })?;
    let body = &after_marker[equals_at + 1..];

    let body = match body.find(SCRIPT_END) {
        Some(end) => &body[..end],
        None => body,
    };

    let blob = body.trim();
    let blob = blob.strip_suffix(';').unwrap_or(blob).trim_end();

    serde_json::from_str(blob).map_err(|e| ExtractionError::JsonParseFailed(e.to_string()))
}

/// Returns the product entity map, if the state carries one
pub fn entity_map(state: &Value) -> Result<&Map<String, Value>, ExtractionError> {
    ENTITY_PATH
        .iter()
        .try_fold(state, |node, key| node.get(*key))
        .and_then(Value::as_object)
        .filter(|map| !map.is_empty())
        .ok_or_else(|| {
            ExtractionError::JsonParseFailed(format!(
                "entity map {} missing",
                ENTITY_PATH.join(".")
            ))
        })
}

/// Picks the entity for a product
///
/// The identifier from the URL wins when it is a key of the map; otherwise
/// the first key is used. `serde_json` maps iterate in key order, so the
/// choice is stable across runs.
pub fn select_entity<'a>(
    entities: &'a Map<String, Value>,
    url_id: Option<&str>,
) -> Option<(&'a str, &'a Value)> {
    if let Some(id) = url_id {
        if let Some((key, entity)) = entities.get_key_value(id) {
            return Some((key.as_str(), entity));
        }
    }
    entities.iter().next().map(|(key, entity)| (key.as_str(), entity))
}
