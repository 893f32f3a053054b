//! Data models shared by the flattener, the schema filter and the batch source.
//!
//! Raw API payloads stay as [`serde_json::Value`], which already is the sum
//! type over mappings and leaf values that the flattener case-splits on.
//! Flattened output reuses [`serde_json::Map`] so a record can be handed
//! straight to a serializer.
//!
//! - [`NestedValue`]: any node of a raw payload (mapping or leaf)
//! - [`FlatRecord`]: dotted-path key to leaf value
//! - [`Batch`]: the flattened records of one page, in API order
//! - [`PageIndex`]: zero-based page number sent to the API

use serde_json::{Map, Value};

/// A node of a raw payload. `Value::Object` is a mapping, everything else
/// (including arrays) is a leaf.
pub type NestedValue = Value;

/// One result item as returned by the API.
pub type RawRecord = Value;

/// A flattened result item keyed by dotted paths.
pub type FlatRecord = Map<String, Value>;

/// All flattened records for a single page.
pub type Batch = Vec<FlatRecord>;

/// Zero-based page number.
pub type PageIndex = u32;

/// Key of the object wrapping the results container in a search payload.
pub const RESPONSE_KEY: &str = "response";

/// Key of the results container inside [`RESPONSE_KEY`].
pub const DOCS_KEY: &str = "docs";

/// Extract the list of result items from a search payload.
///
/// Article Search wraps its results as `{"response": {"docs": [...]}}`.
/// A payload missing either level, or whose `docs` is not an array, yields
/// an empty slice instead of an error.
pub fn result_items(payload: &Value) -> &[RawRecord] {
    payload
        .get(RESPONSE_KEY)
        .and_then(|response| response.get(DOCS_KEY))
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}
