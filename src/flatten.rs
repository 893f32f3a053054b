//! Dotted-path flattening of nested JSON values.
//!
//! Mappings are expanded recursively, joining keys with `.`; anything else
//! (strings, numbers, booleans, null and arrays) is a leaf and is stored
//! under the path that reached it.
//!
//! ```rust
//! use nyt_batch_source::flatten::flatten;
//! use serde_json::json;
//!
//! let flat = flatten("headline", &json!({"main": "Title", "print": {"page": 3}}));
//! assert_eq!(flat["headline.main"], "Title");
//! assert_eq!(flat["headline.print.page"], 3);
//! ```

use crate::models::{FlatRecord, NestedValue};
use serde_json::Value;

/// Separator placed between path segments.
pub const PATH_SEPARATOR: char = '.';

/// Flatten `data` into a fresh [`FlatRecord`] rooted at `root_key`.
///
/// An empty `root_key` means "no prefix": children of a mapping are keyed
/// by their own names, and a leaf is stored under the empty key.
pub fn flatten(root_key: &str, data: &NestedValue) -> FlatRecord {
    let mut out = FlatRecord::new();
    flatten_into(root_key, data, &mut out);
    out
}

/// Flatten `data` into an existing record. Paths already present in `out`
/// are overwritten.
pub fn flatten_into(root_key: &str, data: &NestedValue, out: &mut FlatRecord) {
    match data {
        Value::Object(map) => {
            for (key, value) in map {
                let path = child_path(root_key, key);
                flatten_into(&path, value, out);
            }
        }
        leaf => {
            out.insert(root_key.to_string(), leaf.clone());
        }
    }
}

/// Build the path of `child` below `root`.
fn child_path(root: &str, child: &str) -> String {
    if root.is_empty() {
        child.to_string()
    } else {
        let mut path = String::with_capacity(root.len() + 1 + child.len());
        path.push_str(root);
        path.push(PATH_SEPARATOR);
        path.push_str(child);
        path
    }
}
