//! Human-readable batch summaries.

use crate::models::{Batch, FlatRecord};
use serde_json::Value;
use std::fmt::Write;

/// Key used to identify a record in summaries.
pub const ID_KEY: &str = "_id";

/// Key used as a record's title in summaries.
pub const TITLE_KEY: &str = "headline.main";

const MISSING: &str = "-";

/// Render a batch as `"{index} Batch of {n} items"` followed by one
/// `"  - {_id} - {headline.main}"` line per record.
pub fn batch_summary(index: usize, batch: &Batch) -> String {
    let mut out = format!("{} Batch of {} items\n", index, batch.len());
    for record in batch {
        let _ = writeln!(
            out,
            "  - {} - {}",
            display_field(record, ID_KEY),
            display_field(record, TITLE_KEY)
        );
    }
    out
}

/// Render a field for display: strings unquoted, other leaves as JSON,
/// missing keys as `-`.
fn display_field(record: &FlatRecord, key: &str) -> String {
    match record.get(key) {
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
        None => MISSING.to_string(),
    }
}
