//! Output sinks for produced batches.
//!
//! # Submodules
//!
//! - [`console`]: one summary line per batch plus one line per record
//! - [`jsonl`]: appends every flattened record to a JSON Lines file
//!
//! # Output Structure
//!
//! ```text
//! stdout:
//! 0 Batch of 10 items
//!   - nyt://article/0f3c... - Inside the Valley's New Gold Rush
//!   ...
//!
//! --output results/articles.jsonl:
//! {"_id":"nyt://article/0f3c...","headline.main":"Inside the Valley's New Gold Rush",...}
//! ```

pub mod console;
pub mod jsonl;
