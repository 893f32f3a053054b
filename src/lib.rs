//! # NYT Batch Source
//!
//! A data-source connector for the New York Times Article Search API. It
//! pages through search results, keeps a fixed set of top-level fields from
//! each article, flattens nested values into dotted-path keys, and hands the
//! flattened records to the consumer one page (batch) at a time.
//!
//! ## Modules
//!
//! - **flatten**: recursive dotted-path flattening of nested JSON
//! - **schema**: the ordered output schema and its membership filter
//! - **fetcher**: the page-fetching capability, HTTP client and retry decorator
//! - **source**: the lazy batch stream tying the three together
//! - **outputs**: console summaries and JSON Lines output
//!
//! ## Quick Start
//!
//! ```no_run
//! use futures::StreamExt;
//! use nyt_batch_source::{BatchSource, HttpPageFetcher, SchemaFilter, ARTICLE_SEARCH_URL};
//!
//! # async fn run() -> Result<(), nyt_batch_source::FetchError> {
//! let fetcher = HttpPageFetcher::new(ARTICLE_SEARCH_URL, "Silicon Valley", "API_KEY")?;
//! let source = BatchSource::new(fetcher, SchemaFilter::default());
//!
//! let batches = source.produce_batches(3);
//! futures::pin_mut!(batches);
//! while let Some(batch) = batches.next().await {
//!     for record in batch? {
//!         println!("{:?} - {:?}", record.get("_id"), record.get("headline.main"));
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod cli;
pub mod error;
pub mod fetcher;
pub mod flatten;
pub mod models;
pub mod outputs;
pub mod schema;
pub mod source;
pub mod utils;

// Re-export commonly used types for convenience
pub use error::FetchError;
pub use fetcher::{ARTICLE_SEARCH_URL, HttpPageFetcher, PageFetcher, RetryFetch};
pub use flatten::flatten;
pub use models::{Batch, FlatRecord, NestedValue, PageIndex, RawRecord};
pub use schema::{Schema, SchemaFilter};
pub use source::{BatchSource, CursorState, PageCursor};
