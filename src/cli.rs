//! Command-line interface definitions.
//!
//! Every option can also be set through the environment variable named in
//! its `env` attribute.

use crate::fetcher::ARTICLE_SEARCH_URL;
use crate::models::PageIndex;
use crate::schema::Schema;
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

/// Page through the Article Search API and print flattened record batches.
///
/// # Examples
///
/// ```sh
/// # Ten pages of the default query
/// nyt_batch_source --api-key YOUR_KEY
///
/// # Three pages, only ids and headlines, saved as JSON Lines
/// nyt_batch_source -q "Silicon Valley" -p 3 -f _id,headline -o out/articles.jsonl
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Search query
    #[arg(short, long, env = "NYT_QUERY", default_value = "Silicon Valley")]
    pub query: String,

    /// New York Times API key
    #[arg(long, env = "NYT_API_KEY", hide_env_values = true)]
    pub api_key: String,

    /// Number of pages (batches) to fetch
    #[arg(short, long, env = "NYT_PAGES", default_value_t = 10)]
    pub pages: PageIndex,

    /// Article Search endpoint
    #[arg(long, env = "NYT_BASE_URL", default_value = ARTICLE_SEARCH_URL)]
    pub base_url: String,

    /// Top-level fields to keep (repeat or comma separate); defaults to the
    /// standard article schema
    #[arg(short, long = "field", env = "NYT_FIELDS", value_delimiter = ',')]
    pub fields: Vec<String>,

    /// Extra attempts per page on rate limiting, server or network errors
    #[arg(long, default_value_t = 3)]
    pub max_retries: usize,

    /// Initial backoff delay in milliseconds (doubles per attempt)
    #[arg(long, default_value_t = 1000)]
    pub retry_base_delay_ms: u64,

    /// Append flattened records to this JSON Lines file
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Incremental column hint passed to the source on connect
    #[arg(long)]
    pub inc_column: Option<String>,

    /// Last seen value of the incremental column
    #[arg(long)]
    pub max_inc_value: Option<String>,
}

impl Cli {
    /// The output schema: `--field` values if any were given, the default
    /// article schema otherwise.
    pub fn schema(&self) -> Schema {
        if self.fields.is_empty() {
            Schema::article_search()
        } else {
            Schema::new(self.fields.iter().map(|f| f.trim()).filter(|f| !f.is_empty()))
        }
    }

    pub fn retry_base_delay(&self) -> Duration {
        Duration::from_millis(self.retry_base_delay_ms)
    }
}
