//! # NYT Batch Source
//!
//! Command-line driver for the Article Search batch source: fetch
//! `--pages` pages for `--query`, print a summary of each flattened batch,
//! and optionally append the records to a JSON Lines file.
//!
//! ## Usage
//!
//! ```sh
//! NYT_API_KEY=... nyt_batch_source -q "Silicon Valley" -p 10 -o out/articles.jsonl
//! ```
//!
//! ## Pipeline
//!
//! 1. **Fetching**: one Article Search page at a time, retried on transient errors
//! 2. **Filtering**: only schema fields of each article are kept
//! 3. **Flattening**: nested values become dotted-path keys
//! 4. **Output**: per-batch summary on stdout, records to JSON Lines

use clap::Parser;
use futures::StreamExt;
use nyt_batch_source::cli::Cli;
use nyt_batch_source::outputs::{console, jsonl};
use nyt_batch_source::{BatchSource, HttpPageFetcher, RetryFetch, SchemaFilter};
use std::error::Error;
use tracing::{debug, error, info};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .with_writer(std::io::stderr)
        .init();

    let start_time = std::time::Instant::now();
    info!("nyt_batch_source starting up");

    let args = Cli::parse();
    debug!(?args.query, args.pages, ?args.output, "Parsed CLI arguments");

    if let Some(ref path) = args.output
        && let Err(e) = jsonl::ensure_parent_dir(path).await
    {
        error!(path = %path.display(), error = %e, "Output directory is not usable");
        return Err(e);
    }

    // ---- Build the source ----
    let http = HttpPageFetcher::new(&args.base_url, args.query.clone(), args.api_key.clone())?;
    let fetcher = RetryFetch::new(http, args.max_retries, args.retry_base_delay());
    let filter = SchemaFilter::new(args.schema());
    info!(fields = ?filter.fields(), "Output schema");

    let mut source = BatchSource::new(fetcher, filter);
    source.connect(args.inc_column.as_deref(), args.max_inc_value.as_deref());

    // ---- Drive the batch stream ----
    let batches = source.produce_batches(args.pages);
    futures::pin_mut!(batches);

    let mut batch_count = 0usize;
    let mut record_count = 0usize;
    while let Some(result) = batches.next().await {
        let batch = match result {
            Ok(batch) => batch,
            Err(e) => {
                error!(
                    page = batch_count,
                    records = record_count,
                    error = %e,
                    "Fetching failed; stopping"
                );
                return Err(e.into());
            }
        };

        print!("{}", console::batch_summary(batch_count, &batch));

        if let Some(ref path) = args.output
            && let Err(e) = jsonl::append_batch(path, &batch).await
        {
            error!(path = %path.display(), error = %e, "Failed to write JSON Lines output");
            return Err(e);
        }

        batch_count += 1;
        record_count += batch.len();
    }

    let elapsed = start_time.elapsed();
    info!(
        ?elapsed,
        batches = batch_count,
        records = record_count,
        "Execution complete"
    );

    Ok(())
}
