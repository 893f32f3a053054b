//! JSON Lines output for flattened records.
//!
//! Every record of every batch becomes one line, so the file can be
//! streamed into `jq` or loaded as a table:
//! ```text
//! {"_id":"nyt://article/1","headline.kicker":null,"headline.main":"First",...}
//! {"_id":"nyt://article/2","headline.kicker":null,"headline.main":"Second",...}
//! ```

use crate::models::Batch;
use std::error::Error;
use std::path::Path;
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::{error, info, instrument};

/// Create the parent directory of `path` if it does not exist yet.
#[instrument(level = "info", skip_all, fields(path = %path.display()))]
pub async fn ensure_parent_dir(path: &Path) -> Result<(), Box<dyn Error>> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => {
            if let Err(e) = fs::create_dir_all(parent).await {
                error!(parent = %parent.display(), error = %e, "Failed to create output dir");
                return Err(e.into());
            }
            Ok(())
        }
        _ => Ok(()),
    }
}

/// Append every record in `batch` to `path` as one JSON object per line.
///
/// # Returns
///
/// The number of lines written.
#[instrument(level = "info", skip_all, fields(path = %path.display()))]
pub async fn append_batch(path: &Path, batch: &Batch) -> Result<usize, Box<dyn Error>> {
    let mut buf = Vec::new();
    for record in batch {
        serde_json::to_writer(&mut buf, record)?;
        buf.push(b'\n');
    }

    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await?;
    file.write_all(&buf).await?;
    file.flush().await?;

    info!(lines = batch.len(), bytes = buf.len(), "Appended batch");
    Ok(batch.len())
}
