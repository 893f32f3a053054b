//! Errors raised while fetching a page of search results.

use crate::models::PageIndex;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("page {page} returned HTTP {status}")]
    Status { page: PageIndex, status: u16 },

    #[error("page {page} body is not valid JSON: {source}")]
    Decode {
        page: PageIndex,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid request URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

impl FetchError {
    /// Whether another attempt at the same page might succeed.
    ///
    /// Transport failures, rate limiting (429) and server errors (5xx) are
    /// transient. Client errors, bad bodies and bad URLs are not.
    pub fn is_transient(&self) -> bool {
        match self {
            FetchError::Transport(_) => true,
            FetchError::Status { status, .. } => *status == 429 || (500..600).contains(status),
            FetchError::Decode { .. } | FetchError::InvalidUrl(_) => false,
        }
    }
}
