//! Search Module
//!
//! Full-text projection of persisted messages in an Elasticsearch-compatible
//! store, spoken to over its REST API.

mod elasticsearch;

pub use elasticsearch::ElasticsearchIndex;

/// Search store failure
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    #[error("search store request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("search store returned {status}: {body}")]
    Status { status: u16, body: String },
}

impl SearchError {
    /// Connection failures, timeouts, 5xx and 429 are worth retrying.
    pub fn is_transient(&self) -> bool {
        match self {
            SearchError::Transport(e) => !(e.is_decode() || e.is_builder()),
            SearchError::Status { status, .. } => *status >= 500 || *status == 429,
        }
    }
}
