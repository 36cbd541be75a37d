//! Enrichment pipeline error types

use peptrack_common::errors::AppError;
use std::time::Duration;
use thiserror::Error;

/// Outcome of a failed outbound fetch.
///
/// Never crosses an adapter boundary: adapters turn it into an empty record.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FetchFailure {
    #[error("request to {url} timed out")]
    Timeout { url: String },

    #[error("rate limited by {url}")]
    RateLimited {
        url: String,
        retry_after: Option<Duration>,
    },

    #[error("{url} returned server error {status}")]
    Server { url: String, status: u16 },

    #[error("transport error for {url}: {message}")]
    Transport { url: String, message: String },

    #[error("{url} returned {status}")]
    Client { url: String, status: u16 },

    #[error("malformed payload from {url}: {message}")]
    Malformed { url: String, message: String },

    #[error("gave up on {url} after {attempts} attempts: {last}")]
    RetriesExhausted {
        url: String,
        attempts: u32,
        last: Box<FetchFailure>,
    },
}

impl FetchFailure {
    /// Timeouts, 429, 5xx and transport errors are worth retrying
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            FetchFailure::Timeout { .. }
                | FetchFailure::RateLimited { .. }
                | FetchFailure::Server { .. }
                | FetchFailure::Transport { .. }
        )
    }

    /// A 404 from a search endpoint means "no match", not breakage
    pub fn is_not_found(&self) -> bool {
        matches!(self, FetchFailure::Client { status: 404, .. })
    }

    /// Metrics label for the attempt that produced this failure
    pub fn status_class(&self) -> &'static str {
        match self {
            FetchFailure::Timeout { .. } => "timeout",
            FetchFailure::RateLimited { .. } => "429",
            FetchFailure::Server { .. } => "5xx",
            FetchFailure::Transport { .. } => "transport",
            FetchFailure::Client { .. } => "4xx",
            FetchFailure::Malformed { .. } => "malformed",
            FetchFailure::RetriesExhausted { .. } => "exhausted",
        }
    }
}

/// Failure that aborts one entity but not the run
#[derive(Error, Debug)]
pub enum EntityError {
    #[error(transparent)]
    Store(#[from] AppError),

    #[error("entity {slug} exceeded its {timeout_secs}s budget")]
    Timeout { slug: String, timeout_secs: u64 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        let url = "https://example.test".to_string();
        assert!(FetchFailure::Timeout { url: url.clone() }.is_transient());
        assert!(FetchFailure::Server { url: url.clone(), status: 503 }.is_transient());
        assert!(FetchFailure::RateLimited { url: url.clone(), retry_after: None }.is_transient());
        assert!(!FetchFailure::Client { url: url.clone(), status: 404 }.is_transient());
        assert!(!FetchFailure::Malformed { url, message: "eof".into() }.is_transient());
    }
}
