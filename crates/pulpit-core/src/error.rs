use thiserror::Error;
use tracing::{error, warn};

/// Failure talking to the catalog API.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Catalog API returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Catalog API rejected request: {0}")]
    Rejected(String),

    #[error("Failed to decode catalog API response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Authentication required")]
    AuthenticationRequired,

    #[error("Invalid catalog API URL: {0}")]
    InvalidUrl(String),
}

impl SourceError {
    /// True for failures that the next scheduled cycle can reasonably
    /// expect to clear on its own.
    pub fn is_transient(&self) -> bool {
        match self {
            SourceError::Network(_) => true,
            SourceError::Status { status, .. } => *status >= 500 || *status == 429,
            SourceError::Rejected(_)
            | SourceError::Decode(_)
            | SourceError::AuthenticationRequired
            | SourceError::InvalidUrl(_) => false,
        }
    }

    /// Log a failed cycle under `context`: a warning when the next cycle may
    /// clear it, an error when it needs attention.
    pub fn log(&self, context: &str) {
        if self.is_transient() {
            warn!("{}: {}", context, self);
        } else {
            error!("{}: {}", context, self);
        }
    }
}

pub type SourceResult<T> = Result<T, SourceError>;
