//! Structured error taxonomy.
//!
//! Fetch and provider failures carry machine-readable variants so the
//! HTTP layer can map them to status codes and the chat loop can drive
//! its retry math without string matching.

use thiserror::Error;

/// Failures while fetching content into the staging area.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The remote file or document does not exist.
    #[error("file not found")]
    NotFound,

    /// The identity is not allowed to read the remote item.
    #[error("permission denied")]
    PermissionDenied,

    /// The URL matched neither accepted Drive folder pattern.
    #[error("folder url not recognized")]
    FolderUrlNotRecognized,

    /// The URL matched a Google prefix but carried no usable id.
    #[error("url not recognized")]
    UrlNotRecognized,

    /// Anything else that prevented reading the remote item.
    #[error("could not access file: {0}")]
    Access(String),
}

impl FetchError {
    pub fn from_status(status: reqwest::StatusCode) -> Self {
        match status.as_u16() {
            404 => FetchError::NotFound,
            401 | 403 => FetchError::PermissionDenied,
            _ => FetchError::Access(format!("unexpected status {}", status)),
        }
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        FetchError::Access(err.to_string())
    }
}

/// Failures reported by the language-model / embedding provider.
///
/// `ContextLengthExceeded` is produced by the adapter boundary parsing
/// the provider's error body, so the retry algorithm only ever sees the
/// two integers it needs.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The combined prompt exceeded the model's input budget.
    /// `limit` is the model maximum, `used` the actual token count.
    #[error("context length exceeded: limit {limit}, used {used}")]
    ContextLengthExceeded { limit: i64, used: i64 },

    /// A supplied personal API key was rejected by the provider.
    #[error("{0}")]
    InvalidKey(String),

    /// Any other provider-side failure; terminal, never retried.
    #[error("provider error: {0}")]
    Api(String),

    #[error("provider request failed: {0}")]
    Http(#[from] reqwest::Error),
}

/// Failures during the ingestion batch (loader / splitter / index).
///
/// Ingestion is all-or-nothing at the batch level: any of these aborts
/// the request and triggers staging cleanup.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("failed to parse {file}: {reason}")]
    Parse { file: String, reason: String },

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("failed to ingest your data: {0}")]
    Other(#[from] anyhow::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping_distinguishes_not_found_from_denied() {
        assert!(matches!(
            FetchError::from_status(reqwest::StatusCode::NOT_FOUND),
            FetchError::NotFound
        ));
        assert!(matches!(
            FetchError::from_status(reqwest::StatusCode::UNAUTHORIZED),
            FetchError::PermissionDenied
        ));
        assert!(matches!(
            FetchError::from_status(reqwest::StatusCode::FORBIDDEN),
            FetchError::PermissionDenied
        ));
        assert!(matches!(
            FetchError::from_status(reqwest::StatusCode::BAD_GATEWAY),
            FetchError::Access(_)
        ));
    }
}
