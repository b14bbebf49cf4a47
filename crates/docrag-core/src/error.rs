//! Error types for docrag

use thiserror::Error;

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Error taxonomy shared by every docrag component.
///
/// The type is `Clone` so one initialization failure can be handed to every
/// caller that was waiting on it.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("provider unavailable: {0}")]
    ProviderUnavailable(String),

    #[error("timeout: {0}")]
    Timeout(String),

    #[error("embedding dimension mismatch: index expects {expected}, provider returned {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("extraction failed for '{filename}': {reason}")]
    ExtractionFailed { filename: String, reason: String },

    #[error("index operation failed: {0}")]
    IndexOperationFailed(String),

    #[error("inconsistent state: {} blob(s) without a document, {} document(s) without a blob", orphan_blobs.len(), missing_blobs.len())]
    InconsistentState {
        /// Filenames present in the Blob Store but not referenced by any document.
        orphan_blobs: Vec<String>,
        /// Filenames referenced by a document whose blob is gone.
        missing_blobs: Vec<String>,
    },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("'{filename}' has the same content as already indexed '{existing}'")]
    DuplicateContent { filename: String, existing: String },

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

impl Error {
    /// True for failures that originate in (or are caused by) an external provider.
    pub fn is_provider_error(&self) -> bool {
        matches!(
            self,
            Error::ProviderUnavailable(_) | Error::Timeout(_) | Error::DimensionMismatch { .. }
        )
    }

    /// Stable snake_case label, used in reports and JSON output.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::ProviderUnavailable(_) => "provider_unavailable",
            Error::Timeout(_) => "timeout",
            Error::DimensionMismatch { .. } => "dimension_mismatch",
            Error::ExtractionFailed { .. } => "extraction_failed",
            Error::IndexOperationFailed(_) => "index_operation_failed",
            Error::InconsistentState { .. } => "inconsistent_state",
            Error::NotFound(_) => "not_found",
            Error::DuplicateContent { .. } => "duplicate_content",
            Error::InvalidInput(_) => "invalid_input",
            Error::Configuration(_) => "configuration",
            Error::Storage(_) => "storage",
            Error::Serialization(_) => "serialization",
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}
