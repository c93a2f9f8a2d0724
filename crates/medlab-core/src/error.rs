//! Error taxonomy shared by the store, the search engine, and the job manager.

use thiserror::Error;

/// Result alias for catalog operations.
pub type CatalogResult<T> = std::result::Result<T, CatalogError>;

/// Errors reported by catalog, search, and analysis operations.
///
/// Every variant is scoped to the single item or job it concerns; none is
/// fatal to the process.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CatalogError {
    /// Malformed or missing required input. Not retried.
    #[error("validation error: {0}")]
    Validation(String),

    /// Unknown item, or no active job for the item.
    #[error("not found: {0}")]
    NotFound(String),

    /// Operation not legal for the current item or job state.
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// An active analysis job already targets this item.
    #[error("analysis already running for item {0}")]
    AlreadyRunning(String),

    /// The analysis job already claimed completion; its result stands.
    #[error("analysis already completed for item {0}")]
    AlreadyCompleted(String),

    /// The analysis workload failed; the item was returned to Pending.
    #[error("analysis failed for item {item_id}: {reason}")]
    AnalysisFailed { item_id: String, reason: String },

    /// The image recognizer could not derive a predicate.
    #[error("recognition failed: {0}")]
    Recognition(String),
}

impl CatalogError {
    /// Machine-readable code used in API error bodies.
    pub fn code(&self) -> &'static str {
        match self {
            CatalogError::Validation(_) => "bad_request",
            CatalogError::NotFound(_) => "not_found",
            CatalogError::InvalidState(_) => "invalid_state",
            CatalogError::AlreadyRunning(_) => "already_running",
            CatalogError::AlreadyCompleted(_) => "already_completed",
            CatalogError::AnalysisFailed { .. } => "analysis_failed",
            CatalogError::Recognition(_) => "recognition_failed",
        }
    }

    /// True for race signals where re-reading state and retrying is reasonable.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            CatalogError::AlreadyRunning(_) | CatalogError::AlreadyCompleted(_)
        )
    }
}
