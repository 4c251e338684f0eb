// Error taxonomy for the retrieval core

use thiserror::Error;

/// Errors surfaced by connectors, service clients and the retrieval
/// orchestrator.
///
/// Read paths report missing resources as `None`/`false` return values, not
/// as `NotFound` errors; `NotFound` is reserved for operations that cannot
/// produce a partial answer (e.g. a dense search against a missing index).
#[derive(Debug, Error)]
pub enum RetrievalError {
    /// A datastore, index or document required by the operation does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The backing document store failed or returned an unexpected response.
    #[error("backend error: {0}")]
    Backend(String),

    /// An external service on the critical query path returned a non-success
    /// response or could not be reached.
    #[error("{service} unavailable: {reason}")]
    ServiceUnavailable {
        service: &'static str,
        reason: String,
    },

    /// A document or index configuration failed validation.
    #[error("invalid: {0}")]
    Invalid(String),
}

impl RetrievalError {
    pub fn unavailable(service: &'static str, reason: impl ToString) -> Self {
        Self::ServiceUnavailable {
            service,
            reason: reason.to_string(),
        }
    }
}

impl From<reqwest::Error> for RetrievalError {
    fn from(err: reqwest::Error) -> Self {
        Self::Backend(err.to_string())
    }
}

/// Result type for all retrieval core operations
pub type Result<T> = std::result::Result<T, RetrievalError>;
