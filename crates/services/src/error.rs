//! Shared error types for the services crate.

use thiserror::Error;

use quiz_core::model::ResultError;
use storage::repository::StorageError;

/// Errors emitted by quiz sessions and their workflow.
///
/// Wrong-state calls and out-of-range navigation are not errors; the engine
/// absorbs them. Only failures that need user-visible handling surface here.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum QuizError {
    #[error("no questions available for session")]
    EmptyPool,
    #[error("failed to persist quiz result; submit again to retry")]
    PersistFailed(#[source] StorageError),
    #[error("quiz session is no longer running")]
    SessionClosed,
    #[error(transparent)]
    Result(#[from] ResultError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl QuizError {
    /// Returns true when the same call may succeed if repeated.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, QuizError::PersistFailed(_))
    }
}
