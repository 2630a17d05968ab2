//! Shared error types for the services crate.

use thiserror::Error;

use casework_core::model::{CaseId, CaseStatus};
use storage::repository::StorageError;

use crate::catalog::CatalogError;

/// Errors emitted by `QueueSessionManager`.
///
/// The taxonomy is deliberately small: callers see "not found" or "invalid
/// argument" plus propagated infrastructure failures. An empty match set is
/// not an error; it is a valid "nothing to do" outcome.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum QueueError {
    /// The session token is unknown for this user. Also returned when the
    /// token exists but belongs to another user, so that a non-owner cannot
    /// distinguish a foreign session from a missing one.
    #[error("queue session not found")]
    SessionNotFound,

    /// The case id does not resolve through the catalog.
    #[error("case not found: {0}")]
    CaseNotFound(CaseId),

    /// The reported previous-case outcome is not one of
    /// completed / skipped / viewed_in_queue.
    #[error("invalid previous case status: {0}")]
    InvalidPreviousStatus(CaseStatus),

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}
