use chrono::{DateTime, Utc};
use thiserror::Error;

use super::filter::FilterSelection;
use super::hash::FilterContextHash;
use super::ids::{CaseId, SessionId, UserId};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum QueueSessionError {
    #[error("current_case_index {index} is out of range for queue of {len}")]
    IndexOutOfRange { index: i64, len: usize },
}

/// Materialized, resumable traversal state for one user under one filter
/// context hash.
///
/// At most one session exists per `(user_id, filter_hash)` pair; starting a
/// new session replaces the prior one. The queued order is a derived view
/// over the catalog and the progress ledger: it is rebuilt wholesale on
/// every start, and only the cursor mutates afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueSession {
    session_id: SessionId,
    user_id: UserId,
    filter_hash: FilterContextHash,
    filters_applied: FilterSelection,
    queued_case_ids: Vec<CaseId>,
    current_case_index: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl QueueSession {
    /// Creates a fresh session over a materialized queue.
    ///
    /// The cursor starts at 0 when the queue is non-empty, otherwise at the
    /// "no current item" sentinel (-1).
    #[must_use]
    pub fn new(
        session_id: SessionId,
        user_id: UserId,
        filter_hash: FilterContextHash,
        filters_applied: FilterSelection,
        queued_case_ids: Vec<CaseId>,
        created_at: DateTime<Utc>,
    ) -> Self {
        let current_case_index = if queued_case_ids.is_empty() { -1 } else { 0 };
        Self {
            session_id,
            user_id,
            filter_hash,
            filters_applied,
            queued_case_ids,
            current_case_index,
            created_at,
            updated_at: created_at,
        }
    }

    /// Rehydrates a session from persisted storage.
    ///
    /// # Errors
    ///
    /// Returns `QueueSessionError::IndexOutOfRange` if the cursor is below
    /// -1 or beyond the exhaustion sentinel (`len`).
    #[allow(clippy::too_many_arguments)]
    pub fn from_persisted(
        session_id: SessionId,
        user_id: UserId,
        filter_hash: FilterContextHash,
        filters_applied: FilterSelection,
        queued_case_ids: Vec<CaseId>,
        current_case_index: i64,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Result<Self, QueueSessionError> {
        let len = queued_case_ids.len();
        let max = i64::try_from(len).unwrap_or(i64::MAX);
        if current_case_index < -1 || current_case_index > max {
            return Err(QueueSessionError::IndexOutOfRange {
                index: current_case_index,
                len,
            });
        }
        Ok(Self {
            session_id,
            user_id,
            filter_hash,
            filters_applied,
            queued_case_ids,
            current_case_index,
            created_at,
            updated_at,
        })
    }

    #[must_use]
    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    #[must_use]
    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }

    #[must_use]
    pub fn filter_hash(&self) -> &FilterContextHash {
        &self.filter_hash
    }

    #[must_use]
    pub fn filters_applied(&self) -> &FilterSelection {
        &self.filters_applied
    }

    #[must_use]
    pub fn queued_case_ids(&self) -> &[CaseId] {
        &self.queued_case_ids
    }

    #[must_use]
    pub fn current_case_index(&self) -> i64 {
        self.current_case_index
    }

    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    #[must_use]
    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Total number of cases materialized into this session.
    #[must_use]
    pub fn total_in_queue(&self) -> usize {
        self.queued_case_ids.len()
    }

    /// The case the cursor points at, when in range.
    #[must_use]
    pub fn current_case_id(&self) -> Option<&CaseId> {
        usize::try_from(self.current_case_index)
            .ok()
            .and_then(|i| self.queued_case_ids.get(i))
    }

    /// Caller-facing queue position: the cursor when a current case exists,
    /// -1 otherwise.
    #[must_use]
    pub fn queue_position(&self) -> i64 {
        if self.current_case_id().is_some() {
            self.current_case_index
        } else {
            -1
        }
    }

    /// True once the cursor has walked past the end of the queue.
    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        !self.queued_case_ids.is_empty()
            && self.current_case_index >= i64::try_from(self.queued_case_ids.len()).unwrap_or(i64::MAX)
    }

    /// Moves the cursor to an eligible index found by the traversal scan.
    pub fn advance_to(&mut self, index: usize, now: DateTime<Utc>) {
        self.current_case_index = i64::try_from(index).unwrap_or(i64::MAX);
        self.updated_at = now;
    }

    /// Parks the cursor on the exhaustion sentinel (`len`).
    pub fn mark_exhausted(&mut self, now: DateTime<Utc>) {
        self.current_case_index = i64::try_from(self.queued_case_ids.len()).unwrap_or(i64::MAX);
        self.updated_at = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;

    fn ids(raw: &[&str]) -> Vec<CaseId> {
        raw.iter().map(|s| CaseId::new(*s)).collect()
    }

    fn build_session(queued: &[&str]) -> QueueSession {
        let selection = FilterSelection::new().with_specialty("Cardiology");
        QueueSession::new(
            SessionId::generate(),
            UserId::new("u1"),
            FilterContextHash::of(&selection),
            selection,
            ids(queued),
            fixed_now(),
        )
    }

    #[test]
    fn new_session_starts_at_front_of_queue() {
        let session = build_session(&["C1", "C2"]);
        assert_eq!(session.current_case_index(), 0);
        assert_eq!(session.current_case_id(), Some(&CaseId::new("C1")));
        assert_eq!(session.queue_position(), 0);
        assert_eq!(session.total_in_queue(), 2);
        assert!(!session.is_exhausted());
    }

    #[test]
    fn empty_queue_has_no_current_case() {
        let session = build_session(&[]);
        assert_eq!(session.current_case_index(), -1);
        assert_eq!(session.current_case_id(), None);
        assert_eq!(session.queue_position(), -1);
        assert!(!session.is_exhausted());
    }

    #[test]
    fn advance_moves_cursor_and_touches_updated_at() {
        let mut session = build_session(&["C1", "C2", "C3"]);
        let later = fixed_now() + chrono::Duration::minutes(5);
        session.advance_to(2, later);
        assert_eq!(session.current_case_id(), Some(&CaseId::new("C3")));
        assert_eq!(session.updated_at(), later);
    }

    #[test]
    fn exhaustion_parks_cursor_past_the_end() {
        let mut session = build_session(&["C1"]);
        session.mark_exhausted(fixed_now());
        assert_eq!(session.current_case_index(), 1);
        assert_eq!(session.current_case_id(), None);
        assert_eq!(session.queue_position(), -1);
        assert!(session.is_exhausted());
    }

    #[test]
    fn from_persisted_accepts_sentinels_and_rejects_garbage() {
        let session = build_session(&["C1", "C2"]);
        let rebuild = |index| {
            QueueSession::from_persisted(
                session.session_id(),
                session.user_id().clone(),
                session.filter_hash().clone(),
                session.filters_applied().clone(),
                session.queued_case_ids().to_vec(),
                index,
                session.created_at(),
                session.updated_at(),
            )
        };

        assert!(rebuild(-1).is_ok());
        assert!(rebuild(2).is_ok()); // exhaustion sentinel
        assert!(matches!(
            rebuild(-2),
            Err(QueueSessionError::IndexOutOfRange { .. })
        ));
        assert!(matches!(
            rebuild(3),
            Err(QueueSessionError::IndexOutOfRange { .. })
        ));
    }
}
