use chrono::{DateTime, Utc};

use super::hash::FilterContextHash;
use super::ids::{CaseId, SessionId, UserId};
use super::status::CaseStatus;

/// Latest known status of one case for one user under one filter context
/// hash.
///
/// There is at most one record per `(user_id, case_id, filter_hash)` triple:
/// writes are upserts on the triple, so a status change overwrites the prior
/// one and no history is retained. The optional `session_id` is bookkeeping
/// only, a soft back-reference to the queue session that last touched the
/// case; it carries no ownership semantics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaseProgress {
    pub user_id: UserId,
    pub case_id: CaseId,
    pub filter_hash: FilterContextHash,
    pub status: CaseStatus,
    pub session_id: Option<SessionId>,
    pub last_updated_at: DateTime<Utc>,
}

impl CaseProgress {
    #[must_use]
    pub fn new(
        user_id: UserId,
        case_id: CaseId,
        filter_hash: FilterContextHash,
        status: CaseStatus,
        session_id: Option<SessionId>,
        last_updated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            user_id,
            case_id,
            filter_hash,
            status,
            session_id,
            last_updated_at,
        }
    }

    /// The upsert key: one record may exist per triple.
    #[must_use]
    pub fn key(&self) -> (UserId, CaseId, FilterContextHash) {
        (
            self.user_id.clone(),
            self.case_id.clone(),
            self.filter_hash.clone(),
        )
    }
}
