use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::Serialize;

use casework_core::model::{CaseId, CaseRecord, SessionId};

/// Caller-facing result of starting or advancing a queue session.
///
/// This is intentionally **not** a UI view-model: no pre-formatted strings,
/// no localization assumptions. `queue_position` is -1 when there is no
/// current case (empty or exhausted queue).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueueSnapshot {
    pub session_id: SessionId,
    pub current_case: Option<CaseRecord>,
    pub queue_position: i64,
    pub total_in_queue: usize,
}

/// Read-only projection of an active session, including the set of cases
/// already finished under the same filter context for progress reporting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueueSessionView {
    pub session_id: SessionId,
    pub current_case: Option<CaseRecord>,
    pub queue_position: i64,
    pub total_in_queue: usize,
    pub finished_case_ids: HashSet<CaseId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl QueueSessionView {
    /// Aggregated counts for progress-bar style reporting.
    #[must_use]
    pub fn progress(&self) -> QueueProgress {
        let finished = self.finished_case_ids.len();
        QueueProgress {
            total: self.total_in_queue,
            finished,
            remaining: self.total_in_queue.saturating_sub(if self.current_case.is_some() {
                usize::try_from(self.queue_position).unwrap_or(0)
            } else {
                self.total_in_queue
            }),
            is_exhausted: self.current_case.is_none() && self.total_in_queue > 0,
        }
    }
}

/// Aggregated view of queue progress, useful for reporting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueueProgress {
    pub total: usize,
    pub finished: usize,
    pub remaining: usize,
    pub is_exhausted: bool,
}
