use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex, PoisonError, Weak};

use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::debug;

use casework_core::Clock;
use casework_core::model::{
    CaseId, CaseProgress, CaseStatus, FilterContextHash, FilterSelection, QueueSession, SessionId,
    UserId,
};
use storage::repository::{CaseProgressRepository, QueueSessionRepository, Storage};

use super::materialize::materialize_queue;
use super::view::{QueueSessionView, QueueSnapshot};
use crate::catalog::CaseCatalog;
use crate::error::QueueError;

//
// ─── PER-KEY SERIALIZATION ─────────────────────────────────────────────────────
//

type LockKey = (UserId, FilterContextHash);

/// Serializes queue operations per `(user, filter hash)` pair.
///
/// Session replacement is delete-then-insert and cursor advancement is a
/// read-modify-write, so concurrent calls for the same pair must not
/// interleave. Different pairs proceed independently.
///
/// The map holds weak references: the guard returned by `acquire` owns the
/// only strong one, and dead entries are pruned on the next acquisition, so
/// the map never outgrows the set of pairs with an operation in flight.
#[derive(Clone, Default)]
struct SessionLocks {
    inner: Arc<StdMutex<HashMap<LockKey, Weak<AsyncMutex<()>>>>>,
}

impl SessionLocks {
    async fn acquire(
        &self,
        user_id: &UserId,
        filter_hash: &FilterContextHash,
    ) -> OwnedMutexGuard<()> {
        let entry = {
            let mut map = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
            map.retain(|_, weak| weak.strong_count() > 0);
            let key = (user_id.clone(), filter_hash.clone());
            match map.get(&key).and_then(Weak::upgrade) {
                Some(lock) => lock,
                None => {
                    let lock = Arc::new(AsyncMutex::new(()));
                    map.insert(key, Arc::downgrade(&lock));
                    lock
                }
            }
        };
        entry.lock_owned().await
    }
}

//
// ─── PREVIOUS OUTCOME ──────────────────────────────────────────────────────────
//

/// Outcome of the previously served case, reported on queue advancement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreviousOutcome {
    pub case_id: CaseId,
    pub status: CaseStatus,
}

//
// ─── MANAGER ───────────────────────────────────────────────────────────────────
//

/// Orchestrates queue session start, advancement, outcome recording, and
/// read-only projections.
///
/// All progress and session state is partitioned by the filter context hash,
/// so the same case can be fresh under one selection while finished under
/// another.
#[derive(Clone)]
pub struct QueueSessionManager {
    clock: Clock,
    catalog: Arc<dyn CaseCatalog>,
    progress: Arc<dyn CaseProgressRepository>,
    sessions: Arc<dyn QueueSessionRepository>,
    locks: SessionLocks,
}

impl QueueSessionManager {
    #[must_use]
    pub fn new(
        clock: Clock,
        catalog: Arc<dyn CaseCatalog>,
        progress: Arc<dyn CaseProgressRepository>,
        sessions: Arc<dyn QueueSessionRepository>,
    ) -> Self {
        Self {
            clock,
            catalog,
            progress,
            sessions,
            locks: SessionLocks::default(),
        }
    }

    /// Convenience constructor over an aggregated `Storage`.
    #[must_use]
    pub fn with_storage(clock: Clock, catalog: Arc<dyn CaseCatalog>, storage: &Storage) -> Self {
        Self::new(
            clock,
            catalog,
            Arc::clone(&storage.progress),
            Arc::clone(&storage.sessions),
        )
    }

    /// Start (or restart) a queue session for the selection.
    ///
    /// Materializes the traversal order from the catalog's current matches
    /// minus already-finished cases, pins the prior session's in-flight case
    /// to the front when it is still eligible, and replaces any prior
    /// session for the same `(user, filter hash)` pair.
    ///
    /// Returns `Ok(None)` when no cases match the selection; no session is
    /// created in that case. When matches exist but all are finished, a
    /// session with an empty queue is created and the snapshot carries no
    /// current case.
    ///
    /// # Errors
    ///
    /// Returns `QueueError` for catalog or storage failures.
    pub async fn start_queue_session(
        &self,
        user_id: &UserId,
        selection: &FilterSelection,
    ) -> Result<Option<QueueSnapshot>, QueueError> {
        let filter_hash = FilterContextHash::of(selection);
        let _guard = self.locks.acquire(user_id, &filter_hash).await;

        let matches = self.catalog.find(selection).await?;
        if matches.is_empty() {
            debug!(user = %user_id, hash = %filter_hash, "no cases match the selection");
            return Ok(None);
        }

        let excluded = self
            .progress
            .find_excluded_ids(user_id, &filter_hash)
            .await?;
        let pinned = self.pinned_case(user_id, &filter_hash).await?;

        let match_ids: Vec<CaseId> = matches.iter().map(|c| c.id.clone()).collect();
        let queued = materialize_queue(&match_ids, &excluded, pinned.as_ref());

        let now = self.clock.now();
        let session = QueueSession::new(
            SessionId::generate(),
            user_id.clone(),
            filter_hash.clone(),
            selection.clone(),
            queued,
            now,
        );
        self.sessions.replace(&session).await?;

        let current_id = session.current_case_id().cloned();

        // A pinned case displaced from the front reverts to "viewed".
        if let Some(pin) = pinned {
            if current_id.as_ref() != Some(&pin) {
                self.progress
                    .upsert(&CaseProgress::new(
                        user_id.clone(),
                        pin,
                        filter_hash.clone(),
                        CaseStatus::ViewedInQueue,
                        None,
                        now,
                    ))
                    .await?;
            }
        }

        let current_case = match &current_id {
            Some(id) => {
                self.progress
                    .upsert(&CaseProgress::new(
                        user_id.clone(),
                        id.clone(),
                        filter_hash.clone(),
                        CaseStatus::InProgressQueue,
                        Some(session.session_id()),
                        now,
                    ))
                    .await?;
                matches.into_iter().find(|c| &c.id == id)
            }
            None => None,
        };

        debug!(
            user = %user_id,
            session = %session.session_id(),
            total = session.total_in_queue(),
            "queue session started"
        );

        Ok(Some(QueueSnapshot {
            session_id: session.session_id(),
            current_case,
            queue_position: session.queue_position(),
            total_in_queue: session.total_in_queue(),
        }))
    }

    /// Advance the queue: optionally record the previous case's outcome,
    /// then walk the materialized order from the cursor, skipping cases
    /// finished in the meantime, and promote the first eligible case.
    ///
    /// When the walk reaches the end, the cursor parks on the exhaustion
    /// sentinel and the snapshot carries no current case.
    ///
    /// # Errors
    ///
    /// Returns `QueueError::SessionNotFound` when the token is unknown for
    /// this user, `QueueError::InvalidPreviousStatus` when the reported
    /// outcome is not completed / skipped / viewed_in_queue (nothing is
    /// written in that case), and propagates catalog/storage failures.
    pub async fn next_case_in_queue(
        &self,
        user_id: &UserId,
        session_id: SessionId,
        previous: Option<PreviousOutcome>,
    ) -> Result<QueueSnapshot, QueueError> {
        let probe = self
            .sessions
            .get_by_token(session_id, user_id)
            .await?
            .ok_or(QueueError::SessionNotFound)?;
        let filter_hash = probe.filter_hash().clone();
        let _guard = self.locks.acquire(user_id, &filter_hash).await;

        // Re-read under the lock; a concurrent start may have replaced it.
        let mut session = self
            .sessions
            .get_by_token(session_id, user_id)
            .await?
            .ok_or(QueueError::SessionNotFound)?;

        if let Some(outcome) = previous {
            if !outcome.status.is_reportable_outcome() {
                return Err(QueueError::InvalidPreviousStatus(outcome.status));
            }
            self.progress
                .upsert(&CaseProgress::new(
                    user_id.clone(),
                    outcome.case_id,
                    filter_hash.clone(),
                    outcome.status,
                    Some(session.session_id()),
                    self.clock.now(),
                ))
                .await?;
        }

        let next = self.scan_for_next(user_id, &session, &filter_hash).await?;

        let now = self.clock.now();
        let Some((index, case_id)) = next else {
            session.mark_exhausted(now);
            self.sessions.save(&session).await?;
            debug!(user = %user_id, session = %session_id, "queue exhausted");
            return Ok(QueueSnapshot {
                session_id,
                current_case: None,
                queue_position: -1,
                total_in_queue: session.total_in_queue(),
            });
        };

        session.advance_to(index, now);
        self.sessions.save(&session).await?;

        // Exactly one case may hold the in-progress slot per filter context.
        for stale in self.progress.find_in_progress(user_id, &filter_hash).await? {
            if stale.case_id != case_id {
                self.progress
                    .upsert(&CaseProgress::new(
                        user_id.clone(),
                        stale.case_id,
                        filter_hash.clone(),
                        CaseStatus::ViewedInQueue,
                        None,
                        now,
                    ))
                    .await?;
            }
        }
        self.progress
            .upsert(&CaseProgress::new(
                user_id.clone(),
                case_id.clone(),
                filter_hash.clone(),
                CaseStatus::InProgressQueue,
                Some(session_id),
                now,
            ))
            .await?;

        let current_case = self
            .catalog
            .resolve(&case_id)
            .await?
            .ok_or_else(|| QueueError::CaseNotFound(case_id.clone()))?;

        Ok(QueueSnapshot {
            session_id,
            current_case: Some(current_case),
            queue_position: session.queue_position(),
            total_in_queue: session.total_in_queue(),
        })
    }

    /// Record an outcome for a case without going through queue advancement.
    ///
    /// Produces the same end state as the queue path: a single upserted
    /// progress record under the selection's filter context, with the
    /// session binding cleared when no session id is supplied.
    ///
    /// # Errors
    ///
    /// Returns `QueueError::CaseNotFound` when the id does not resolve in
    /// the catalog, and propagates catalog/storage failures.
    pub async fn mark_case_status(
        &self,
        user_id: &UserId,
        case_id: &CaseId,
        status: CaseStatus,
        selection: &FilterSelection,
        session_id: Option<SessionId>,
    ) -> Result<CaseProgress, QueueError> {
        if self.catalog.resolve(case_id).await?.is_none() {
            return Err(QueueError::CaseNotFound(case_id.clone()));
        }

        let filter_hash = FilterContextHash::of(selection);
        let _guard = self.locks.acquire(user_id, &filter_hash).await;

        let progress = CaseProgress::new(
            user_id.clone(),
            case_id.clone(),
            filter_hash,
            status,
            session_id,
            self.clock.now(),
        );
        self.progress.upsert(&progress).await?;
        debug!(user = %user_id, case = %case_id, status = %status, "case status recorded");
        Ok(progress)
    }

    /// Read-only projection of an active session.
    ///
    /// # Errors
    ///
    /// Returns `QueueError::SessionNotFound` when the token is unknown for
    /// this user, and propagates catalog/storage failures.
    pub async fn queue_session(
        &self,
        user_id: &UserId,
        session_id: SessionId,
    ) -> Result<QueueSessionView, QueueError> {
        let session = self
            .sessions
            .get_by_token(session_id, user_id)
            .await?
            .ok_or(QueueError::SessionNotFound)?;

        let current_case = match session.current_case_id() {
            Some(id) => self.catalog.resolve(id).await?,
            None => None,
        };
        let finished_case_ids = self
            .progress
            .find_excluded_ids(user_id, session.filter_hash())
            .await?;

        let queue_position = if current_case.is_some() {
            session.queue_position()
        } else {
            -1
        };

        Ok(QueueSessionView {
            session_id,
            current_case,
            queue_position,
            total_in_queue: session.total_in_queue(),
            finished_case_ids,
            created_at: session.created_at(),
            updated_at: session.updated_at(),
        })
    }

    /// The prior session's in-flight case, eligible for resumption pinning.
    async fn pinned_case(
        &self,
        user_id: &UserId,
        filter_hash: &FilterContextHash,
    ) -> Result<Option<CaseId>, QueueError> {
        let Some(prior) = self.sessions.get(user_id, filter_hash).await? else {
            return Ok(None);
        };
        let Some(current) = prior.current_case_id() else {
            return Ok(None);
        };
        let status = self.progress.find_status(user_id, current, filter_hash).await?;
        Ok((status == Some(CaseStatus::InProgressQueue)).then(|| current.clone()))
    }

    /// Walks the materialized order from the cursor, skipping cases whose
    /// progress became terminal since materialization.
    async fn scan_for_next(
        &self,
        user_id: &UserId,
        session: &QueueSession,
        filter_hash: &FilterContextHash,
    ) -> Result<Option<(usize, CaseId)>, QueueError> {
        let start = usize::try_from(session.current_case_index() + 1).unwrap_or(0);
        for (index, case_id) in session.queued_case_ids().iter().enumerate().skip(start) {
            let status = self.progress.find_status(user_id, case_id, filter_hash).await?;
            if !status.is_some_and(|s| s.is_terminal()) {
                return Ok(Some((index, case_id.clone())));
            }
        }
        Ok(None)
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::InMemoryCaseCatalog;
    use casework_core::model::CaseRecord;
    use casework_core::time::fixed_clock;

    fn build_case(id: &str) -> CaseRecord {
        CaseRecord::new(
            CaseId::new(id),
            format!("Case {id}"),
            "Basic Program",
            "Cardiology",
            None,
        )
    }

    fn build_manager(case_ids: &[&str]) -> QueueSessionManager {
        let catalog = InMemoryCaseCatalog::new(case_ids.iter().map(|id| build_case(id)).collect());
        QueueSessionManager::with_storage(fixed_clock(), Arc::new(catalog), &Storage::in_memory())
    }

    fn selection() -> FilterSelection {
        FilterSelection::new().with_specialty("Cardiology")
    }

    #[tokio::test]
    async fn advance_with_unknown_token_is_not_found() {
        let manager = build_manager(&["C1"]);
        let err = manager
            .next_case_in_queue(&UserId::new("u1"), SessionId::generate(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, QueueError::SessionNotFound));
    }

    #[tokio::test]
    async fn invalid_previous_status_writes_nothing() {
        let manager = build_manager(&["C1", "C2"]);
        let user = UserId::new("u1");
        let started = manager
            .start_queue_session(&user, &selection())
            .await
            .unwrap()
            .unwrap();

        let err = manager
            .next_case_in_queue(
                &user,
                started.session_id,
                Some(PreviousOutcome {
                    case_id: CaseId::new("C1"),
                    status: CaseStatus::InProgressQueue,
                }),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, QueueError::InvalidPreviousStatus(_)));

        // The rejected outcome must not have moved the cursor.
        let view = manager.queue_session(&user, started.session_id).await.unwrap();
        assert_eq!(view.queue_position, 0);
        assert!(view.finished_case_ids.is_empty());
    }

    #[tokio::test]
    async fn mark_unknown_case_is_not_found() {
        let manager = build_manager(&["C1"]);
        let err = manager
            .mark_case_status(
                &UserId::new("u1"),
                &CaseId::new("ghost"),
                CaseStatus::Completed,
                &selection(),
                None,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, QueueError::CaseNotFound(_)));
    }

    #[tokio::test]
    async fn start_with_no_matches_creates_no_session() {
        let manager = build_manager(&[]);
        let user = UserId::new("u1");
        let outcome = manager.start_queue_session(&user, &selection()).await.unwrap();
        assert!(outcome.is_none());
    }

    #[tokio::test]
    async fn session_is_created_even_when_everything_is_finished() {
        let manager = build_manager(&["C1"]);
        let user = UserId::new("u1");
        manager
            .mark_case_status(&user, &CaseId::new("C1"), CaseStatus::Completed, &selection(), None)
            .await
            .unwrap();

        let started = manager
            .start_queue_session(&user, &selection())
            .await
            .unwrap()
            .expect("matches exist, session is created");
        assert_eq!(started.current_case, None);
        assert_eq!(started.queue_position, -1);
        assert_eq!(started.total_in_queue, 0);
    }

    #[tokio::test]
    async fn released_locks_are_pruned_from_the_map() {
        let locks = SessionLocks::default();
        let hash = FilterContextHash::of(&selection());

        for i in 0..8 {
            let guard = locks.acquire(&UserId::new(format!("u{i}")), &hash).await;
            drop(guard);
        }

        // The next acquisition prunes every released entry.
        let _guard = locks.acquire(&UserId::new("u9"), &hash).await;
        let map = locks.inner.lock().unwrap();
        assert_eq!(map.len(), 1);
    }

    #[tokio::test]
    async fn held_locks_survive_pruning() {
        let locks = SessionLocks::default();
        let hash = FilterContextHash::of(&selection());

        let _held = locks.acquire(&UserId::new("u1"), &hash).await;
        let _other = locks.acquire(&UserId::new("u2"), &hash).await;

        let map = locks.inner.lock().unwrap();
        assert_eq!(map.len(), 2);
        for weak in map.values() {
            assert_eq!(weak.strong_count(), 1);
        }
    }
}
