use async_trait::async_trait;
use casework_core::model::{
    CaseId, CaseProgress, CaseStatus, FilterContextHash, QueueSession, SessionId, UserId,
};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("conflict")]
    Conflict,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Repository contract for the per-case progress ledger.
///
/// One record exists per `(user_id, case_id, filter_hash)` triple; `upsert`
/// overwrites in place and history is not retained.
#[async_trait]
pub trait CaseProgressRepository: Send + Sync {
    /// Create or overwrite the single record for the progress triple.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the record cannot be stored.
    async fn upsert(&self, progress: &CaseProgress) -> Result<(), StorageError>;

    /// Latest status for one case under one filter context, if any.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on storage failures. A missing record is
    /// `Ok(None)`, not an error.
    async fn find_status(
        &self,
        user_id: &UserId,
        case_id: &CaseId,
        filter_hash: &FilterContextHash,
    ) -> Result<Option<CaseStatus>, StorageError>;

    /// All case ids whose status is terminal (completed or skipped) under
    /// the filter context. These are excluded from queue materialization.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on storage failures.
    async fn find_excluded_ids(
        &self,
        user_id: &UserId,
        filter_hash: &FilterContextHash,
    ) -> Result<HashSet<CaseId>, StorageError>;

    /// All records currently `in_progress_queue` under the filter context.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on storage failures.
    async fn find_in_progress(
        &self,
        user_id: &UserId,
        filter_hash: &FilterContextHash,
    ) -> Result<Vec<CaseProgress>, StorageError>;
}

/// Repository contract for queue sessions.
///
/// One session exists per `(user_id, filter_hash)` pair.
#[async_trait]
pub trait QueueSessionRepository: Send + Sync {
    /// Fetch the session for a `(user, filter hash)` pair, if one exists.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on storage failures.
    async fn get(
        &self,
        user_id: &UserId,
        filter_hash: &FilterContextHash,
    ) -> Result<Option<QueueSession>, StorageError>;

    /// Ownership-scoped lookup by session token. Returns `Ok(None)` when the
    /// session is absent or belongs to a different user; callers must treat
    /// both identically.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on storage failures.
    async fn get_by_token(
        &self,
        session_id: SessionId,
        user_id: &UserId,
    ) -> Result<Option<QueueSession>, StorageError>;

    /// Atomically delete any existing session for the session's
    /// `(user, filter hash)` pair and store the new one.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the swap cannot be performed.
    async fn replace(&self, session: &QueueSession) -> Result<(), StorageError>;

    /// Persist an in-place mutation (cursor advancement) of an existing
    /// session.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if no session exists for the pair.
    async fn save(&self, session: &QueueSession) -> Result<(), StorageError>;
}

/// Simple in-memory repository implementation for testing and prototyping.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    progress: Arc<Mutex<HashMap<(UserId, CaseId, FilterContextHash), CaseProgress>>>,
    sessions: Arc<Mutex<HashMap<(UserId, FilterContextHash), QueueSession>>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CaseProgressRepository for InMemoryRepository {
    async fn upsert(&self, progress: &CaseProgress) -> Result<(), StorageError> {
        let mut guard = self
            .progress
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.insert(progress.key(), progress.clone());
        Ok(())
    }

    async fn find_status(
        &self,
        user_id: &UserId,
        case_id: &CaseId,
        filter_hash: &FilterContextHash,
    ) -> Result<Option<CaseStatus>, StorageError> {
        let guard = self
            .progress
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(guard
            .get(&(user_id.clone(), case_id.clone(), filter_hash.clone()))
            .map(|p| p.status))
    }

    async fn find_excluded_ids(
        &self,
        user_id: &UserId,
        filter_hash: &FilterContextHash,
    ) -> Result<HashSet<CaseId>, StorageError> {
        let guard = self
            .progress
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(guard
            .values()
            .filter(|p| {
                &p.user_id == user_id && &p.filter_hash == filter_hash && p.status.is_terminal()
            })
            .map(|p| p.case_id.clone())
            .collect())
    }

    async fn find_in_progress(
        &self,
        user_id: &UserId,
        filter_hash: &FilterContextHash,
    ) -> Result<Vec<CaseProgress>, StorageError> {
        let guard = self
            .progress
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(guard
            .values()
            .filter(|p| {
                &p.user_id == user_id
                    && &p.filter_hash == filter_hash
                    && p.status == CaseStatus::InProgressQueue
            })
            .cloned()
            .collect())
    }
}

#[async_trait]
impl QueueSessionRepository for InMemoryRepository {
    async fn get(
        &self,
        user_id: &UserId,
        filter_hash: &FilterContextHash,
    ) -> Result<Option<QueueSession>, StorageError> {
        let guard = self
            .sessions
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(guard.get(&(user_id.clone(), filter_hash.clone())).cloned())
    }

    async fn get_by_token(
        &self,
        session_id: SessionId,
        user_id: &UserId,
    ) -> Result<Option<QueueSession>, StorageError> {
        let guard = self
            .sessions
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(guard
            .values()
            .find(|s| s.session_id() == session_id && s.user_id() == user_id)
            .cloned())
    }

    async fn replace(&self, session: &QueueSession) -> Result<(), StorageError> {
        let mut guard = self
            .sessions
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.insert(
            (session.user_id().clone(), session.filter_hash().clone()),
            session.clone(),
        );
        Ok(())
    }

    async fn save(&self, session: &QueueSession) -> Result<(), StorageError> {
        let mut guard = self
            .sessions
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        let key = (session.user_id().clone(), session.filter_hash().clone());
        match guard.get(&key) {
            Some(existing) if existing.session_id() == session.session_id() => {
                guard.insert(key, session.clone());
                Ok(())
            }
            _ => Err(StorageError::NotFound),
        }
    }
}

/// Aggregates both repositories behind trait objects for easy backend
/// swapping.
#[derive(Clone)]
pub struct Storage {
    pub progress: Arc<dyn CaseProgressRepository>,
    pub sessions: Arc<dyn QueueSessionRepository>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        let repo = InMemoryRepository::new();
        let progress: Arc<dyn CaseProgressRepository> = Arc::new(repo.clone());
        let sessions: Arc<dyn QueueSessionRepository> = Arc::new(repo);
        Self { progress, sessions }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use casework_core::model::FilterSelection;
    use casework_core::time::fixed_now;

    fn hash() -> FilterContextHash {
        FilterContextHash::of(&FilterSelection::new().with_specialty("Cardiology"))
    }

    fn build_progress(case: &str, status: CaseStatus) -> CaseProgress {
        CaseProgress::new(
            UserId::new("u1"),
            CaseId::new(case),
            hash(),
            status,
            None,
            fixed_now(),
        )
    }

    fn build_session(queued: &[&str]) -> QueueSession {
        let selection = FilterSelection::new().with_specialty("Cardiology");
        QueueSession::new(
            SessionId::generate(),
            UserId::new("u1"),
            FilterContextHash::of(&selection),
            selection,
            queued.iter().map(|s| CaseId::new(*s)).collect(),
            fixed_now(),
        )
    }

    #[tokio::test]
    async fn upsert_keeps_a_single_record_per_triple() {
        let repo = InMemoryRepository::new();
        let user = UserId::new("u1");

        repo.upsert(&build_progress("C1", CaseStatus::InProgressQueue))
            .await
            .unwrap();
        repo.upsert(&build_progress("C1", CaseStatus::Completed))
            .await
            .unwrap();

        let status = repo
            .find_status(&user, &CaseId::new("C1"), &hash())
            .await
            .unwrap();
        assert_eq!(status, Some(CaseStatus::Completed));

        let excluded = repo.find_excluded_ids(&user, &hash()).await.unwrap();
        assert_eq!(excluded.len(), 1);
    }

    #[tokio::test]
    async fn excluded_ids_cover_completed_and_skipped_only() {
        let repo = InMemoryRepository::new();
        let user = UserId::new("u1");

        repo.upsert(&build_progress("C1", CaseStatus::Completed))
            .await
            .unwrap();
        repo.upsert(&build_progress("C2", CaseStatus::Skipped))
            .await
            .unwrap();
        repo.upsert(&build_progress("C3", CaseStatus::ViewedInQueue))
            .await
            .unwrap();

        let excluded = repo.find_excluded_ids(&user, &hash()).await.unwrap();
        assert!(excluded.contains(&CaseId::new("C1")));
        assert!(excluded.contains(&CaseId::new("C2")));
        assert!(!excluded.contains(&CaseId::new("C3")));
    }

    #[tokio::test]
    async fn replace_keeps_one_session_per_pair() {
        let repo = InMemoryRepository::new();
        let first = build_session(&["C1", "C2"]);
        let second = build_session(&["C2"]);

        repo.replace(&first).await.unwrap();
        repo.replace(&second).await.unwrap();

        let stored = repo
            .get(first.user_id(), first.filter_hash())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.session_id(), second.session_id());
        assert!(
            repo.get_by_token(first.session_id(), first.user_id())
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn get_by_token_is_ownership_scoped() {
        let repo = InMemoryRepository::new();
        let session = build_session(&["C1"]);
        repo.replace(&session).await.unwrap();

        let foreign = repo
            .get_by_token(session.session_id(), &UserId::new("intruder"))
            .await
            .unwrap();
        assert!(foreign.is_none());
    }

    #[tokio::test]
    async fn save_requires_an_existing_session() {
        let repo = InMemoryRepository::new();
        let session = build_session(&["C1"]);

        let err = repo.save(&session).await.unwrap_err();
        assert!(matches!(err, StorageError::NotFound));

        repo.replace(&session).await.unwrap();
        let mut advanced = session.clone();
        advanced.mark_exhausted(fixed_now());
        repo.save(&advanced).await.unwrap();

        let stored = repo
            .get(session.user_id(), session.filter_hash())
            .await
            .unwrap()
            .unwrap();
        assert!(stored.is_exhausted());
    }
}
