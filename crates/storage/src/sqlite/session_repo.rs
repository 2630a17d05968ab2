use casework_core::model::{FilterContextHash, QueueSession, SessionId, UserId};

use super::{
    SqliteRepository,
    mapping::{encode_case_ids, encode_selection, map_session_row},
};
use crate::repository::{QueueSessionRepository, StorageError};

#[async_trait::async_trait]
impl QueueSessionRepository for SqliteRepository {
    async fn get(
        &self,
        user_id: &UserId,
        filter_hash: &FilterContextHash,
    ) -> Result<Option<QueueSession>, StorageError> {
        let row = sqlx::query(
            r"
            SELECT user_id, filter_hash, session_id, filters_applied,
                   queued_case_ids, current_case_index, created_at, updated_at
            FROM queue_sessions
            WHERE user_id = ?1 AND filter_hash = ?2
            ",
        )
        .bind(user_id.as_str())
        .bind(filter_hash.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        row.as_ref().map(map_session_row).transpose()
    }

    async fn get_by_token(
        &self,
        session_id: SessionId,
        user_id: &UserId,
    ) -> Result<Option<QueueSession>, StorageError> {
        // Scoping by both token and user makes a foreign-owned session
        // indistinguishable from a missing one.
        let row = sqlx::query(
            r"
            SELECT user_id, filter_hash, session_id, filters_applied,
                   queued_case_ids, current_case_index, created_at, updated_at
            FROM queue_sessions
            WHERE session_id = ?1 AND user_id = ?2
            ",
        )
        .bind(session_id.to_string())
        .bind(user_id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        row.as_ref().map(map_session_row).transpose()
    }

    async fn replace(&self, session: &QueueSession) -> Result<(), StorageError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        sqlx::query(
            r"
            DELETE FROM queue_sessions
            WHERE user_id = ?1 AND filter_hash = ?2
            ",
        )
        .bind(session.user_id().as_str())
        .bind(session.filter_hash().as_str())
        .execute(&mut *tx)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        sqlx::query(
            r"
            INSERT INTO queue_sessions (
                user_id, filter_hash, session_id, filters_applied,
                queued_case_ids, current_case_index, created_at, updated_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            ",
        )
        .bind(session.user_id().as_str())
        .bind(session.filter_hash().as_str())
        .bind(session.session_id().to_string())
        .bind(encode_selection(session.filters_applied())?)
        .bind(encode_case_ids(session.queued_case_ids())?)
        .bind(session.current_case_index())
        .bind(session.created_at())
        .bind(session.updated_at())
        .execute(&mut *tx)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        tx.commit()
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        Ok(())
    }

    async fn save(&self, session: &QueueSession) -> Result<(), StorageError> {
        let result = sqlx::query(
            r"
            UPDATE queue_sessions
            SET current_case_index = ?1, updated_at = ?2
            WHERE session_id = ?3 AND user_id = ?4
            ",
        )
        .bind(session.current_case_index())
        .bind(session.updated_at())
        .bind(session.session_id().to_string())
        .bind(session.user_id().as_str())
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }
        Ok(())
    }
}
