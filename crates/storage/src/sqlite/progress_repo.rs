use std::collections::HashSet;

use casework_core::model::{CaseId, CaseProgress, CaseStatus, FilterContextHash, UserId};
use sqlx::Row;

use super::{SqliteRepository, mapping::map_progress_row};
use crate::repository::{CaseProgressRepository, StorageError};

#[async_trait::async_trait]
impl CaseProgressRepository for SqliteRepository {
    async fn upsert(&self, progress: &CaseProgress) -> Result<(), StorageError> {
        sqlx::query(
            r"
            INSERT INTO case_progress (
                user_id, case_id, filter_hash, status, session_id, last_updated_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT(user_id, case_id, filter_hash) DO UPDATE SET
                status = excluded.status,
                session_id = excluded.session_id,
                last_updated_at = excluded.last_updated_at
            ",
        )
        .bind(progress.user_id.as_str())
        .bind(progress.case_id.as_str())
        .bind(progress.filter_hash.as_str())
        .bind(progress.status.as_str())
        .bind(progress.session_id.map(|id| id.to_string()))
        .bind(progress.last_updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        Ok(())
    }

    async fn find_status(
        &self,
        user_id: &UserId,
        case_id: &CaseId,
        filter_hash: &FilterContextHash,
    ) -> Result<Option<CaseStatus>, StorageError> {
        let row = sqlx::query(
            r"
            SELECT status
            FROM case_progress
            WHERE user_id = ?1 AND case_id = ?2 AND filter_hash = ?3
            ",
        )
        .bind(user_id.as_str())
        .bind(case_id.as_str())
        .bind(filter_hash.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        row.map(|r| {
            let status: String = r
                .try_get("status")
                .map_err(|e| StorageError::Serialization(e.to_string()))?;
            status
                .parse::<CaseStatus>()
                .map_err(|e| StorageError::Serialization(e.to_string()))
        })
        .transpose()
    }

    async fn find_excluded_ids(
        &self,
        user_id: &UserId,
        filter_hash: &FilterContextHash,
    ) -> Result<HashSet<CaseId>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT case_id
            FROM case_progress
            WHERE user_id = ?1
              AND filter_hash = ?2
              AND status IN ('completed', 'skipped')
            ",
        )
        .bind(user_id.as_str())
        .bind(filter_hash.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        let mut ids = HashSet::with_capacity(rows.len());
        for row in rows {
            let id: String = row
                .try_get("case_id")
                .map_err(|e| StorageError::Serialization(e.to_string()))?;
            ids.insert(CaseId::new(id));
        }
        Ok(ids)
    }

    async fn find_in_progress(
        &self,
        user_id: &UserId,
        filter_hash: &FilterContextHash,
    ) -> Result<Vec<CaseProgress>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT user_id, case_id, filter_hash, status, session_id, last_updated_at
            FROM case_progress
            WHERE user_id = ?1
              AND filter_hash = ?2
              AND status = 'in_progress_queue'
            ",
        )
        .bind(user_id.as_str())
        .bind(filter_hash.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            records.push(map_progress_row(&row)?);
        }
        Ok(records)
    }
}
