use casework_core::model::{
    CaseId, CaseProgress, CaseStatus, FilterContextHash, FilterSelection, QueueSession, SessionId,
    UserId,
};
use sqlx::Row;

use crate::repository::StorageError;

fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

pub(crate) fn session_id_from_str(s: &str) -> Result<SessionId, StorageError> {
    s.parse::<SessionId>()
        .map_err(|_| StorageError::Serialization(format!("invalid session_id: {s}")))
}

pub(crate) fn encode_case_ids(ids: &[CaseId]) -> Result<String, StorageError> {
    serde_json::to_string(ids).map_err(ser)
}

pub(crate) fn encode_selection(selection: &FilterSelection) -> Result<String, StorageError> {
    serde_json::to_string(selection).map_err(ser)
}

pub(crate) fn map_progress_row(row: &sqlx::sqlite::SqliteRow) -> Result<CaseProgress, StorageError> {
    let status_str: String = row.try_get("status").map_err(ser)?;
    let status: CaseStatus = status_str.parse().map_err(ser)?;

    let session_id = row
        .try_get::<Option<String>, _>("session_id")
        .map_err(ser)?
        .as_deref()
        .map(session_id_from_str)
        .transpose()?;

    Ok(CaseProgress::new(
        UserId::new(row.try_get::<String, _>("user_id").map_err(ser)?),
        CaseId::new(row.try_get::<String, _>("case_id").map_err(ser)?),
        FilterContextHash::from_digest(row.try_get::<String, _>("filter_hash").map_err(ser)?),
        status,
        session_id,
        row.try_get("last_updated_at").map_err(ser)?,
    ))
}

pub(crate) fn map_session_row(row: &sqlx::sqlite::SqliteRow) -> Result<QueueSession, StorageError> {
    let session_id =
        session_id_from_str(row.try_get::<String, _>("session_id").map_err(ser)?.as_str())?;

    let filters_applied: FilterSelection =
        serde_json::from_str(row.try_get::<String, _>("filters_applied").map_err(ser)?.as_str())
            .map_err(ser)?;

    let queued_case_ids: Vec<CaseId> =
        serde_json::from_str(row.try_get::<String, _>("queued_case_ids").map_err(ser)?.as_str())
            .map_err(ser)?;

    QueueSession::from_persisted(
        session_id,
        UserId::new(row.try_get::<String, _>("user_id").map_err(ser)?),
        FilterContextHash::from_digest(row.try_get::<String, _>("filter_hash").map_err(ser)?),
        filters_applied,
        queued_case_ids,
        row.try_get("current_case_index").map_err(ser)?,
        row.try_get("created_at").map_err(ser)?,
        row.try_get("updated_at").map_err(ser)?,
    )
    .map_err(ser)
}
