use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Per-case progress status under one filter context hash.
///
/// Transitions:
///
/// ```text
/// (none) ──first touch──────────────────> InProgressQueue
/// InProgressQueue ──another case current─> ViewedInQueue
/// InProgressQueue ──caller outcome───────> Completed | Skipped
/// ViewedInQueue ──caller outcome─────────> Completed | Skipped
/// Completed, Skipped: terminal for this filter context
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaseStatus {
    InProgressQueue,
    ViewedInQueue,
    Completed,
    Skipped,
}

impl CaseStatus {
    /// Storage / wire representation of the status.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            CaseStatus::InProgressQueue => "in_progress_queue",
            CaseStatus::ViewedInQueue => "viewed_in_queue",
            CaseStatus::Completed => "completed",
            CaseStatus::Skipped => "skipped",
        }
    }

    /// Terminal statuses permanently exclude the case from materialization
    /// under the same filter context hash.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, CaseStatus::Completed | CaseStatus::Skipped)
    }

    /// Statuses a caller may report as the outcome of the previous case when
    /// advancing the queue. `InProgressQueue` is assigned by the manager only.
    #[must_use]
    pub fn is_reportable_outcome(&self) -> bool {
        matches!(
            self,
            CaseStatus::Completed | CaseStatus::Skipped | CaseStatus::ViewedInQueue
        )
    }
}

impl fmt::Display for CaseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error type for parsing a `CaseStatus` from its storage representation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseStatusError {
    value: String,
}

impl fmt::Display for ParseStatusError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid case status: {}", self.value)
    }
}

impl std::error::Error for ParseStatusError {}

impl FromStr for CaseStatus {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "in_progress_queue" => Ok(CaseStatus::InProgressQueue),
            "viewed_in_queue" => Ok(CaseStatus::ViewedInQueue),
            "completed" => Ok(CaseStatus::Completed),
            "skipped" => Ok(CaseStatus::Skipped),
            other => Err(ParseStatusError {
                value: other.to_string(),
            }),
        }
    }
}
