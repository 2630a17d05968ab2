//! Interface to the case catalog collaborator.
//!
//! The catalog is an external service: it owns case content, search, and
//! ranking. Queue management only needs two calls, so they are specified as
//! a trait here and the real client lives at the deployment boundary. An
//! in-memory implementation is provided for tests and prototyping.

use async_trait::async_trait;
use thiserror::Error;

use casework_core::model::{CaseId, CaseRecord, FilterSelection, SpecializedAreaFilter};

/// Errors surfaced by catalog implementations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CatalogError {
    #[error("catalog unavailable: {0}")]
    Unavailable(String),
}

/// The two catalog calls queue management consumes.
#[async_trait]
pub trait CaseCatalog: Send + Sync {
    /// Resolve a filter selection to the ordered set of matching cases.
    ///
    /// The returned order is the catalog's presentation order and is the
    /// order queues are materialized in.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError` if the catalog cannot be reached.
    async fn find(&self, selection: &FilterSelection) -> Result<Vec<CaseRecord>, CatalogError>;

    /// Resolve a single case id to its record, if it exists.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError` if the catalog cannot be reached.
    async fn resolve(&self, case_id: &CaseId) -> Result<Option<CaseRecord>, CatalogError>;
}

/// Returns true when a case satisfies every provided criterion.
///
/// Program area and specialty match by exact equality. The specialized-area
/// criterion is three-valued: absent means no constraint, `Unspecified`
/// matches only cases without a specialized area, and `Equals` matches by
/// exact equality.
#[must_use]
pub fn selection_matches(selection: &FilterSelection, case: &CaseRecord) -> bool {
    if let Some(program_area) = selection.program_area() {
        if case.program_area != program_area {
            return false;
        }
    }
    if let Some(specialty) = selection.specialty() {
        if case.specialty != specialty {
            return false;
        }
    }
    match selection.specialized_area() {
        SpecializedAreaFilter::Any => true,
        SpecializedAreaFilter::Unspecified => case.specialized_area.is_none(),
        SpecializedAreaFilter::Equals(area) => case.specialized_area.as_deref() == Some(area.as_str()),
    }
}

/// Fixed-content catalog for tests and prototyping.
///
/// Holds cases in insertion order; `find` preserves that order.
#[derive(Clone, Default)]
pub struct InMemoryCaseCatalog {
    cases: Vec<CaseRecord>,
}

impl InMemoryCaseCatalog {
    #[must_use]
    pub fn new(cases: Vec<CaseRecord>) -> Self {
        Self { cases }
    }
}

#[async_trait]
impl CaseCatalog for InMemoryCaseCatalog {
    async fn find(&self, selection: &FilterSelection) -> Result<Vec<CaseRecord>, CatalogError> {
        Ok(self
            .cases
            .iter()
            .filter(|case| selection_matches(selection, case))
            .cloned()
            .collect())
    }

    async fn resolve(&self, case_id: &CaseId) -> Result<Option<CaseRecord>, CatalogError> {
        Ok(self.cases.iter().find(|case| &case.id == case_id).cloned())
    }
}
