use serde::{Deserialize, Serialize};

/// Textual sentinels that legacy callers send to mean "no specialized area".
const NO_SPECIALIZED_AREA_SENTINELS: [&str; 3] = ["null", "None", ""];

/// Constraint applied to the specialized-area criterion of a selection.
///
/// Legacy payloads encode "no specialized area" with string sentinels
/// ("null", "None", ""); those normalize to `Unspecified` at construction
/// time so downstream hashing and matching never see the raw sentinels.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SpecializedAreaFilter {
    /// Criterion not provided: any specialized area matches.
    #[default]
    Any,
    /// Only cases without a specialized area match.
    Unspecified,
    /// Only cases with exactly this specialized area match.
    Equals(String),
}

impl SpecializedAreaFilter {
    /// Normalizes a raw criterion value, collapsing sentinels to `Unspecified`.
    #[must_use]
    pub fn from_raw(value: Option<String>) -> Self {
        match value {
            None => Self::Any,
            Some(v) if NO_SPECIALIZED_AREA_SENTINELS.contains(&v.as_str()) => Self::Unspecified,
            Some(v) => Self::Equals(v),
        }
    }
}

/// The catalog criteria a learner chose for a practice run.
///
/// Absent criteria impose no constraint. Two selections carrying the same
/// criteria are interchangeable everywhere: they hash to the same
/// [`FilterContextHash`](crate::model::FilterContextHash) and therefore share
/// progress and session state.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FilterSelection {
    program_area: Option<String>,
    specialty: Option<String>,
    specialized_area: SpecializedAreaFilter,
}

impl FilterSelection {
    /// An empty selection: matches every case in the catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a selection from raw criterion values as received at the API
    /// boundary, applying sentinel normalization to the specialized area.
    #[must_use]
    pub fn from_raw(
        program_area: Option<String>,
        specialty: Option<String>,
        specialized_area: Option<String>,
    ) -> Self {
        Self {
            program_area,
            specialty,
            specialized_area: SpecializedAreaFilter::from_raw(specialized_area),
        }
    }

    #[must_use]
    pub fn with_program_area(mut self, value: impl Into<String>) -> Self {
        self.program_area = Some(value.into());
        self
    }

    #[must_use]
    pub fn with_specialty(mut self, value: impl Into<String>) -> Self {
        self.specialty = Some(value.into());
        self
    }

    #[must_use]
    pub fn with_specialized_area(mut self, filter: SpecializedAreaFilter) -> Self {
        self.specialized_area = filter;
        self
    }

    #[must_use]
    pub fn program_area(&self) -> Option<&str> {
        self.program_area.as_deref()
    }

    #[must_use]
    pub fn specialty(&self) -> Option<&str> {
        self.specialty.as_deref()
    }

    #[must_use]
    pub fn specialized_area(&self) -> &SpecializedAreaFilter {
        &self.specialized_area
    }

    /// Returns the provided criteria as `(key, value)` pairs in lexicographic
    /// key order. This is the canonical enumeration used for hashing: absent
    /// criteria are omitted, an `Unspecified` specialized area renders as an
    /// empty value.
    #[must_use]
    pub fn criteria(&self) -> Vec<(&'static str, &str)> {
        // Key order is fixed: programArea < specializedArea < specialty.
        let mut pairs = Vec::with_capacity(3);
        if let Some(v) = self.program_area.as_deref() {
            pairs.push(("programArea", v));
        }
        match &self.specialized_area {
            SpecializedAreaFilter::Any => {}
            SpecializedAreaFilter::Unspecified => pairs.push(("specializedArea", "")),
            SpecializedAreaFilter::Equals(v) => pairs.push(("specializedArea", v.as_str())),
        }
        if let Some(v) = self.specialty.as_deref() {
            pairs.push(("specialty", v));
        }
        pairs
    }

    /// Returns true when no criteria were provided.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.program_area.is_none()
            && self.specialty.is_none()
            && self.specialized_area == SpecializedAreaFilter::Any
    }
}
