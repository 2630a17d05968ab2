use serde::{Deserialize, Serialize};

use super::ids::CaseId;

/// A scenario case as resolved through the case catalog.
///
/// The catalog owns many more fields (narrative, media, scoring rubric);
/// this core carries only what queue management and reporting need.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaseRecord {
    pub id: CaseId,
    pub title: String,
    pub program_area: String,
    pub specialty: String,
    pub specialized_area: Option<String>,
}

impl CaseRecord {
    #[must_use]
    pub fn new(
        id: CaseId,
        title: impl Into<String>,
        program_area: impl Into<String>,
        specialty: impl Into<String>,
        specialized_area: Option<String>,
    ) -> Self {
        // Catalog records sometimes carry "" where the area is unset.
        let specialized_area = specialized_area.filter(|v| !v.is_empty());
        Self {
            id,
            title: title.into(),
            program_area: program_area.into(),
            specialty: specialty.into(),
            specialized_area,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_specialized_area_normalizes_to_none() {
        let case = CaseRecord::new(
            CaseId::new("C1"),
            "Chest pain",
            "Basic Program",
            "Cardiology",
            Some(String::new()),
        );
        assert_eq!(case.specialized_area, None);
    }

    #[test]
    fn real_specialized_area_is_kept() {
        let case = CaseRecord::new(
            CaseId::new("C1"),
            "Chest pain",
            "Basic Program",
            "Cardiology",
            Some("Imaging".to_string()),
        );
        assert_eq!(case.specialized_area.as_deref(), Some("Imaging"));
    }
}
