use std::collections::HashSet;

use casework_core::model::CaseId;

/// Builds the traversal order for a new queue session.
///
/// Catalog order is preserved, minus cases whose progress is terminal under
/// the same filter context. When a pinned case survives the exclusion (the
/// in-flight case of the session being replaced), it moves to the front so a
/// restart resumes where the learner left off; a pinned case that is no
/// longer eligible is dropped with the rest of the stale session state.
#[must_use]
pub(crate) fn materialize_queue(
    matches: &[CaseId],
    excluded: &HashSet<CaseId>,
    pinned: Option<&CaseId>,
) -> Vec<CaseId> {
    let mut available: Vec<CaseId> = matches
        .iter()
        .filter(|id| !excluded.contains(*id))
        .cloned()
        .collect();

    if let Some(pin) = pinned {
        if let Some(pos) = available.iter().position(|id| id == pin) {
            let pin = available.remove(pos);
            available.insert(0, pin);
        }
    }

    available
}
