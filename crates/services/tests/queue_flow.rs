use std::sync::Arc;

use casework_core::model::{
    CaseId, CaseRecord, CaseStatus, FilterContextHash, FilterSelection, UserId,
};
use casework_core::time::fixed_clock;
use services::queue::{PreviousOutcome, QueueError, QueueSessionManager};
use services::InMemoryCaseCatalog;
use storage::repository::Storage;

fn build_case(id: &str, specialty: &str) -> CaseRecord {
    CaseRecord::new(
        CaseId::new(id),
        format!("Case {id}"),
        "Basic Program",
        specialty,
        None,
    )
}

fn cardiology_catalog() -> InMemoryCaseCatalog {
    InMemoryCaseCatalog::new(vec![
        build_case("C1", "Cardiology"),
        build_case("C2", "Cardiology"),
        build_case("C3", "Cardiology"),
        build_case("N1", "Neurology"),
    ])
}

fn build_manager() -> QueueSessionManager {
    QueueSessionManager::with_storage(
        fixed_clock(),
        Arc::new(cardiology_catalog()),
        &Storage::in_memory(),
    )
}

fn selection() -> FilterSelection {
    FilterSelection::new()
        .with_program_area("Basic Program")
        .with_specialty("Cardiology")
}

fn swapped_selection() -> FilterSelection {
    // Same criteria, built in the opposite order.
    FilterSelection::new()
        .with_specialty("Cardiology")
        .with_program_area("Basic Program")
}

#[tokio::test]
async fn start_materializes_catalog_order() {
    // Scenario A.
    let manager = build_manager();
    let user = UserId::new("u1");

    let started = manager
        .start_queue_session(&user, &selection())
        .await
        .unwrap()
        .expect("cases match");

    assert_eq!(started.current_case.as_ref().unwrap().id, CaseId::new("C1"));
    assert_eq!(started.queue_position, 0);
    assert_eq!(started.total_in_queue, 3);

    let view = manager.queue_session(&user, started.session_id).await.unwrap();
    assert_eq!(view.current_case.unwrap().id, CaseId::new("C1"));
    assert!(view.finished_case_ids.is_empty());
}

#[tokio::test]
async fn advance_records_outcome_and_serves_the_next_case() {
    // Scenario B.
    let manager = build_manager();
    let user = UserId::new("u1");
    let started = manager
        .start_queue_session(&user, &selection())
        .await
        .unwrap()
        .unwrap();

    let advanced = manager
        .next_case_in_queue(
            &user,
            started.session_id,
            Some(PreviousOutcome {
                case_id: CaseId::new("C1"),
                status: CaseStatus::Completed,
            }),
        )
        .await
        .unwrap();

    assert_eq!(advanced.current_case.as_ref().unwrap().id, CaseId::new("C2"));
    assert_eq!(advanced.queue_position, 1);
    assert_eq!(advanced.total_in_queue, 3);

    let view = manager.queue_session(&user, started.session_id).await.unwrap();
    assert!(view.finished_case_ids.contains(&CaseId::new("C1")));
}

#[tokio::test]
async fn out_of_session_mark_excludes_and_restart_pins_the_in_flight_case() {
    // Scenario C.
    let manager = build_manager();
    let user = UserId::new("u1");

    let first = manager
        .start_queue_session(&user, &selection())
        .await
        .unwrap()
        .unwrap();
    // C2 becomes the in-flight case.
    manager
        .next_case_in_queue(
            &user,
            first.session_id,
            Some(PreviousOutcome {
                case_id: CaseId::new("C1"),
                status: CaseStatus::Completed,
            }),
        )
        .await
        .unwrap();

    // Record C3 as skipped outside any session.
    manager
        .mark_case_status(&user, &CaseId::new("C3"), CaseStatus::Skipped, &selection(), None)
        .await
        .unwrap();

    // Restarting leaves only C2, pinned at the front.
    let second = manager
        .start_queue_session(&user, &selection())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(second.current_case.as_ref().unwrap().id, CaseId::new("C2"));
    assert_eq!(second.queue_position, 0);
    assert_eq!(second.total_in_queue, 1);
    assert_ne!(second.session_id, first.session_id);

    // The replaced token is gone.
    let err = manager.queue_session(&user, first.session_id).await.unwrap_err();
    assert!(matches!(err, QueueError::SessionNotFound));
}

#[tokio::test]
async fn swapped_criteria_share_the_same_filter_context() {
    // Scenario D.
    assert_eq!(
        FilterContextHash::of(&selection()),
        FilterContextHash::of(&swapped_selection())
    );

    // Progress recorded under one spelling is visible under the other.
    let manager = build_manager();
    let user = UserId::new("u1");
    manager
        .mark_case_status(&user, &CaseId::new("C1"), CaseStatus::Completed, &selection(), None)
        .await
        .unwrap();

    let started = manager
        .start_queue_session(&user, &swapped_selection())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(started.current_case.as_ref().unwrap().id, CaseId::new("C2"));
    assert_eq!(started.total_in_queue, 2);
}

#[tokio::test]
async fn foreign_session_token_is_not_found() {
    // Scenario E.
    let manager = build_manager();
    let owner = UserId::new("owner");
    let started = manager
        .start_queue_session(&owner, &selection())
        .await
        .unwrap()
        .unwrap();

    let err = manager
        .queue_session(&UserId::new("intruder"), started.session_id)
        .await
        .unwrap_err();
    assert!(matches!(err, QueueError::SessionNotFound));

    let err = manager
        .next_case_in_queue(&UserId::new("intruder"), started.session_id, None)
        .await
        .unwrap_err();
    assert!(matches!(err, QueueError::SessionNotFound));
}

#[tokio::test]
async fn restart_without_progress_is_idempotent() {
    let manager = build_manager();
    let user = UserId::new("u1");

    let first = manager
        .start_queue_session(&user, &selection())
        .await
        .unwrap()
        .unwrap();
    let second = manager
        .start_queue_session(&user, &selection())
        .await
        .unwrap()
        .unwrap();

    assert_eq!(
        first.current_case.as_ref().unwrap().id,
        second.current_case.as_ref().unwrap().id
    );
    assert_eq!(first.total_in_queue, second.total_in_queue);
}

#[tokio::test]
async fn finished_cases_never_come_back() {
    let manager = build_manager();
    let user = UserId::new("u1");
    let started = manager
        .start_queue_session(&user, &selection())
        .await
        .unwrap()
        .unwrap();

    manager
        .next_case_in_queue(
            &user,
            started.session_id,
            Some(PreviousOutcome {
                case_id: CaseId::new("C1"),
                status: CaseStatus::Completed,
            }),
        )
        .await
        .unwrap();

    // Restart repeatedly: C1 must never be served again under this selection.
    for _ in 0..3 {
        let restarted = manager
            .start_queue_session(&user, &selection())
            .await
            .unwrap()
            .unwrap();
        assert_ne!(restarted.current_case.as_ref().unwrap().id, CaseId::new("C1"));
        assert_eq!(restarted.total_in_queue, 2);
    }
}

#[tokio::test]
async fn completing_every_case_exhausts_after_total_advances() {
    let manager = build_manager();
    let user = UserId::new("u1");
    let started = manager
        .start_queue_session(&user, &selection())
        .await
        .unwrap()
        .unwrap();
    let total = started.total_in_queue;

    let mut current = started.current_case.clone();
    let mut advances = 0;
    while let Some(case) = current {
        let snapshot = manager
            .next_case_in_queue(
                &user,
                started.session_id,
                Some(PreviousOutcome {
                    case_id: case.id,
                    status: CaseStatus::Completed,
                }),
            )
            .await
            .unwrap();
        advances += 1;
        current = snapshot.current_case;
    }

    assert_eq!(advances, total);

    // The exhausted session stays exhausted.
    let snapshot = manager
        .next_case_in_queue(&user, started.session_id, None)
        .await
        .unwrap();
    assert!(snapshot.current_case.is_none());
    assert_eq!(snapshot.queue_position, -1);

    let view = manager.queue_session(&user, started.session_id).await.unwrap();
    assert_eq!(view.finished_case_ids.len(), total);
    assert!(view.progress().is_exhausted);
}

#[tokio::test]
async fn advancing_demotes_the_previous_case_to_viewed() {
    let manager = build_manager();
    let user = UserId::new("u1");
    let started = manager
        .start_queue_session(&user, &selection())
        .await
        .unwrap()
        .unwrap();

    // Advance without reporting an outcome: C1 was only looked at.
    let advanced = manager
        .next_case_in_queue(&user, started.session_id, None)
        .await
        .unwrap();
    assert_eq!(advanced.current_case.as_ref().unwrap().id, CaseId::new("C2"));

    // C1 is viewed, not finished: a restart serves it again after C2.
    let restarted = manager
        .start_queue_session(&user, &selection())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(restarted.current_case.as_ref().unwrap().id, CaseId::new("C2"));
    assert_eq!(restarted.total_in_queue, 3);
}

#[tokio::test]
async fn different_selections_partition_progress() {
    let manager = build_manager();
    let user = UserId::new("u1");

    // Finish C1 under the cardiology selection.
    manager
        .mark_case_status(&user, &CaseId::new("C1"), CaseStatus::Completed, &selection(), None)
        .await
        .unwrap();

    // Under the empty selection (different hash) C1 is fresh again.
    let started = manager
        .start_queue_session(&user, &FilterSelection::new())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(started.current_case.as_ref().unwrap().id, CaseId::new("C1"));
    assert_eq!(started.total_in_queue, 4);
}

#[tokio::test]
async fn mark_then_advance_skips_cases_finished_mid_session() {
    let manager = build_manager();
    let user = UserId::new("u1");
    let started = manager
        .start_queue_session(&user, &selection())
        .await
        .unwrap()
        .unwrap();

    // C2 gets finished outside the queue while C1 is current.
    manager
        .mark_case_status(&user, &CaseId::new("C2"), CaseStatus::Completed, &selection(), None)
        .await
        .unwrap();

    // The walk skips C2 and lands on C3.
    let advanced = manager
        .next_case_in_queue(
            &user,
            started.session_id,
            Some(PreviousOutcome {
                case_id: CaseId::new("C1"),
                status: CaseStatus::Completed,
            }),
        )
        .await
        .unwrap();
    assert_eq!(advanced.current_case.as_ref().unwrap().id, CaseId::new("C3"));
    assert_eq!(advanced.queue_position, 2);
}
