use std::sync::Arc;

use hrm_requests::engine::{AuthzAxis, Engine, EngineError, Principal, Transition};
use hrm_requests::model::filter::FilterSignature;
use hrm_requests::model::permission::{Permission, PermissionSet};
use hrm_requests::model::request::{
    DateRange, DayPart, NewRequest, RequestDetail, RequestKind, RequestPatch, RequestStatus,
};
use hrm_requests::model::role::Role;
use hrm_requests::store::memory::MemoryStore;
use hrm_requests::store::RequestStore;

fn setup() -> (Engine<MemoryStore>, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    (Engine::new(store.clone()), store)
}

fn employee(employee_id: u64, name: &str) -> Principal {
    Principal {
        employee_id: Some(employee_id),
        employee_name: name.into(),
        role: Role::Employee,
        permissions: PermissionSet::empty(),
    }
}

fn manager(permissions: PermissionSet) -> Principal {
    Principal {
        employee_id: None,
        employee_name: "Jane Manager".into(),
        role: Role::Manager,
        permissions,
    }
}

fn reviewer() -> Principal {
    manager(PermissionSet::all())
}

fn ordinary_leave(employee_id: u64, name: &str, start: &str, end: &str) -> NewRequest {
    NewRequest {
        employee_id,
        employee_name: name.into(),
        description: "trip".into(),
        detail: RequestDetail::OrdinaryLeave {
            range: DateRange::between(start.parse().unwrap(), end.parse().unwrap()).unwrap(),
        },
    }
}

fn home_visit(employee_id: u64, name: &str) -> NewRequest {
    NewRequest {
        employee_id,
        employee_name: name.into(),
        description: "doctor visit at home".into(),
        detail: RequestDetail::HomeVisit {
            date: "2024-06-10".parse().unwrap(),
            permit_approval: true,
            medical_report: Some("reports/2024/ref-881.pdf".into()),
        },
    }
}

fn mission(employee_id: u64, date: &str) -> NewRequest {
    NewRequest {
        employee_id,
        employee_name: "Courier".into(),
        description: "client site".into(),
        detail: RequestDetail::Mission {
            date: date.parse().unwrap(),
            day_part: DayPart::FullDay,
        },
    }
}

// --- creation -------------------------------------------------------------

#[tokio::test]
async fn create_then_get_round_trips_every_submitted_field() {
    let (engine, _) = setup();
    let submitter = employee(1000, "John Doe");
    let new = ordinary_leave(1000, "John Doe", "2024-05-01", "2024-05-03");

    let created = engine.create(&submitter, new.clone()).await.unwrap();
    assert_eq!(created.status, RequestStatus::Pending);
    assert!(created.id > 0);

    let fetched = engine.get(created.id).await.unwrap();
    assert_eq!(fetched, created);
    assert_eq!(fetched.employee_id, 1000);
    assert_eq!(fetched.description, "trip");
    assert_eq!(fetched.comment, None);
    match fetched.detail {
        RequestDetail::OrdinaryLeave { range } => assert_eq!(range.number_of_days, 3),
        other => panic!("wrong detail: {other:?}"),
    }
}

#[tokio::test]
async fn create_for_someone_else_is_denied() {
    let (engine, _) = setup();
    let err = engine
        .create(
            &employee(1000, "John Doe"),
            ordinary_leave(2000, "Someone Else", "2024-05-01", "2024-05-01"),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Unauthorized { .. }));
}

#[tokio::test]
async fn assign_skips_pending_entirely() {
    let (engine, _) = setup();
    let record = engine
        .assign(&reviewer(), ordinary_leave(2000, "Amal", "2024-07-01", "2024-07-02"))
        .await
        .unwrap();
    assert_eq!(record.status, RequestStatus::AssignedManually);

    // assignment is reviewer-only
    let err = engine
        .assign(
            &employee(1000, "John Doe"),
            ordinary_leave(1000, "John Doe", "2024-07-01", "2024-07-02"),
        )
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        EngineError::Unauthorized {
            axis: AuthzAxis::Role,
            ..
        }
    ));
}

// --- review ---------------------------------------------------------------

#[tokio::test]
async fn reject_then_accept_fails_with_invalid_transition() {
    let (engine, _) = setup();
    let created = engine
        .create(
            &employee(42, "Sami"),
            NewRequest {
                employee_id: 42,
                employee_name: "Sami".into(),
                description: "flu".into(),
                detail: RequestDetail::SickLeave {
                    range: DateRange::between(
                        "2024-05-06".parse().unwrap(),
                        "2024-05-07".parse().unwrap(),
                    )
                    .unwrap(),
                    permit_approval: false,
                    medical_report: None,
                },
            },
        )
        .await
        .unwrap();

    let rejected = engine
        .reject(&reviewer(), created.id, "insufficient notice")
        .await
        .unwrap();
    assert_eq!(rejected.status, RequestStatus::Rejected);
    assert_eq!(rejected.comment.as_deref(), Some("insufficient notice"));

    let err = engine.accept(&reviewer(), created.id).await.unwrap_err();
    assert_eq!(
        err,
        EngineError::InvalidTransition {
            transition: Transition::Accept,
            from: RequestStatus::Rejected,
        }
    );
}

#[tokio::test]
async fn blank_comment_fails_before_any_store_call() {
    let (engine, _) = setup();
    // A nonexistent id would be NotFound if the store were consulted; the
    // comment check must win.
    let err = engine.reject(&reviewer(), 9999, "   ").await.unwrap_err();
    assert_eq!(err, EngineError::MissingComment);
}

#[tokio::test]
async fn accept_fails_from_every_non_pending_status() {
    let (engine, store) = setup();
    let created = engine
        .create(
            &employee(1, "A"),
            ordinary_leave(1, "A", "2024-05-01", "2024-05-01"),
        )
        .await
        .unwrap();

    for status in [
        RequestStatus::Accepted,
        RequestStatus::Rejected,
        RequestStatus::Ignored,
        RequestStatus::Edited,
        RequestStatus::AssignedManually,
    ] {
        store.force_status(created.id, status);
        let err = engine.accept(&reviewer(), created.id).await.unwrap_err();
        assert_eq!(
            err,
            EngineError::InvalidTransition {
                transition: Transition::Accept,
                from: status,
            }
        );
        // the stored record is untouched by the failed attempt
        let current = store.get_request(created.id).await.unwrap().unwrap();
        assert_eq!(current.status, status);
    }
}

#[tokio::test]
async fn employee_accept_is_denied_before_the_store_is_consulted() {
    let (engine, _) = setup();
    // id does not exist; role axis must fail first, not NotFound
    let err = engine
        .accept(&employee(1000, "John Doe"), 404)
        .await
        .unwrap_err();
    assert_eq!(
        err,
        EngineError::Unauthorized {
            axis: AuthzAxis::Role,
            transition: Transition::Accept,
        }
    );
}

#[tokio::test]
async fn manager_without_review_permission_is_denied_and_request_stays_pending() {
    let (engine, _) = setup();
    let created = engine
        .create(
            &employee(7, "Nadia"),
            ordinary_leave(7, "Nadia", "2024-05-01", "2024-05-02"),
        )
        .await
        .unwrap();

    let powerless = manager(PermissionSet::empty().grant(Permission::DeleteRequests));
    let err = engine.accept(&powerless, created.id).await.unwrap_err();
    assert_eq!(
        err,
        EngineError::Unauthorized {
            axis: AuthzAxis::Permission,
            transition: Transition::Accept,
        }
    );

    let current = engine.get(created.id).await.unwrap();
    assert_eq!(current.status, RequestStatus::Pending);
}

// --- editing --------------------------------------------------------------

#[tokio::test]
async fn owner_edit_of_pending_stays_pending() {
    let (engine, _) = setup();
    let submitter = employee(10, "Rana");
    let created = engine
        .create(&submitter, ordinary_leave(10, "Rana", "2024-05-01", "2024-05-02"))
        .await
        .unwrap();

    let patched = engine
        .update(
            &submitter,
            created.id,
            RequestPatch {
                description: "trip, extended".into(),
                detail: RequestDetail::OrdinaryLeave {
                    range: DateRange::between(
                        "2024-05-01".parse().unwrap(),
                        "2024-05-04".parse().unwrap(),
                    )
                    .unwrap(),
                },
            },
        )
        .await
        .unwrap();

    assert_eq!(patched.status, RequestStatus::Pending);
    assert_eq!(patched.description, "trip, extended");
}

#[tokio::test]
async fn someone_elses_pending_request_cannot_be_edited() {
    let (engine, _) = setup();
    let created = engine
        .create(
            &employee(10, "Rana"),
            ordinary_leave(10, "Rana", "2024-05-01", "2024-05-02"),
        )
        .await
        .unwrap();

    let err = engine
        .update(
            &employee(11, "Omar"),
            created.id,
            RequestPatch {
                description: "hijack".into(),
                detail: created.detail.clone(),
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Unauthorized { .. }));
}

#[tokio::test]
async fn manager_correction_of_accepted_lands_in_edited() {
    let (engine, _) = setup();
    let created = engine
        .create(
            &employee(10, "Rana"),
            ordinary_leave(10, "Rana", "2024-05-01", "2024-05-02"),
        )
        .await
        .unwrap();
    engine.accept(&reviewer(), created.id).await.unwrap();

    let corrected = engine
        .update(
            &reviewer(),
            created.id,
            RequestPatch {
                description: "trip (dates fixed)".into(),
                detail: RequestDetail::OrdinaryLeave {
                    range: DateRange::between(
                        "2024-05-02".parse().unwrap(),
                        "2024-05-03".parse().unwrap(),
                    )
                    .unwrap(),
                },
            },
        )
        .await
        .unwrap();
    assert_eq!(corrected.status, RequestStatus::Edited);
}

#[tokio::test]
async fn edit_cannot_change_the_kind() {
    let (engine, _) = setup();
    let submitter = employee(10, "Rana");
    let created = engine
        .create(&submitter, ordinary_leave(10, "Rana", "2024-05-01", "2024-05-02"))
        .await
        .unwrap();

    let err = engine
        .update(
            &submitter,
            created.id,
            RequestPatch {
                description: "now a mission".into(),
                detail: RequestDetail::Mission {
                    date: "2024-05-01".parse().unwrap(),
                    day_part: DayPart::HalfDay,
                },
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Validation(_)));
}

// --- deletion -------------------------------------------------------------

#[tokio::test]
async fn delete_only_works_on_correctable_states() {
    let (engine, _) = setup();
    let created = engine
        .create(
            &employee(10, "Rana"),
            ordinary_leave(10, "Rana", "2024-05-01", "2024-05-02"),
        )
        .await
        .unwrap();

    // pending requests are not deletable
    let err = engine.delete(&reviewer(), created.id).await.unwrap_err();
    assert_eq!(
        err,
        EngineError::InvalidTransition {
            transition: Transition::Delete,
            from: RequestStatus::Pending,
        }
    );

    engine.accept(&reviewer(), created.id).await.unwrap();
    engine.delete(&reviewer(), created.id).await.unwrap();
    assert_eq!(
        engine.get(created.id).await.unwrap_err(),
        EngineError::NotFound(created.id)
    );
}

// --- conversion -----------------------------------------------------------

#[tokio::test]
async fn conversion_failure_leaves_the_home_visit_untouched() {
    let (engine, store) = setup();
    let owner = employee(55, "Hala");
    let created = engine.create(&owner, home_visit(55, "Hala")).await.unwrap();

    store.fail_next_conversion();
    let err = engine.convert_to_sick(&owner, created.id).await.unwrap_err();
    assert_eq!(err, EngineError::ConversionFailed(created.id));

    let original = engine.get(created.id).await.unwrap();
    assert_eq!(original.status, RequestStatus::Pending);
    assert!(matches!(original.detail, RequestDetail::HomeVisit { .. }));
}

#[tokio::test]
async fn conversion_carries_over_description_and_medical_fields() {
    let (engine, _) = setup();
    let owner = employee(55, "Hala");
    let created = engine.create(&owner, home_visit(55, "Hala")).await.unwrap();

    let sick = engine.convert_to_sick(&owner, created.id).await.unwrap();
    assert_eq!(sick.status, RequestStatus::Pending);
    assert_eq!(sick.description, "doctor visit at home");
    match &sick.detail {
        RequestDetail::SickLeave {
            range,
            permit_approval,
            medical_report,
        } => {
            assert_eq!(range.number_of_days, 1);
            assert_eq!(range.start_date, "2024-06-10".parse().unwrap());
            assert!(*permit_approval);
            assert_eq!(medical_report.as_deref(), Some("reports/2024/ref-881.pdf"));
        }
        other => panic!("wrong detail: {other:?}"),
    }

    // the home visit is gone
    assert_eq!(
        engine.get(created.id).await.unwrap_err(),
        EngineError::NotFound(created.id)
    );
}

#[tokio::test]
async fn only_home_visits_convert() {
    let (engine, _) = setup();
    let owner = employee(55, "Hala");
    let created = engine
        .create(&owner, ordinary_leave(55, "Hala", "2024-05-01", "2024-05-02"))
        .await
        .unwrap();
    let err = engine.convert_to_sick(&owner, created.id).await.unwrap_err();
    assert!(matches!(err, EngineError::InvalidTransition { .. }));
}

#[tokio::test]
async fn conversion_of_someone_elses_visit_requires_reviewer_role() {
    let (engine, _) = setup();
    let created = engine
        .create(&employee(55, "Hala"), home_visit(55, "Hala"))
        .await
        .unwrap();

    let err = engine
        .convert_to_sick(&employee(56, "Omar"), created.id)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        EngineError::Unauthorized {
            axis: AuthzAxis::Role,
            ..
        }
    ));

    // reviewers may convert anyone's
    engine.convert_to_sick(&reviewer(), created.id).await.unwrap();
}

// --- query layer ----------------------------------------------------------

#[tokio::test]
async fn mission_pagination_splits_fifteen_records_over_two_pages() {
    let (engine, _) = setup();
    for i in 0..15u64 {
        engine
            .assign(&reviewer(), mission(100 + i, "2024-09-01"))
            .await
            .unwrap();
    }

    let filter = FilterSignature::for_kind(RequestKind::Mission)
        .page(2)
        .page_size(10);
    let page = engine.list(&filter).await.unwrap();
    assert_eq!(page.data.len(), 5);
    assert_eq!(page.total_records, 15);
    assert_eq!(page.total_pages, 2);

    // past the end: empty data, same totals
    let beyond = engine
        .list(&FilterSignature::for_kind(RequestKind::Mission).page(7).page_size(10))
        .await
        .unwrap();
    assert!(beyond.data.is_empty());
    assert_eq!(beyond.total_records, 15);
    assert_eq!(beyond.total_pages, 2);
}

#[tokio::test]
async fn lists_come_back_newest_first() {
    let (engine, _) = setup();
    let mut ids = Vec::new();
    for i in 0..4u64 {
        let record = engine
            .assign(&reviewer(), mission(200 + i, "2024-09-01"))
            .await
            .unwrap();
        ids.push(record.id);
    }

    let page = engine
        .list(&FilterSignature::for_kind(RequestKind::Mission))
        .await
        .unwrap();
    let listed: Vec<u64> = page.data.iter().map(|r| r.id).collect();
    ids.reverse();
    assert_eq!(listed, ids[..listed.len()].to_vec());
}

#[tokio::test]
async fn accepting_refreshes_cached_list_and_detail_views() {
    let (engine, _) = setup();
    let created = engine
        .create(
            &employee(10, "Rana"),
            ordinary_leave(10, "Rana", "2024-05-01", "2024-05-02"),
        )
        .await
        .unwrap();

    let filter = FilterSignature::for_kind(RequestKind::OrdinaryLeave);
    // prime both caches
    assert_eq!(
        engine.list(&filter).await.unwrap().data[0].status,
        RequestStatus::Pending
    );
    assert_eq!(
        engine.get(created.id).await.unwrap().status,
        RequestStatus::Pending
    );

    engine.accept(&reviewer(), created.id).await.unwrap();

    // no stale reads after the transition confirmed
    assert_eq!(
        engine.list(&filter).await.unwrap().data[0].status,
        RequestStatus::Accepted
    );
    assert_eq!(
        engine.get(created.id).await.unwrap().status,
        RequestStatus::Accepted
    );
}

#[tokio::test]
async fn creating_refreshes_the_submitters_own_list() {
    let (engine, _) = setup();
    let submitter = employee(10, "Rana");
    let own = FilterSignature::own_list(RequestKind::OrdinaryLeave, 10);

    assert!(engine.list(&own).await.unwrap().data.is_empty());

    engine
        .create(&submitter, ordinary_leave(10, "Rana", "2024-05-01", "2024-05-02"))
        .await
        .unwrap();

    assert_eq!(engine.list(&own).await.unwrap().data.len(), 1);
}

// --- events ---------------------------------------------------------------

#[tokio::test]
async fn confirmed_transitions_are_published() {
    let (engine, _) = setup();
    let mut events = engine.subscribe();

    let created = engine
        .create(
            &employee(10, "Rana"),
            ordinary_leave(10, "Rana", "2024-05-01", "2024-05-02"),
        )
        .await
        .unwrap();

    let event = events.recv().await.unwrap();
    assert_eq!(event.transition, Transition::Create);
    assert_eq!(event.kind, RequestKind::OrdinaryLeave);
    assert_eq!(event.request_id, created.id);
    assert_eq!(event.employee_id, 10);
}

#[tokio::test]
async fn failed_transitions_publish_nothing() {
    let (engine, _) = setup();
    let created = engine
        .create(
            &employee(10, "Rana"),
            ordinary_leave(10, "Rana", "2024-05-01", "2024-05-02"),
        )
        .await
        .unwrap();

    let mut events = engine.subscribe();
    let _ = engine.reject(&reviewer(), created.id, "").await.unwrap_err();
    let _ = engine
        .accept(&manager(PermissionSet::empty()), created.id)
        .await
        .unwrap_err();

    assert!(matches!(
        events.try_recv(),
        Err(tokio::sync::broadcast::error::TryRecvError::Empty)
    ));
}
