// Postgres-backed store and recorder; run with
// `TEST_DATABASE_URL=postgres://... cargo test -- --ignored`

use automation_shared::{Action, Condition, ConditionOp, RunStatus, TriggerType, WorkflowDraft};
use serde_json::json;
use serial_test::serial;
use uuid::Uuid;

use crate::error::AppError;
use crate::tests::fixtures::WorkflowFixture;
use crate::tests::{cleanup, test_pool};
use crate::workflows::validation::validate_patch;
use crate::workflows::{PgRunRecorder, PgWorkflowStore, RunQuery, RunRecorder, WorkflowStore};

#[tokio::test]
#[serial]
#[ignore = "requires TEST_DATABASE_URL"]
async fn test_pg_workflow_roundtrip_and_scoping() {
    let Some(pool) = test_pool().await else { return };
    cleanup(&pool).await;
    let store = PgWorkflowStore::new(pool.clone());
    let org = Uuid::new_v4();
    let user = Uuid::new_v4();

    let fixture = WorkflowFixture::new(TriggerType::DealStageChanged)
        .params(json!({"pipeline": "enterprise"}))
        .condition(Condition::new("stage", ConditionOp::Eq, "WON"))
        .condition(Condition::new("value", ConditionOp::Gte, 1000))
        .actions(vec![
            Action::create_activity("Kickoff", "meeting"),
            Action::notify("Won", Some("{{value}}")),
        ]);

    let created = store.create(org, fixture.validated(user)).await.unwrap();
    let fetched = store.get(org, created.id).await.unwrap();
    assert_eq!(fetched.trigger, fixture.trigger);
    assert_eq!(fetched.conditions, fixture.conditions);
    assert_eq!(fetched.actions, fixture.actions);
    assert_eq!(fetched.created_by, user);

    assert!(matches!(store.get(Uuid::new_v4(), created.id).await, Err(AppError::NotFound(_))));
    assert_eq!(store.list(org).await.unwrap().len(), 1);

    cleanup(&pool).await;
}

#[tokio::test]
#[serial]
#[ignore = "requires TEST_DATABASE_URL"]
async fn test_pg_update_toggle_delete() {
    let Some(pool) = test_pool().await else { return };
    cleanup(&pool).await;
    let store = PgWorkflowStore::new(pool.clone());
    let org = Uuid::new_v4();

    let created = store
        .create(org, WorkflowFixture::deal_won().validated(Uuid::new_v4()))
        .await
        .unwrap();

    let patch: WorkflowDraft = serde_json::from_value(json!({
        "name": "Renamed",
        "description": "Now with a description",
        "trigger": {"type": "TICKET_CREATED"}
    }))
    .unwrap();
    let updated = store
        .update(org, created.id, validate_patch(patch).unwrap())
        .await
        .unwrap();
    assert_eq!(updated.name, "Renamed");
    assert_eq!(updated.description.as_deref(), Some("Now with a description"));
    assert_eq!(updated.trigger.trigger_type, TriggerType::TicketCreated);
    assert_eq!(updated.conditions, created.conditions);
    assert!(updated.updated_at.is_some());

    let toggled = store.toggle(org, created.id).await.unwrap();
    assert!(!toggled.enabled);
    assert!(store
        .find_by_trigger(org, TriggerType::TicketCreated)
        .await
        .unwrap()
        .is_empty());
    assert!(store.toggle(org, created.id).await.unwrap().enabled);
    assert_eq!(store.find_by_trigger(org, TriggerType::TicketCreated).await.unwrap().len(), 1);

    store.delete(org, created.id).await.unwrap();
    assert!(matches!(store.delete(org, created.id).await, Err(AppError::NotFound(_))));

    cleanup(&pool).await;
}

#[tokio::test]
#[serial]
#[ignore = "requires TEST_DATABASE_URL"]
async fn test_pg_runs_filters_and_order() {
    let Some(pool) = test_pool().await else { return };
    cleanup(&pool).await;
    let recorder = PgRunRecorder::new(pool.clone());
    let org = Uuid::new_v4();
    let workflow = Uuid::new_v4();

    let first = recorder
        .record(org, workflow, RunStatus::Success, "{}".to_string(), Some("ok".to_string()), None)
        .await
        .unwrap();
    let second = recorder
        .record(org, workflow, RunStatus::Failed, "{}".to_string(), None, Some("boom".to_string()))
        .await
        .unwrap();
    recorder
        .record(Uuid::new_v4(), workflow, RunStatus::Success, "{}".to_string(), None, None)
        .await
        .unwrap();

    let all = recorder.list(org, &RunQuery::default()).await.unwrap();
    assert_eq!(all.iter().map(|r| r.id).collect::<Vec<_>>(), vec![second.id, first.id]);

    let failed = RunQuery {
        status: Some(RunStatus::Failed),
        ..Default::default()
    };
    let runs = recorder.list(org, &failed).await.unwrap();
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].error.as_deref(), Some("boom"));

    cleanup(&pool).await;
}
