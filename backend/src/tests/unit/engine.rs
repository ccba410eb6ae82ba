use automation_shared::{Action, ActionType, Condition, ConditionOp, RunStatus, TriggerType};
use serde_json::{json, Value};
use std::time::Duration;
use uuid::Uuid;

use crate::error::AppError;
use crate::tests::fixtures::WorkflowFixture;
use crate::tests::helpers::RecordedCall;
use crate::tests::TestContext;
use crate::workflows::{spawn_consumer, EnginePolicy, RunQuery, TriggerEvent};

fn deal_won_event(org_id: Uuid) -> TriggerEvent {
    TriggerEvent::deal_stage_changed(org_id, "deal_1", "NEGOTIATION", "WON", 5000.0)
}

#[tokio::test]
async fn test_matching_workflow_dispatches_and_records_success() {
    let ctx = TestContext::new();
    let workflow = ctx
        .store
        .create(ctx.org_id, WorkflowFixture::deal_won().validated(ctx.user_id))
        .await
        .unwrap();

    let outcomes = ctx.engine.process_event(&deal_won_event(ctx.org_id)).await.unwrap();

    assert_eq!(outcomes.len(), 1);
    assert_eq!(outcomes[0].workflow_id, workflow.id);
    assert_eq!(outcomes[0].status, RunStatus::Success);

    let calls = ctx.crm.calls();
    assert_eq!(calls.len(), 1);
    match &calls[0] {
        RecordedCall::Notification(n) => {
            assert_eq!(n.title, "Deal won");
            // No ownerId on the event, so the workflow's creator is told
            assert_eq!(n.user_id, ctx.user_id.to_string());
            assert_eq!(n.workflow_id, workflow.id);
        }
        other => panic!("unexpected call {:?}", other),
    }

    let runs = ctx.recorder.list(ctx.org_id, &RunQuery::default()).await.unwrap();
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].status, RunStatus::Success);
    assert_eq!(runs[0].workflow_id, workflow.id);
    assert!(runs[0].error.is_none());
    assert!(runs[0].result.as_deref().unwrap().starts_with("NOTIFY_IN_APP -> notified"));

    let trigger_event: Value = serde_json::from_str(&runs[0].trigger_event).unwrap();
    assert_eq!(trigger_event["triggerType"], "DEAL_STAGE_CHANGED");
    assert!(trigger_event.get("testRun").is_none());
}

#[tokio::test]
async fn test_unmet_conditions_record_skipped_without_dispatch() {
    let ctx = TestContext::new();
    let fixture = WorkflowFixture::new(TriggerType::DealStageChanged)
        .condition(Condition::new("value", ConditionOp::Gte, 10000));
    ctx.store
        .create(ctx.org_id, fixture.validated(ctx.user_id))
        .await
        .unwrap();

    let outcomes = ctx.engine.process_event(&deal_won_event(ctx.org_id)).await.unwrap();

    assert_eq!(outcomes[0].status, RunStatus::Skipped);
    assert!(ctx.crm.calls().is_empty());

    let runs = ctx.recorder.list(ctx.org_id, &RunQuery::default()).await.unwrap();
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].status, RunStatus::Skipped);
    assert_eq!(runs[0].result.as_deref(), Some("conditions not met"));
}

#[tokio::test]
async fn test_skipped_runs_can_be_left_unrecorded() {
    let ctx = TestContext::with_policy(EnginePolicy { record_skipped: false });
    let fixture = WorkflowFixture::new(TriggerType::DealStageChanged)
        .condition(Condition::new("value", ConditionOp::Gte, 10000));
    ctx.store
        .create(ctx.org_id, fixture.validated(ctx.user_id))
        .await
        .unwrap();

    let outcomes = ctx.engine.process_event(&deal_won_event(ctx.org_id)).await.unwrap();

    assert_eq!(outcomes[0].status, RunStatus::Skipped);
    assert!(outcomes[0].run.is_none());
    assert!(ctx.recorder.list(ctx.org_id, &RunQuery::default()).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_disabled_and_foreign_workflows_are_never_candidates() {
    let ctx = TestContext::new();
    ctx.store
        .create(ctx.org_id, WorkflowFixture::deal_won().disabled().validated(ctx.user_id))
        .await
        .unwrap();
    ctx.store
        .create(Uuid::new_v4(), WorkflowFixture::deal_won().validated(ctx.user_id))
        .await
        .unwrap();
    ctx.store
        .create(
            ctx.org_id,
            WorkflowFixture::new(TriggerType::LeadCreated).validated(ctx.user_id),
        )
        .await
        .unwrap();

    let outcomes = ctx.engine.process_event(&deal_won_event(ctx.org_id)).await.unwrap();

    assert!(outcomes.is_empty());
    assert!(ctx.crm.calls().is_empty());
    assert!(ctx.recorder.list(ctx.org_id, &RunQuery::default()).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_failed_action_stops_the_sequence() {
    let ctx = TestContext::new();
    ctx.crm.fail_on(ActionType::UpdateDealStage);
    let fixture = WorkflowFixture::deal_won().actions(vec![
        Action::update_deal_stage("ONBOARDING"),
        Action::notify("Should never be sent", None),
    ]);
    ctx.store
        .create(ctx.org_id, fixture.validated(ctx.user_id))
        .await
        .unwrap();

    let outcomes = ctx.engine.process_event(&deal_won_event(ctx.org_id)).await.unwrap();

    assert_eq!(outcomes[0].status, RunStatus::Failed);
    assert_eq!(ctx.crm.call_types(), vec![ActionType::UpdateDealStage]);

    let run = outcomes[0].run.as_ref().unwrap();
    assert_eq!(run.status, RunStatus::Failed);
    assert!(run.result.is_none());
    assert_eq!(
        run.error.as_deref(),
        Some("action #1 (UPDATE_DEAL_STAGE) failed: collaborator rejected the request (503): UPDATE_DEAL_STAGE is down")
    );
}

#[tokio::test]
async fn test_one_failing_workflow_does_not_affect_others() {
    let ctx = TestContext::new();
    ctx.crm.fail_on(ActionType::CreateTicket);

    let failing = ctx
        .store
        .create(
            ctx.org_id,
            WorkflowFixture::deal_won()
                .actions(vec![Action::create_ticket("Onboard {{dealId}}", "high")])
                .validated(ctx.user_id),
        )
        .await
        .unwrap();
    let succeeding = ctx
        .store
        .create(
            ctx.org_id,
            WorkflowFixture::deal_won()
                .actions(vec![Action::create_activity("Thank-you call for {{dealId}}", "call")])
                .validated(ctx.user_id),
        )
        .await
        .unwrap();

    let outcomes = ctx.engine.process_event(&deal_won_event(ctx.org_id)).await.unwrap();
    assert_eq!(outcomes.len(), 2);

    let status_of = |id: Uuid| outcomes.iter().find(|o| o.workflow_id == id).unwrap().status;
    assert_eq!(status_of(failing.id), RunStatus::Failed);
    assert_eq!(status_of(succeeding.id), RunStatus::Success);

    let activity = ctx
        .crm
        .calls()
        .into_iter()
        .find_map(|call| match call {
            RecordedCall::Activity(a) => Some(a),
            _ => None,
        })
        .unwrap();
    assert_eq!(activity.subject, "Thank-you call for deal_1");
    assert_eq!(activity.entity_type, Some("deal"));
    assert_eq!(activity.entity_id.as_deref(), Some("deal_1"));
}

#[tokio::test]
async fn test_trigger_params_narrow_the_trigger() {
    let ctx = TestContext::new();
    let workflow = ctx
        .store
        .create(
            ctx.org_id,
            WorkflowFixture::new(TriggerType::DealStageChanged)
                .params(json!({"stage": "LOST"}))
                .validated(ctx.user_id),
        )
        .await
        .unwrap();

    let outcomes = ctx.engine.process_event(&deal_won_event(ctx.org_id)).await.unwrap();
    assert_eq!(outcomes[0].status, RunStatus::Skipped);
    assert_eq!(
        outcomes[0].run.as_ref().unwrap().result.as_deref(),
        Some("trigger params not met")
    );

    // A test run ignores the params
    let outcome = ctx.engine.test_run(ctx.org_id, workflow.id, None).await.unwrap();
    assert!(outcome.ok);
}

#[tokio::test]
async fn test_test_run_scenario() {
    let ctx = TestContext::new();
    let lost = ctx
        .store
        .create(
            ctx.org_id,
            WorkflowFixture::new(TriggerType::DealStageChanged)
                .condition(Condition::new("stage", ConditionOp::Eq, "LOST"))
                .validated(ctx.user_id),
        )
        .await
        .unwrap();
    let other = ctx
        .store
        .create(ctx.org_id, WorkflowFixture::new(TriggerType::DealStageChanged).validated(ctx.user_id))
        .await
        .unwrap();

    let outcome = ctx
        .engine
        .test_run(ctx.org_id, lost.id, Some(json!({"stage": "LOST"})))
        .await
        .unwrap();

    assert!(outcome.ok);
    assert_eq!(outcome.status, RunStatus::Success);

    let runs = ctx.recorder.list(ctx.org_id, &RunQuery::default()).await.unwrap();
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].workflow_id, lost.id);
    assert_ne!(runs[0].workflow_id, other.id);

    let trigger_event: Value = serde_json::from_str(&runs[0].trigger_event).unwrap();
    assert_eq!(trigger_event["testRun"], true);
}

#[tokio::test]
async fn test_test_run_records_skips_and_ignores_enabled_flag() {
    let ctx = TestContext::with_policy(EnginePolicy { record_skipped: false });
    let workflow = ctx
        .store
        .create(ctx.org_id, WorkflowFixture::deal_won().disabled().validated(ctx.user_id))
        .await
        .unwrap();

    let outcome = ctx
        .engine
        .test_run(ctx.org_id, workflow.id, Some(json!({"stage": "OPEN"})))
        .await
        .unwrap();
    assert!(!outcome.ok);
    assert_eq!(outcome.status, RunStatus::Skipped);
    assert!(outcome.run.is_some());

    let outcome = ctx
        .engine
        .test_run(ctx.org_id, workflow.id, Some(json!({"stage": "WON"})))
        .await
        .unwrap();
    assert!(outcome.ok);
    assert_eq!(ctx.crm.call_types(), vec![ActionType::NotifyInApp]);
}

#[tokio::test]
async fn test_test_run_unknown_or_foreign_workflow() {
    let ctx = TestContext::new();
    let workflow = ctx
        .store
        .create(ctx.org_id, WorkflowFixture::deal_won().validated(ctx.user_id))
        .await
        .unwrap();

    let missing = ctx.engine.test_run(ctx.org_id, Uuid::new_v4(), None).await;
    assert!(matches!(missing, Err(AppError::NotFound(_))));

    let foreign = ctx.engine.test_run(Uuid::new_v4(), workflow.id, None).await;
    assert!(matches!(foreign, Err(AppError::NotFound(_))));
}

#[tokio::test]
async fn test_create_then_get_preserves_structure() {
    let ctx = TestContext::new();
    let fixture = WorkflowFixture::new(TriggerType::TicketCreated)
        .params(json!({"channel": "email"}))
        .condition(Condition::new("priority", ConditionOp::Eq, "urgent"))
        .condition(Condition::new("subject", ConditionOp::Contains, "outage"))
        .actions(vec![
            Action::create_ticket("Escalate {{subject}}", "urgent"),
            Action::assign_owner("user_7"),
            Action::notify("Escalated", Some("{{subject}}")),
        ]);

    let created = ctx
        .store
        .create(ctx.org_id, fixture.validated(ctx.user_id))
        .await
        .unwrap();
    let fetched = ctx.store.get(ctx.org_id, created.id).await.unwrap();

    assert_eq!(fetched.trigger, fixture.trigger);
    assert_eq!(fetched.conditions, fixture.conditions);
    assert_eq!(fetched.actions, fixture.actions);
    assert_eq!(fetched, created);
}

#[tokio::test]
async fn test_event_bus_feeds_the_engine() {
    let ctx = TestContext::new();
    ctx.store
        .create(ctx.org_id, WorkflowFixture::deal_won().validated(ctx.user_id))
        .await
        .unwrap();

    let consumer = spawn_consumer(ctx.engine.clone(), ctx.events, 4);
    ctx.state.event_bus.publish(deal_won_event(ctx.org_id)).unwrap();

    let mut runs = Vec::new();
    for _ in 0..100 {
        runs = ctx.recorder.list(ctx.org_id, &RunQuery::default()).await.unwrap();
        if !runs.is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].status, RunStatus::Success);
    consumer.abort();
}

#[tokio::test]
async fn test_consumer_finishes_in_flight_events_after_bus_closes() {
    let ctx = TestContext::new();
    ctx.store
        .create(ctx.org_id, WorkflowFixture::deal_won().validated(ctx.user_id))
        .await
        .unwrap();
    ctx.crm.slow_down(Duration::from_millis(200));

    let TestContext {
        org_id,
        recorder,
        engine,
        state,
        events,
        ..
    } = ctx;
    let consumer = spawn_consumer(engine, events, 2);
    for _ in 0..3 {
        state.event_bus.publish(deal_won_event(org_id)).unwrap();
    }

    // Dropping the state closes the bus; the consumer must still finish all three
    drop(state);
    consumer.await.unwrap();

    let runs = recorder.list(org_id, &RunQuery::default()).await.unwrap();
    assert_eq!(runs.len(), 3);
    assert!(runs.iter().all(|run| run.status == RunStatus::Success));
}

#[tokio::test]
async fn test_consumer_limits_concurrent_evaluations() {
    let ctx = TestContext::new();
    ctx.store
        .create(ctx.org_id, WorkflowFixture::deal_won().validated(ctx.user_id))
        .await
        .unwrap();
    ctx.crm.slow_down(Duration::from_millis(50));

    let TestContext {
        org_id,
        crm,
        engine,
        state,
        events,
        ..
    } = ctx;
    let consumer = spawn_consumer(engine, events, 1);
    let started = std::time::Instant::now();
    for _ in 0..3 {
        state.event_bus.publish(deal_won_event(org_id)).unwrap();
    }
    drop(state);
    consumer.await.unwrap();

    // One at a time: three 50ms calls cannot overlap
    assert!(started.elapsed() >= Duration::from_millis(150));
    assert_eq!(crm.calls().len(), 3);
}
