use automation_shared::{ActionType, RunStatus};
use chrono::NaiveDate;

use crate::tests::helpers::RecordedCall;
use crate::tests::TestContext;
use crate::workflows::templates::install;
use crate::workflows::TriggerEvent;

#[tokio::test]
async fn test_health_score_template_opens_ticket() {
    let ctx = TestContext::new();
    install(ctx.store.as_ref(), ctx.org_id, "health-score-drop-alert", ctx.user_id)
        .await
        .unwrap();

    let healthy = TriggerEvent::health_score_dropped(ctx.org_id, "co_1", 90, 75);
    let outcomes = ctx.engine.process_event(&healthy).await.unwrap();
    assert_eq!(outcomes[0].status, RunStatus::Skipped);
    assert!(ctx.crm.calls().is_empty());

    let at_risk = TriggerEvent::health_score_dropped(ctx.org_id, "co_1", 75, 42);
    let outcomes = ctx.engine.process_event(&at_risk).await.unwrap();
    assert_eq!(outcomes[0].status, RunStatus::Success);
    assert_eq!(
        ctx.crm.call_types(),
        vec![ActionType::CreateTicket, ActionType::NotifyInApp]
    );

    match &ctx.crm.calls()[0] {
        RecordedCall::Ticket(ticket) => {
            assert_eq!(ticket.title, "Health score dropped to 42");
            assert_eq!(ticket.priority.as_deref(), Some("high"));
            assert_eq!(ticket.company_id.as_deref(), Some("co_1"));
        }
        other => panic!("unexpected call {:?}", other),
    }
}

#[tokio::test]
async fn test_renewal_template_schedules_activity() {
    let ctx = TestContext::new();
    install(ctx.store.as_ref(), ctx.org_id, "renewal-reminder", ctx.user_id)
        .await
        .unwrap();

    let renewal_date = NaiveDate::from_ymd_opt(2026, 12, 1).unwrap();
    let event = TriggerEvent::renewal_due_soon(ctx.org_id, "co_2", renewal_date, 21);
    let outcomes = ctx.engine.process_event(&event).await.unwrap();
    assert_eq!(outcomes[0].status, RunStatus::Success);

    match &ctx.crm.calls()[0] {
        RecordedCall::Activity(activity) => {
            assert_eq!(activity.subject, "Prepare renewal for 2026-12-01");
            assert_eq!(activity.entity_type, Some("company"));
        }
        other => panic!("unexpected call {:?}", other),
    }
}

#[tokio::test]
async fn test_urgent_ticket_template_ignores_normal_tickets() {
    let ctx = TestContext::new();
    install(ctx.store.as_ref(), ctx.org_id, "urgent-ticket-escalation", ctx.user_id)
        .await
        .unwrap();

    let normal = TriggerEvent::ticket_created(ctx.org_id, "t_1", "Password reset", "normal", None);
    ctx.engine.process_event(&normal).await.unwrap();
    assert!(ctx.crm.calls().is_empty());

    let urgent = TriggerEvent::ticket_created(ctx.org_id, "t_2", "Site down", "urgent", Some("co_3"));
    ctx.engine.process_event(&urgent).await.unwrap();
    match &ctx.crm.calls()[0] {
        RecordedCall::Notification(n) => assert_eq!(n.message.as_deref(), Some("Site down")),
        other => panic!("unexpected call {:?}", other),
    }
}
