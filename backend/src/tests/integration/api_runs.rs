use automation_shared::{RunStatus, TriggerType};
use axum::http::{Method, StatusCode};
use serde_json::json;
use tower::ServiceExt;

use crate::tests::fixtures::WorkflowFixture;
use crate::tests::helpers::{json_request, raw_json_request, read_json};
use crate::tests::TestContext;
use crate::workflows::TriggerEvent;

#[tokio::test]
async fn test_test_run_endpoint() {
    let ctx = TestContext::new();
    let workflow = ctx
        .store
        .create(ctx.org_id, WorkflowFixture::deal_won().validated(ctx.user_id))
        .await
        .unwrap();
    let uri = format!("/automation/test-run/{}", workflow.id);

    let response = ctx
        .app()
        .oneshot(json_request(
            Method::POST,
            &uri,
            &ctx.editor_headers(),
            Some(json!({"payload": {"stage": "WON"}})),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    assert_eq!(body["ok"], true);
    assert_eq!(body["status"], "SUCCESS");

    // No body at all still runs, with an empty payload
    let response = ctx
        .app()
        .oneshot(json_request(Method::POST, &uri, &ctx.editor_headers(), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    assert_eq!(body["ok"], false);
    assert_eq!(body["status"], "SKIPPED");

    // A body that is sent but does not decode is refused, not treated as empty
    let response = ctx
        .app()
        .oneshot(raw_json_request(Method::POST, &uri, &ctx.editor_headers(), "{\"payload\": {"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(read_json(response).await["code"], "VALIDATION_ERROR");

    let response = ctx
        .app()
        .oneshot(json_request(Method::POST, &uri, &ctx.editor_headers(), Some(json!({"payload": 5}))))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let missing = format!("/automation/test-run/{}", uuid::Uuid::new_v4());
    let response = ctx
        .app()
        .oneshot(json_request(Method::POST, &missing, &ctx.editor_headers(), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_runs_endpoint_lists_newest_first_with_filters() {
    let ctx = TestContext::new();
    let won = ctx
        .store
        .create(ctx.org_id, WorkflowFixture::deal_won().validated(ctx.user_id))
        .await
        .unwrap();
    let other = ctx
        .store
        .create(
            ctx.org_id,
            WorkflowFixture::new(TriggerType::DealStageChanged).validated(ctx.user_id),
        )
        .await
        .unwrap();

    let lost = TriggerEvent::deal_stage_changed(ctx.org_id, "deal_1", "OPEN", "LOST", 10.0);
    ctx.engine.process_event(&lost).await.unwrap();
    let won_event = TriggerEvent::deal_stage_changed(ctx.org_id, "deal_1", "LOST", "WON", 10.0);
    ctx.engine.process_event(&won_event).await.unwrap();

    let response = ctx
        .app()
        .oneshot(json_request(Method::GET, "/automation/runs", &ctx.editor_headers(), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    let items = body["items"].as_array().unwrap();
    assert_eq!(items.len(), 4);
    for item in items {
        let trigger_event: serde_json::Value =
            serde_json::from_str(item["triggerEvent"].as_str().unwrap()).unwrap();
        assert_eq!(trigger_event["triggerType"], "DEAL_STAGE_CHANGED");
        assert!(item["executedAt"].is_string());
    }

    let uri = format!("/automation/runs?workflowId={}&status=SKIPPED", won.id);
    let response = ctx
        .app()
        .oneshot(json_request(Method::GET, &uri, &ctx.editor_headers(), None))
        .await
        .unwrap();
    let body = read_json(response).await;
    let items = body["items"].as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["status"], RunStatus::Skipped.as_str());

    let uri = format!("/automation/runs?workflowId={}&limit=1", other.id);
    let response = ctx
        .app()
        .oneshot(json_request(Method::GET, &uri, &ctx.editor_headers(), None))
        .await
        .unwrap();
    let body = read_json(response).await;
    assert_eq!(body["items"].as_array().unwrap().len(), 1);
}
