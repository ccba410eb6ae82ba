use automation_shared::TriggerType;
use axum::http::{Method, StatusCode};
use serde_json::json;
use tower::ServiceExt;

use crate::tests::helpers::{create_viewer_headers, json_request, read_json};
use crate::tests::TestContext;
use crate::workflows::EventSource;

#[tokio::test]
async fn test_published_event_reaches_the_bus() {
    let mut ctx = TestContext::new();
    let response = ctx
        .app()
        .oneshot(json_request(
            Method::POST,
            "/automation/events",
            &ctx.editor_headers(),
            Some(json!({"type": "LEAD_CREATED", "payload": {"leadId": "lead_1", "source": "webinar"}})),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let body = read_json(response).await;
    assert_eq!(body["accepted"], true);

    let event = ctx.events.recv().await.unwrap();
    assert_eq!(event.event_id.to_string(), body["eventId"].as_str().unwrap());
    assert_eq!(event.trigger_type, TriggerType::LeadCreated);
    assert_eq!(event.org_id, ctx.org_id);
    assert_eq!(event.source, EventSource::User(ctx.user_id));
    assert_eq!(event.payload["source"], "webinar");
}

#[tokio::test]
async fn test_event_validation_and_permissions() {
    let ctx = TestContext::new();

    let response = ctx
        .app()
        .oneshot(json_request(
            Method::POST,
            "/automation/events",
            &ctx.editor_headers(),
            Some(json!({"type": "DEAL_WON"})),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(read_json(response).await["details"].get("type").is_some());

    let response = ctx
        .app()
        .oneshot(json_request(
            Method::POST,
            "/automation/events",
            &ctx.editor_headers(),
            Some(json!({"type": "LEAD_CREATED", "payload": [1, 2]})),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = ctx
        .app()
        .oneshot(json_request(
            Method::POST,
            "/automation/events",
            &ctx.editor_headers(),
            Some(json!({"type": 5})),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = read_json(response).await;
    assert_eq!(body["code"], "VALIDATION_ERROR");
    assert!(body["details"].get("body").is_some());

    let response = ctx
        .app()
        .oneshot(json_request(
            Method::POST,
            "/automation/events",
            &create_viewer_headers(ctx.user_id, ctx.org_id),
            Some(json!({"type": "LEAD_CREATED"})),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}
