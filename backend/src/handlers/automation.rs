//! Automation API
//!
//! Workflow CRUD, the template library, run history, test runs and the
//! event ingress. Every route is scoped to the caller's org.

use axum::{
    body::Bytes,
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use automation_shared::{TriggerType, Workflow, WorkflowDraft, WorkflowRun, WorkflowTemplate};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::auth::{AuthUser, AUTOMATION_READ, AUTOMATION_WRITE};
use crate::error::{invalid_body, ApiError, ApiResult, AppError};
use crate::workflows::event_bus::PublishError;
use crate::workflows::templates;
use crate::workflows::validation::{validate_new, validate_patch};
use crate::workflows::{EventSource, RunQuery, TriggerEvent};
use crate::AppState;

pub fn automation_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/workflows", get(list_workflows).post(create_workflow))
        .route("/workflows/library", get(list_templates))
        .route("/workflows/library/:template_id/install", post(install_template))
        .route(
            "/workflows/:id",
            get(get_workflow).patch(update_workflow).delete(delete_workflow),
        )
        .route("/workflows/:id/toggle", post(toggle_workflow))
        .route("/runs", get(list_runs))
        .route("/test-run/:workflow_id", post(test_run))
        .route("/events", post(publish_event))
}

// ==================== Response Bodies ====================

#[derive(Debug, Serialize)]
pub struct ItemsResponse<T> {
    pub items: Vec<T>,
}

#[derive(Debug, Serialize)]
pub struct WorkflowResponse {
    pub workflow: Workflow,
}

#[derive(Debug, Serialize)]
pub struct OkResponse {
    pub ok: bool,
}

#[derive(Debug, Serialize)]
pub struct TestRunResponse {
    pub ok: bool,
    pub status: automation_shared::RunStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run: Option<WorkflowRun>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventAccepted {
    pub accepted: bool,
    pub event_id: Uuid,
}

// ==================== Request Bodies ====================

#[derive(Debug, Default, Deserialize)]
pub struct TestRunRequest {
    #[serde(default)]
    pub payload: Option<Value>,
}

#[derive(Debug, Deserialize)]
pub struct PublishEventRequest {
    #[serde(rename = "type")]
    pub trigger_type: Option<String>,
    #[serde(default)]
    pub payload: Option<Value>,
}

// ==================== Workflows ====================

async fn list_workflows(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
) -> ApiResult<Json<ItemsResponse<Workflow>>> {
    auth.require_permission(AUTOMATION_READ)?;
    let items = state.store.list(auth.org_id).await?;
    Ok(Json(ItemsResponse { items }))
}

async fn get_workflow(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<WorkflowResponse>> {
    auth.require_permission(AUTOMATION_READ)?;
    let workflow = state.store.get(auth.org_id, id).await?;
    Ok(Json(WorkflowResponse { workflow }))
}

async fn create_workflow(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    body: Result<Json<WorkflowDraft>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<WorkflowResponse>)> {
    auth.require_permission(AUTOMATION_WRITE)?;
    let Json(draft) = body?;
    let validated = validate_new(draft, auth.user_id)?;
    let workflow = state.store.create(auth.org_id, validated).await?;

    info!("Workflow '{}' ({}) created in org {}", workflow.name, workflow.id, auth.org_id);
    Ok((StatusCode::CREATED, Json(WorkflowResponse { workflow })))
}

async fn update_workflow(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    body: Result<Json<WorkflowDraft>, JsonRejection>,
) -> ApiResult<Json<WorkflowResponse>> {
    auth.require_permission(AUTOMATION_WRITE)?;
    let Json(draft) = body?;
    let patch = validate_patch(draft)?;
    let workflow = state.store.update(auth.org_id, id, patch).await?;
    Ok(Json(WorkflowResponse { workflow }))
}

async fn toggle_workflow(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<WorkflowResponse>> {
    auth.require_permission(AUTOMATION_WRITE)?;
    let workflow = state.store.toggle(auth.org_id, id).await?;

    info!(
        "Workflow {} {}",
        workflow.id,
        if workflow.enabled { "enabled" } else { "disabled" }
    );
    Ok(Json(WorkflowResponse { workflow }))
}

async fn delete_workflow(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<OkResponse>> {
    auth.require_permission(AUTOMATION_WRITE)?;
    state.store.delete(auth.org_id, id).await?;
    Ok(Json(OkResponse { ok: true }))
}

// ==================== Template Library ====================

async fn list_templates(auth: AuthUser) -> ApiResult<Json<ItemsResponse<WorkflowTemplate>>> {
    auth.require_permission(AUTOMATION_READ)?;
    Ok(Json(ItemsResponse {
        items: templates::library(),
    }))
}

async fn install_template(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(template_id): Path<String>,
) -> ApiResult<(StatusCode, Json<WorkflowResponse>)> {
    auth.require_permission(AUTOMATION_WRITE)?;
    let workflow = templates::install(state.store.as_ref(), auth.org_id, &template_id, auth.user_id).await?;

    info!("Template '{}' installed as workflow {} in org {}", template_id, workflow.id, auth.org_id);
    Ok((StatusCode::CREATED, Json(WorkflowResponse { workflow })))
}

// ==================== Runs ====================

async fn list_runs(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Query(query): Query<RunQuery>,
) -> ApiResult<Json<ItemsResponse<WorkflowRun>>> {
    auth.require_permission(AUTOMATION_READ)?;
    let items = state.recorder.list(auth.org_id, &query).await?;
    Ok(Json(ItemsResponse { items }))
}

async fn test_run(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(workflow_id): Path<Uuid>,
    body: Bytes,
) -> ApiResult<Json<TestRunResponse>> {
    auth.require_permission(AUTOMATION_WRITE)?;
    // The body is optional; when one is sent it has to decode
    let request: TestRunRequest = if body.iter().all(u8::is_ascii_whitespace) {
        TestRunRequest::default()
    } else {
        serde_json::from_slice(&body).map_err(invalid_body)?
    };
    let payload = request.payload;
    let outcome = state.engine.test_run(auth.org_id, workflow_id, payload).await?;

    Ok(Json(TestRunResponse {
        ok: outcome.ok,
        status: outcome.status,
        run: outcome.run,
    }))
}

// ==================== Event Ingress ====================

async fn publish_event(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    body: Result<Json<PublishEventRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<EventAccepted>)> {
    auth.require_permission(AUTOMATION_WRITE)?;
    let Json(request) = body?;

    let trigger_type = match request.trigger_type.as_deref() {
        Some(raw) => raw
            .parse::<TriggerType>()
            .map_err(|e| ApiError::validation_single("type", e.to_string()))?,
        None => return Err(ApiError::validation_single("type", "type is required")),
    };
    let payload = match request.payload {
        None | Some(Value::Null) => Value::Object(Default::default()),
        Some(payload @ Value::Object(_)) => payload,
        Some(_) => return Err(ApiError::validation_single("payload", "payload must be an object")),
    };

    let event = TriggerEvent::new(trigger_type, auth.org_id, payload, EventSource::User(auth.user_id));
    let event_id = state.event_bus.publish(event).map_err(|e| match e {
        PublishError::Full => AppError::ServiceUnavailable("Event queue is full, retry later".to_string()),
        PublishError::Closed => AppError::ServiceUnavailable("Event processing is shutting down".to_string()),
    })?;

    Ok((
        StatusCode::ACCEPTED,
        Json(EventAccepted {
            accepted: true,
            event_id,
        }),
    ))
}
