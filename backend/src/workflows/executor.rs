// Workflow Executor - runs a matched workflow's actions in order

use automation_shared::{Action, RunStatus, Workflow};
use regex::Regex;
use serde::Serialize;
use serde_json::Value;
use std::future::Future;
use std::sync::LazyLock;
use std::time::Duration;
use tracing::{info, warn};
use uuid::Uuid;

use super::actions::{Collaborators, NewActivity, NewNotification, NewTicket};
use super::triggers::{lookup, EntityKind, TriggerEvent};
use crate::error::ActionError;

static TEMPLATE_VAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{\s*([^}]+?)\s*\}\}").expect("template pattern is valid"));

/// What an action list is executed against
#[derive(Debug, Clone, Copy)]
pub struct DispatchContext<'a> {
    pub org_id: Uuid,
    pub event: &'a TriggerEvent,
    pub workflow: &'a Workflow,
}

/// Result of dispatching one workflow's actions
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DispatchOutcome {
    pub status: RunStatus,
    pub result: Option<String>,
    pub error: Option<String>,
}

pub struct ActionDispatcher {
    collaborators: Collaborators,
    action_timeout: Duration,
}

impl ActionDispatcher {
    pub fn new(collaborators: Collaborators, action_timeout: Duration) -> Self {
        Self {
            collaborators,
            action_timeout,
        }
    }

    /// Execute actions strictly in order, stopping at the first collaborator error.
    /// Actions that already ran are not undone.
    pub async fn execute(&self, actions: &[Action], ctx: &DispatchContext<'_>) -> DispatchOutcome {
        let mut executed = Vec::with_capacity(actions.len());

        for (index, action) in actions.iter().enumerate() {
            let action = interpolate(action, ctx.event);
            let action_type = action.action_type();

            match self.execute_action(&action, ctx).await {
                Ok(summary) => {
                    info!(
                        "Workflow {} action #{} ({}) completed: {}",
                        ctx.workflow.id,
                        index + 1,
                        action_type,
                        summary
                    );
                    executed.push(format!("{} -> {}", action_type, summary));
                }
                Err(e) => {
                    warn!(
                        "Workflow {} action #{} ({}) failed: {}",
                        ctx.workflow.id,
                        index + 1,
                        action_type,
                        e
                    );
                    return DispatchOutcome {
                        status: RunStatus::Failed,
                        result: summarize(&executed),
                        error: Some(format!("action #{} ({}) failed: {}", index + 1, action_type, e)),
                    };
                }
            }
        }

        DispatchOutcome {
            status: RunStatus::Success,
            result: summarize(&executed),
            error: None,
        }
    }

    async fn execute_action(&self, action: &Action, ctx: &DispatchContext<'_>) -> Result<String, ActionError> {
        let org_id = ctx.org_id;
        let workflow_id = ctx.workflow.id;

        match action {
            Action::CreateActivity(payload) => {
                let entity = ctx.event.entity();
                let activity = NewActivity {
                    subject: payload.subject.clone(),
                    activity_type: payload.activity_type.clone(),
                    due_date: payload.due_date.clone(),
                    entity_type: entity.as_ref().map(|e| e.kind.as_str()),
                    entity_id: entity.map(|e| e.id),
                    workflow_id,
                };
                self.timebox(self.collaborators.activities.create_activity(org_id, activity))
                    .await
            }
            Action::AssignOwner(payload) => {
                let entity = ctx
                    .event
                    .entity()
                    .filter(|e| matches!(e.kind, EntityKind::Company | EntityKind::Contact | EntityKind::Deal))
                    .ok_or(ActionError::MissingEntity("a company, contact or deal"))?;
                self.timebox(
                    self.collaborators
                        .owners
                        .assign_owner(org_id, entity, payload.owner_id.clone()),
                )
                .await
            }
            Action::CreateTicket(payload) => {
                let ticket = NewTicket {
                    title: payload.title.clone(),
                    description: payload.description.clone(),
                    priority: payload.priority.clone(),
                    company_id: ctx.event.field("companyId").and_then(id_text),
                    workflow_id,
                };
                self.timebox(self.collaborators.tickets.create_ticket(org_id, ticket))
                    .await
            }
            Action::NotifyInApp(payload) => {
                let user_id = payload
                    .user_id
                    .clone()
                    .filter(|id| !id.is_empty())
                    .or_else(|| ctx.event.field("ownerId").and_then(id_text))
                    .unwrap_or_else(|| ctx.workflow.created_by.to_string());
                let notification = NewNotification {
                    user_id,
                    title: payload.title.clone(),
                    message: payload.message.clone(),
                    workflow_id,
                };
                self.timebox(self.collaborators.notifications.notify(org_id, notification))
                    .await
            }
            Action::UpdateDealStage(payload) => {
                let deal_id = ctx.event.deal_id().ok_or(ActionError::MissingEntity("a deal"))?;
                self.timebox(
                    self.collaborators
                        .deals
                        .update_stage(org_id, deal_id, payload.stage.clone()),
                )
                .await
            }
        }
    }

    async fn timebox<F>(&self, call: F) -> Result<String, ActionError>
    where
        F: Future<Output = Result<String, ActionError>>,
    {
        tokio::time::timeout(self.action_timeout, call)
            .await
            .map_err(|_| ActionError::Timeout(self.action_timeout))?
    }
}

fn summarize(executed: &[String]) -> Option<String> {
    if executed.is_empty() {
        None
    } else {
        Some(executed.join("; "))
    }
}

fn id_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Replace `{{dotted.path}}` placeholders in every payload string with event values
pub fn interpolate(action: &Action, event: &TriggerEvent) -> Action {
    serde_json::to_value(action)
        .map(|value| process_templates(value, &event.payload))
        .and_then(serde_json::from_value)
        .unwrap_or_else(|_| action.clone())
}

fn process_templates(value: Value, payload: &Value) -> Value {
    match value {
        Value::String(s) => Value::String(replace_template_vars(&s, payload)),
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(k, v)| (k, process_templates(v, payload)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(
            items
                .into_iter()
                .map(|v| process_templates(v, payload))
                .collect(),
        ),
        other => other,
    }
}

fn replace_template_vars(template: &str, payload: &Value) -> String {
    TEMPLATE_VAR
        .replace_all(template, |caps: &regex::Captures| match lookup(payload, &caps[1]) {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Null) => String::new(),
            Some(other) => other.to_string(),
            None => caps[0].to_string(),
        })
        .into_owned()
}
