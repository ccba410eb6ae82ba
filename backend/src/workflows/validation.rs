// Workflow Validation - turns an untyped draft into typed, validated values

use automation_shared::{
    Action, ActionDraft, ActionType, Condition, ConditionDraft, ConditionOp, ConditionValue, Trigger,
    TriggerDraft, TriggerType, Workflow, WorkflowDraft,
};
use chrono::Utc;
use uuid::Uuid;

use crate::error::ApiError;
use crate::validation::{Validated, ValidationResult, Validator};

pub const NAME_MAX_LENGTH: usize = 200;

/// A complete workflow definition ready to be stored
#[derive(Debug, Clone, PartialEq)]
pub struct NewWorkflow {
    pub name: String,
    pub description: Option<String>,
    pub enabled: bool,
    pub trigger: Trigger,
    pub conditions: Vec<Condition>,
    pub actions: Vec<Action>,
    pub created_by: Uuid,
}

impl NewWorkflow {
    pub fn into_workflow(self, org_id: Uuid) -> Workflow {
        Workflow {
            id: Uuid::new_v4(),
            org_id,
            name: self.name,
            description: self.description,
            enabled: self.enabled,
            trigger: self.trigger,
            conditions: self.conditions,
            actions: self.actions,
            created_by: self.created_by,
            created_at: Utc::now(),
            updated_at: None,
        }
    }
}

/// Fields to replace on an existing workflow; `None` leaves a field unchanged
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WorkflowPatch {
    pub name: Option<String>,
    /// `Some(None)` clears the description
    pub description: Option<Option<String>>,
    pub enabled: Option<bool>,
    pub trigger: Option<Trigger>,
    pub conditions: Option<Vec<Condition>>,
    pub actions: Option<Vec<Action>>,
}

impl WorkflowPatch {
    pub fn apply(self, workflow: &mut Workflow) {
        if let Some(name) = self.name {
            workflow.name = name;
        }
        if let Some(description) = self.description {
            workflow.description = description;
        }
        if let Some(enabled) = self.enabled {
            workflow.enabled = enabled;
        }
        if let Some(trigger) = self.trigger {
            workflow.trigger = trigger;
        }
        if let Some(conditions) = self.conditions {
            workflow.conditions = conditions;
        }
        if let Some(actions) = self.actions {
            workflow.actions = actions;
        }
        workflow.updated_at = Some(Utc::now());
    }
}

pub fn validate_new(draft: WorkflowDraft, created_by: Uuid) -> ValidationResult<Validated<NewWorkflow>> {
    let mut v = Validator::new()
        .required_string(&draft.name, "name")
        .max_length(&draft.name, "name", NAME_MAX_LENGTH)
        .error_if(draft.trigger.is_none(), "trigger", "trigger is required");

    let trigger = match &draft.trigger {
        Some(t) => {
            let (next, trigger) = parse_trigger(v, t);
            v = next;
            trigger
        }
        None => None,
    };
    let (v, conditions) = parse_conditions(v, draft.conditions.as_deref().unwrap_or_default());
    let (v, actions) = parse_actions(v, draft.actions.as_deref().unwrap_or_default());

    match (draft.name, trigger) {
        (Some(name), Some(trigger)) => v.finish_with(NewWorkflow {
            name: name.trim().to_string(),
            description: normalize_description(draft.description),
            enabled: draft.enabled.unwrap_or(true),
            trigger,
            conditions,
            actions,
            created_by,
        }),
        // a missing name or trigger has already been recorded on the validator
        _ => {
            v.finish()?;
            Err(ApiError::validation_single("trigger", "trigger is required"))
        }
    }
}

pub fn validate_patch(draft: WorkflowDraft) -> ValidationResult<Validated<WorkflowPatch>> {
    let mut v = Validator::new();
    if draft.name.is_some() {
        v = v
            .required_string(&draft.name, "name")
            .max_length(&draft.name, "name", NAME_MAX_LENGTH);
    }

    let mut patch = WorkflowPatch {
        name: draft.name.as_deref().map(|n| n.trim().to_string()),
        description: draft.description.map(|d| normalize_description(Some(d))),
        enabled: draft.enabled,
        ..WorkflowPatch::default()
    };

    if let Some(t) = &draft.trigger {
        let (next, trigger) = parse_trigger(v, t);
        v = next;
        patch.trigger = trigger;
    }
    if let Some(conditions) = &draft.conditions {
        let (next, parsed) = parse_conditions(v, conditions);
        v = next;
        patch.conditions = Some(parsed);
    }
    if let Some(actions) = &draft.actions {
        let (next, parsed) = parse_actions(v, actions);
        v = next;
        patch.actions = Some(parsed);
    }

    v.finish_with(patch)
}

fn normalize_description(description: Option<String>) -> Option<String> {
    description
        .map(|d| d.trim().to_string())
        .filter(|d| !d.is_empty())
}

fn parse_trigger(v: Validator, draft: &TriggerDraft) -> (Validator, Option<Trigger>) {
    let trigger_type = match draft.trigger_type.as_deref() {
        None => return (v.error("trigger.type", "trigger.type is required"), None),
        Some(raw) => match raw.parse::<TriggerType>() {
            Ok(t) => t,
            Err(e) => return (v.error("trigger.type", &e.to_string()), None),
        },
    };

    let params = match &draft.params {
        None | Some(serde_json::Value::Null) => None,
        Some(p @ serde_json::Value::Object(_)) => Some(p.clone()),
        Some(_) => return (v.error("trigger.params", "trigger.params must be an object"), None),
    };

    (v, Some(Trigger { trigger_type, params }))
}

fn parse_conditions(mut v: Validator, drafts: &[ConditionDraft]) -> (Validator, Vec<Condition>) {
    let mut conditions = Vec::with_capacity(drafts.len());

    for (i, draft) in drafts.iter().enumerate() {
        let field_key = format!("conditions[{}].field", i);
        let op_key = format!("conditions[{}].op", i);
        let value_key = format!("conditions[{}].value", i);

        v = v.required_string(&draft.field, &field_key);

        let op = match draft.op.as_deref().map(str::parse::<ConditionOp>) {
            Some(Ok(op)) => Some(op),
            Some(Err(e)) => {
                v = v.error(&op_key, &e.to_string());
                None
            }
            None => {
                v = v.error(&op_key, &format!("{} is required", op_key));
                None
            }
        };

        let value = match serde_json::from_value::<ConditionValue>(draft.value.clone()) {
            Ok(value) => Some(value),
            Err(_) => {
                v = v.error(&value_key, "value must be a string, number or boolean");
                None
            }
        };

        if let (Some(field), Some(op), Some(value)) = (&draft.field, op, value) {
            conditions.push(Condition {
                field: field.trim().to_string(),
                op,
                value,
            });
        }
    }

    (v, conditions)
}

fn parse_actions(mut v: Validator, drafts: &[ActionDraft]) -> (Validator, Vec<Action>) {
    let mut actions = Vec::with_capacity(drafts.len());

    for (i, draft) in drafts.iter().enumerate() {
        let type_key = format!("actions[{}].type", i);
        let payload_key = format!("actions[{}].payload", i);

        let action_type = match draft.action_type.as_deref().map(str::parse::<ActionType>) {
            Some(Ok(t)) => t,
            Some(Err(e)) => {
                v = v.error(&type_key, &e.to_string());
                continue;
            }
            None => {
                v = v.error(&type_key, &format!("{} is required", type_key));
                continue;
            }
        };

        let payload = match &draft.payload {
            serde_json::Value::Null => serde_json::json!({}),
            other => other.clone(),
        };
        let tagged = serde_json::json!({ "type": action_type.as_str(), "payload": payload });

        match serde_json::from_value::<Action>(tagged) {
            Ok(action) => {
                let (key, value) = required_payload_field(&action);
                if value.trim().is_empty() {
                    v = v.error(&payload_key, &format!("{} cannot be empty", key));
                } else {
                    actions.push(action);
                }
            }
            Err(e) => {
                v = v.error(&payload_key, &format!("invalid {} payload: {}", action_type, e));
            }
        }
    }

    (v, actions)
}

fn required_payload_field(action: &Action) -> (&'static str, &str) {
    match action {
        Action::CreateActivity(p) => ("subject", &p.subject),
        Action::AssignOwner(p) => ("ownerId", &p.owner_id),
        Action::CreateTicket(p) => ("title", &p.title),
        Action::NotifyInApp(p) => ("title", &p.title),
        Action::UpdateDealStage(p) => ("stage", &p.stage),
    }
}
