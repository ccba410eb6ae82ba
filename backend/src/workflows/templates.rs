// Workflow Templates - predefined workflows an org can install in one click

use automation_shared::{
    Action, ActionDraft, Condition, ConditionDraft, ConditionOp, Trigger, TriggerDraft, TriggerType,
    Workflow, WorkflowDraft, WorkflowTemplate,
};
use uuid::Uuid;

use super::store::WorkflowStore;
use super::validation::validate_new;
use crate::error::{ApiError, ApiResult};

/// The template library, in display order
pub fn library() -> Vec<WorkflowTemplate> {
    vec![
        WorkflowTemplate {
            id: "welcome-new-lead".to_string(),
            name: "Welcome new lead".to_string(),
            description: "Schedule an intro call and tell the owner when a lead arrives".to_string(),
            trigger: Trigger::new(TriggerType::LeadCreated),
            conditions: vec![],
            actions: vec![
                Action::create_activity("Intro call with new lead", "call"),
                Action::notify("New lead", Some("A new lead arrived from {{source}}")),
            ],
        },
        WorkflowTemplate {
            id: "deal-won-celebration".to_string(),
            name: "Deal won celebration".to_string(),
            description: "Announce won deals and queue the handover to onboarding".to_string(),
            trigger: Trigger::new(TriggerType::DealStageChanged),
            conditions: vec![Condition::new("stage", ConditionOp::Eq, "WON")],
            actions: vec![
                Action::notify("Deal won", Some("A deal worth {{value}} just closed")),
                Action::create_activity("Kick off customer onboarding", "task"),
            ],
        },
        WorkflowTemplate {
            id: "urgent-ticket-escalation".to_string(),
            name: "Urgent ticket escalation".to_string(),
            description: "Alert the account owner as soon as an urgent ticket is opened".to_string(),
            trigger: Trigger::new(TriggerType::TicketCreated),
            conditions: vec![Condition::new("priority", ConditionOp::Eq, "urgent")],
            actions: vec![Action::notify("Urgent ticket", Some("{{subject}}"))],
        },
        WorkflowTemplate {
            id: "health-score-drop-alert".to_string(),
            name: "Health score drop alert".to_string(),
            description: "Open a ticket when a customer's health score falls below 50".to_string(),
            trigger: Trigger::new(TriggerType::HealthScoreDropped),
            conditions: vec![Condition::new("score", ConditionOp::Lt, 50)],
            actions: vec![
                Action::create_ticket("Health score dropped to {{score}}", "high"),
                Action::notify("At-risk customer", Some("Health score fell from {{previousScore}} to {{score}}")),
            ],
        },
        WorkflowTemplate {
            id: "renewal-reminder".to_string(),
            name: "Renewal reminder".to_string(),
            description: "Prepare the renewal conversation 30 days ahead".to_string(),
            trigger: Trigger::new(TriggerType::RenewalDueSoon),
            conditions: vec![Condition::new("daysUntil", ConditionOp::Lte, 30)],
            actions: vec![Action::create_activity("Prepare renewal for {{renewalDate}}", "task")],
        },
    ]
}

pub fn find(template_id: &str) -> Option<WorkflowTemplate> {
    library().into_iter().find(|t| t.id == template_id)
}

/// Draft equivalent to what a user would submit to create the template by hand
pub fn to_draft(template: &WorkflowTemplate) -> WorkflowDraft {
    WorkflowDraft {
        name: Some(template.name.clone()),
        description: Some(template.description.clone()),
        enabled: Some(true),
        trigger: Some(TriggerDraft {
            trigger_type: Some(template.trigger.trigger_type.as_str().to_string()),
            params: template.trigger.params.clone(),
        }),
        conditions: Some(
            template
                .conditions
                .iter()
                .map(|c| ConditionDraft {
                    field: Some(c.field.clone()),
                    op: Some(c.op.as_str().to_string()),
                    value: serde_json::to_value(&c.value).unwrap_or_default(),
                })
                .collect(),
        ),
        actions: Some(
            template
                .actions
                .iter()
                .map(|a| {
                    let mut tagged = serde_json::to_value(a).unwrap_or_default();
                    ActionDraft {
                        action_type: Some(a.action_type().as_str().to_string()),
                        payload: tagged["payload"].take(),
                    }
                })
                .collect(),
        ),
    }
}

/// Create an enabled copy of the template in the org, through the regular validation path
pub async fn install(store: &dyn WorkflowStore, org_id: Uuid, template_id: &str, created_by: Uuid) -> ApiResult<Workflow> {
    let template = find(template_id).ok_or_else(|| ApiError::not_found("Template"))?;
    let validated = validate_new(to_draft(&template), created_by)?;
    store.create(org_id, validated).await
}
