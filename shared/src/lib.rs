use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Error returned when a wire name does not belong to one of the closed sets below.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

impl fmt::Display for UnknownVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown {} '{}'", self.kind, self.value)
    }
}

impl std::error::Error for UnknownVariant {}

/// CRM events a workflow can listen for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TriggerType {
    LeadCreated,
    DealStageChanged,
    TicketCreated,
    HealthScoreDropped,
    RenewalDueSoon,
}

impl TriggerType {
    pub const ALL: [TriggerType; 5] = [
        TriggerType::LeadCreated,
        TriggerType::DealStageChanged,
        TriggerType::TicketCreated,
        TriggerType::HealthScoreDropped,
        TriggerType::RenewalDueSoon,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LeadCreated => "LEAD_CREATED",
            Self::DealStageChanged => "DEAL_STAGE_CHANGED",
            Self::TicketCreated => "TICKET_CREATED",
            Self::HealthScoreDropped => "HEALTH_SCORE_DROPPED",
            Self::RenewalDueSoon => "RENEWAL_DUE_SOON",
        }
    }
}

impl fmt::Display for TriggerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TriggerType {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| UnknownVariant {
                kind: "trigger type",
                value: s.to_string(),
            })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trigger {
    #[serde(rename = "type")]
    pub trigger_type: TriggerType,
    /// Optional filter; keys present in both params and the event payload must be equal
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<serde_json::Value>,
}

impl Trigger {
    pub fn new(trigger_type: TriggerType) -> Self {
        Self {
            trigger_type,
            params: None,
        }
    }

    pub fn with_params(mut self, params: serde_json::Value) -> Self {
        self.params = Some(params);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConditionOp {
    Eq,
    Neq,
    Gt,
    Gte,
    Lt,
    Lte,
    Contains,
}

impl ConditionOp {
    pub const ALL: [ConditionOp; 7] = [
        ConditionOp::Eq,
        ConditionOp::Neq,
        ConditionOp::Gt,
        ConditionOp::Gte,
        ConditionOp::Lt,
        ConditionOp::Lte,
        ConditionOp::Contains,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Eq => "eq",
            Self::Neq => "neq",
            Self::Gt => "gt",
            Self::Gte => "gte",
            Self::Lt => "lt",
            Self::Lte => "lte",
            Self::Contains => "contains",
        }
    }
}

impl fmt::Display for ConditionOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConditionOp {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|op| op.as_str() == s)
            .ok_or_else(|| UnknownVariant {
                kind: "condition operator",
                value: s.to_string(),
            })
    }
}

/// Right-hand side of a condition: string, number or boolean
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConditionValue {
    Bool(bool),
    Number(serde_json::Number),
    String(String),
}

impl From<&str> for ConditionValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for ConditionValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<bool> for ConditionValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for ConditionValue {
    fn from(value: i64) -> Self {
        Self::Number(value.into())
    }
}

impl From<i32> for ConditionValue {
    fn from(value: i32) -> Self {
        Self::Number(value.into())
    }
}

impl ConditionValue {
    /// Floats that are not finite have no JSON form and fall back to a string
    pub fn float(value: f64) -> Self {
        match serde_json::Number::from_f64(value) {
            Some(n) => Self::Number(n),
            None => Self::String(value.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub field: String,
    pub op: ConditionOp,
    pub value: ConditionValue,
}

impl Condition {
    pub fn new(field: &str, op: ConditionOp, value: impl Into<ConditionValue>) -> Self {
        Self {
            field: field.to_string(),
            op,
            value: value.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionType {
    CreateActivity,
    AssignOwner,
    CreateTicket,
    NotifyInApp,
    UpdateDealStage,
}

impl ActionType {
    pub const ALL: [ActionType; 5] = [
        ActionType::CreateActivity,
        ActionType::AssignOwner,
        ActionType::CreateTicket,
        ActionType::NotifyInApp,
        ActionType::UpdateDealStage,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CreateActivity => "CREATE_ACTIVITY",
            Self::AssignOwner => "ASSIGN_OWNER",
            Self::CreateTicket => "CREATE_TICKET",
            Self::NotifyInApp => "NOTIFY_IN_APP",
            Self::UpdateDealStage => "UPDATE_DEAL_STAGE",
        }
    }
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActionType {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| UnknownVariant {
                kind: "action type",
                value: s.to_string(),
            })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateActivityPayload {
    pub subject: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub activity_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignOwnerPayload {
    pub owner_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTicketPayload {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotifyInAppPayload {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateDealStagePayload {
    pub stage: String,
}

/// One side-effecting step of a workflow. Serialized as `{"type": ..., "payload": {...}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Action {
    CreateActivity(CreateActivityPayload),
    AssignOwner(AssignOwnerPayload),
    CreateTicket(CreateTicketPayload),
    NotifyInApp(NotifyInAppPayload),
    UpdateDealStage(UpdateDealStagePayload),
}

impl Action {
    pub fn action_type(&self) -> ActionType {
        match self {
            Self::CreateActivity(_) => ActionType::CreateActivity,
            Self::AssignOwner(_) => ActionType::AssignOwner,
            Self::CreateTicket(_) => ActionType::CreateTicket,
            Self::NotifyInApp(_) => ActionType::NotifyInApp,
            Self::UpdateDealStage(_) => ActionType::UpdateDealStage,
        }
    }

    pub fn notify(title: &str, message: Option<&str>) -> Self {
        Self::NotifyInApp(NotifyInAppPayload {
            title: title.to_string(),
            message: message.map(str::to_string),
            user_id: None,
        })
    }

    pub fn create_ticket(title: &str, priority: &str) -> Self {
        Self::CreateTicket(CreateTicketPayload {
            title: title.to_string(),
            description: None,
            priority: Some(priority.to_string()),
        })
    }

    pub fn create_activity(subject: &str, activity_type: &str) -> Self {
        Self::CreateActivity(CreateActivityPayload {
            subject: subject.to_string(),
            activity_type: Some(activity_type.to_string()),
            due_date: None,
        })
    }

    pub fn assign_owner(owner_id: &str) -> Self {
        Self::AssignOwner(AssignOwnerPayload {
            owner_id: owner_id.to_string(),
        })
    }

    pub fn update_deal_stage(stage: &str) -> Self {
        Self::UpdateDealStage(UpdateDealStagePayload {
            stage: stage.to_string(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Workflow {
    pub id: Uuid,
    pub org_id: Uuid,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub enabled: bool,
    pub trigger: Trigger,
    pub conditions: Vec<Condition>,
    pub actions: Vec<Action>,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(
    feature = "sqlx",
    sqlx(type_name = "workflow_run_status", rename_all = "SCREAMING_SNAKE_CASE")
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunStatus {
    Success,
    Failed,
    Skipped,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "SUCCESS",
            Self::Failed => "FAILED",
            Self::Skipped => "SKIPPED",
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RunStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "SUCCESS" => Ok(Self::Success),
            "FAILED" => Ok(Self::Failed),
            "SKIPPED" => Ok(Self::Skipped),
            other => Err(UnknownVariant {
                kind: "run status",
                value: other.to_string(),
            }),
        }
    }
}

/// Immutable record of one workflow evaluated against one event
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowRun {
    pub id: Uuid,
    pub org_id: Uuid,
    pub workflow_id: Uuid,
    pub status: RunStatus,
    /// JSON text of the shape `{"triggerType": ..., ...}`; the runs page parses it for its label
    pub trigger_event: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub executed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowTemplate {
    pub id: String,
    pub name: String,
    pub description: String,
    pub trigger: Trigger,
    pub conditions: Vec<Condition>,
    pub actions: Vec<Action>,
}

// Request bodies. These stay untyped so that every violation can be reported
// against its field instead of failing at deserialization.

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TriggerDraft {
    #[serde(rename = "type", default)]
    pub trigger_type: Option<String>,
    #[serde(default)]
    pub params: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConditionDraft {
    #[serde(default)]
    pub field: Option<String>,
    #[serde(default)]
    pub op: Option<String>,
    #[serde(default)]
    pub value: serde_json::Value,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActionDraft {
    #[serde(rename = "type", default)]
    pub action_type: Option<String>,
    #[serde(default)]
    pub payload: serde_json::Value,
}

/// Partial workflow as sent by `POST` and `PATCH /automation/workflows`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowDraft {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub enabled: Option<bool>,
    #[serde(default)]
    pub trigger: Option<TriggerDraft>,
    #[serde(default)]
    pub conditions: Option<Vec<ConditionDraft>>,
    #[serde(default)]
    pub actions: Option<Vec<ActionDraft>>,
}
