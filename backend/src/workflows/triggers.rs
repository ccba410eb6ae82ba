// Workflow Triggers - CRM events that can start workflow evaluation

use automation_shared::TriggerType;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Payload for trigger events; always a JSON object
pub type EventPayload = Value;

/// A domain event emitted by a CRM or customer-success collaborator
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TriggerEvent {
    pub event_id: Uuid,
    #[serde(rename = "type")]
    pub trigger_type: TriggerType,
    pub org_id: Uuid,
    pub payload: EventPayload,
    pub source: EventSource,
    pub timestamp: DateTime<Utc>,
}

/// Who produced the event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EventSource {
    System,
    User(Uuid),
    Api,
    TestRun,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Company,
    Contact,
    Deal,
    Ticket,
    Lead,
}

impl EntityKind {
    fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "company" | "companies" => Some(Self::Company),
            "contact" | "contacts" => Some(Self::Contact),
            "deal" | "deals" => Some(Self::Deal),
            "ticket" | "tickets" => Some(Self::Ticket),
            "lead" | "leads" => Some(Self::Lead),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Company => "company",
            Self::Contact => "contact",
            Self::Deal => "deal",
            Self::Ticket => "ticket",
            Self::Lead => "lead",
        }
    }
}

/// The CRM record an event is about
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityRef {
    pub kind: EntityKind,
    pub id: String,
}

const ENTITY_ID_KEYS: [(&str, EntityKind); 5] = [
    ("dealId", EntityKind::Deal),
    ("contactId", EntityKind::Contact),
    ("companyId", EntityKind::Company),
    ("ticketId", EntityKind::Ticket),
    ("leadId", EntityKind::Lead),
];

/// Resolve a dotted path (`company.industry`, `lines.0.sku`) inside a payload
pub fn lookup<'a>(payload: &'a Value, path: &str) -> Option<&'a Value> {
    if path.is_empty() {
        return None;
    }

    let mut current = payload;
    for segment in path.split('.') {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

fn id_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Trigger params filter: keys present in both sides must hold equal values
pub fn params_match(params: Option<&Value>, payload: &Value) -> bool {
    let Some(Value::Object(params)) = params else {
        return true;
    };

    params.iter().all(|(key, expected)| match payload.get(key) {
        Some(actual) => actual == expected,
        None => true,
    })
}

impl TriggerEvent {
    /// Create a new trigger event
    pub fn new(trigger_type: TriggerType, org_id: Uuid, payload: EventPayload, source: EventSource) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            trigger_type,
            org_id,
            payload,
            source,
            timestamp: Utc::now(),
        }
    }

    /// Event built from a test-run payload; non-object payloads are wrapped as `{"value": ...}`
    pub fn synthetic(trigger_type: TriggerType, org_id: Uuid, payload: Option<Value>) -> Self {
        let payload = match payload {
            Some(Value::Object(map)) => Value::Object(map),
            None | Some(Value::Null) => Value::Object(Default::default()),
            Some(other) => serde_json::json!({ "value": other }),
        };
        Self::new(trigger_type, org_id, payload, EventSource::TestRun)
    }

    pub fn lead_created(org_id: Uuid, lead_id: &str, lead_source: &str, owner_id: Option<&str>) -> Self {
        Self::new(
            TriggerType::LeadCreated,
            org_id,
            serde_json::json!({
                "leadId": lead_id,
                "source": lead_source,
                "ownerId": owner_id
            }),
            EventSource::System,
        )
    }

    pub fn deal_stage_changed(org_id: Uuid, deal_id: &str, from_stage: &str, stage: &str, value: f64) -> Self {
        Self::new(
            TriggerType::DealStageChanged,
            org_id,
            serde_json::json!({
                "dealId": deal_id,
                "fromStage": from_stage,
                "stage": stage,
                "value": value
            }),
            EventSource::System,
        )
    }

    pub fn ticket_created(org_id: Uuid, ticket_id: &str, subject: &str, priority: &str, company_id: Option<&str>) -> Self {
        Self::new(
            TriggerType::TicketCreated,
            org_id,
            serde_json::json!({
                "ticketId": ticket_id,
                "subject": subject,
                "priority": priority,
                "companyId": company_id
            }),
            EventSource::System,
        )
    }

    pub fn health_score_dropped(org_id: Uuid, company_id: &str, previous_score: i64, score: i64) -> Self {
        Self::new(
            TriggerType::HealthScoreDropped,
            org_id,
            serde_json::json!({
                "companyId": company_id,
                "previousScore": previous_score,
                "score": score,
                "drop": previous_score - score
            }),
            EventSource::System,
        )
    }

    pub fn renewal_due_soon(org_id: Uuid, company_id: &str, renewal_date: NaiveDate, days_until: i64) -> Self {
        Self::new(
            TriggerType::RenewalDueSoon,
            org_id,
            serde_json::json!({
                "companyId": company_id,
                "renewalDate": renewal_date.to_string(),
                "daysUntil": days_until
            }),
            EventSource::System,
        )
    }

    pub fn field(&self, path: &str) -> Option<&Value> {
        lookup(&self.payload, path)
    }

    /// The record this event is about: `entityType` + `entityId`, else the first known id key
    pub fn entity(&self) -> Option<EntityRef> {
        let explicit = self
            .payload
            .get("entityType")
            .and_then(Value::as_str)
            .and_then(EntityKind::parse)
            .zip(self.payload.get("entityId").and_then(id_string));
        if let Some((kind, id)) = explicit {
            return Some(EntityRef { kind, id });
        }

        ENTITY_ID_KEYS.iter().find_map(|(key, kind)| {
            self.payload
                .get(*key)
                .and_then(id_string)
                .map(|id| EntityRef { kind: *kind, id })
        })
    }

    pub fn deal_id(&self) -> Option<String> {
        match self.entity() {
            Some(EntityRef { kind: EntityKind::Deal, id }) => Some(id),
            _ => self.payload.get("dealId").and_then(id_string),
        }
    }

    /// Short SHA-256 digest of the payload, enough to tell runs of different events apart
    pub fn fingerprint(&self) -> String {
        let bytes = serde_json::to_vec(&self.payload).unwrap_or_default();
        let digest = ring::digest::digest(&ring::digest::SHA256, &bytes);
        hex::encode(&digest.as_ref()[..8])
    }

    /// Serialized trigger context stored on each run: `{"triggerType": ..., ...}`
    pub fn snapshot(&self) -> String {
        let mut snapshot = serde_json::json!({
            "triggerType": self.trigger_type,
            "eventId": self.event_id,
            "fingerprint": self.fingerprint(),
        });
        if self.source == EventSource::TestRun {
            snapshot["testRun"] = Value::Bool(true);
        }
        snapshot.to_string()
    }
}
