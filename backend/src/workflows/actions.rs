// Workflow Actions - collaborator services that matched workflows act through
//
// One trait per action type. The production implementation of all five is
// `integrations::crm::CrmApiClient`; tests substitute mocks or recording fakes.

use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

use super::triggers::EntityRef;
use crate::error::ActionError;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewActivity {
    pub subject: String,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub activity_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity_type: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity_id: Option<String>,
    pub workflow_id: Uuid,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTicket {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company_id: Option<String>,
    pub workflow_id: Uuid,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewNotification {
    pub user_id: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub workflow_id: Uuid,
}

/// Each call returns an identifier or short summary of what the collaborator did
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ActivityService: Send + Sync {
    async fn create_activity(&self, org_id: Uuid, activity: NewActivity) -> Result<String, ActionError>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait OwnerService: Send + Sync {
    async fn assign_owner(&self, org_id: Uuid, entity: EntityRef, owner_id: String) -> Result<String, ActionError>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TicketService: Send + Sync {
    async fn create_ticket(&self, org_id: Uuid, ticket: NewTicket) -> Result<String, ActionError>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait NotificationService: Send + Sync {
    async fn notify(&self, org_id: Uuid, notification: NewNotification) -> Result<String, ActionError>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DealService: Send + Sync {
    async fn update_stage(&self, org_id: Uuid, deal_id: String, stage: String) -> Result<String, ActionError>;
}

#[derive(Clone)]
pub struct Collaborators {
    pub activities: Arc<dyn ActivityService>,
    pub owners: Arc<dyn OwnerService>,
    pub tickets: Arc<dyn TicketService>,
    pub notifications: Arc<dyn NotificationService>,
    pub deals: Arc<dyn DealService>,
}

impl Collaborators {
    /// Use one value for every collaborator role
    pub fn shared<T>(service: Arc<T>) -> Self
    where
        T: ActivityService + OwnerService + TicketService + NotificationService + DealService + 'static,
    {
        Self {
            activities: service.clone(),
            owners: service.clone(),
            tickets: service.clone(),
            notifications: service.clone(),
            deals: service,
        }
    }
}
