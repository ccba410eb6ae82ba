// CRM API client - the production collaborator behind every workflow action

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder};
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;
use uuid::Uuid;

use crate::config::CrmApiConfig;
use crate::error::ActionError;
use crate::workflows::actions::{
    ActivityService, DealService, NewActivity, NewNotification, NewTicket, NotificationService, OwnerService,
    TicketService,
};
use crate::workflows::triggers::{EntityKind, EntityRef};

pub struct CrmApiClient {
    client: Client,
    base_url: String,
    service_token: String,
}

impl CrmApiClient {
    pub fn new(config: &CrmApiConfig, timeout: Duration) -> anyhow::Result<Self> {
        let client = Client::builder()
            .user_agent("crm-automation/1.0")
            .timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            service_token: config.service_token.clone(),
        })
    }

    fn request(&self, method: Method, org_id: Uuid, path: &str) -> RequestBuilder {
        self.client
            .request(method, format!("{}{}", self.base_url, path))
            .bearer_auth(&self.service_token)
            .header("X-Org-Id", org_id.to_string())
    }

    /// Send `body` and return the created resource's id, or `fallback` when the
    /// collaborator answers without one
    async fn send<B: Serialize + ?Sized>(
        &self,
        method: Method,
        org_id: Uuid,
        path: &str,
        body: &B,
        fallback: String,
    ) -> Result<String, ActionError> {
        debug!("CRM {} {} for org {}", method, path, org_id);
        let response = self.request(method, org_id, path).json(body).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ActionError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        let body: Value = response.json().await.unwrap_or(Value::Null);
        Ok(resource_id(&body).unwrap_or(fallback))
    }
}

fn resource_id(body: &Value) -> Option<String> {
    match body.get("id")? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn owner_path(entity: &EntityRef) -> Result<String, ActionError> {
    let collection = match entity.kind {
        EntityKind::Company => "companies",
        EntityKind::Contact => "contacts",
        EntityKind::Deal => "deals",
        _ => return Err(ActionError::MissingEntity("a company, contact or deal")),
    };
    Ok(format!("/{}/{}/owner", collection, entity.id))
}

#[async_trait]
impl ActivityService for CrmApiClient {
    async fn create_activity(&self, org_id: Uuid, activity: NewActivity) -> Result<String, ActionError> {
        let fallback = format!("activity '{}' created", activity.subject);
        self.send(Method::POST, org_id, "/activities", &activity, fallback).await
    }
}

#[async_trait]
impl OwnerService for CrmApiClient {
    async fn assign_owner(&self, org_id: Uuid, entity: EntityRef, owner_id: String) -> Result<String, ActionError> {
        let path = owner_path(&entity)?;
        let body = serde_json::json!({ "ownerId": owner_id });
        self.send(Method::PATCH, org_id, &path, &body, entity.id.clone()).await?;
        Ok(format!("{} {} assigned to {}", entity.kind.as_str(), entity.id, owner_id))
    }
}

#[async_trait]
impl TicketService for CrmApiClient {
    async fn create_ticket(&self, org_id: Uuid, ticket: NewTicket) -> Result<String, ActionError> {
        let fallback = format!("ticket '{}' created", ticket.title);
        self.send(Method::POST, org_id, "/tickets", &ticket, fallback).await
    }
}

#[async_trait]
impl NotificationService for CrmApiClient {
    async fn notify(&self, org_id: Uuid, notification: NewNotification) -> Result<String, ActionError> {
        let fallback = format!("notified {}", notification.user_id);
        self.send(Method::POST, org_id, "/notifications", &notification, fallback.clone())
            .await?;
        Ok(fallback)
    }
}

#[async_trait]
impl DealService for CrmApiClient {
    async fn update_stage(&self, org_id: Uuid, deal_id: String, stage: String) -> Result<String, ActionError> {
        let path = format!("/deals/{}/stage", deal_id);
        let body = serde_json::json!({ "stage": stage });
        self.send(Method::POST, org_id, &path, &body, deal_id.clone()).await?;
        Ok(format!("deal {} moved to {}", deal_id, stage))
    }
}
