// Workflow Store - org-scoped persistence of workflow definitions
//
// Every operation takes the caller's org id; a workflow belonging to another
// org behaves exactly like a missing one.

use async_trait::async_trait;
use automation_shared::{Action, Condition, Trigger, TriggerType, Workflow};
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::{types::Json, PgPool};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::validation::{NewWorkflow, WorkflowPatch};
use crate::error::{ApiError, ApiResult, AppError};
use crate::validation::Validated;

#[async_trait]
pub trait WorkflowStore: Send + Sync {
    /// All workflows of the org, oldest first
    async fn list(&self, org_id: Uuid) -> ApiResult<Vec<Workflow>>;

    async fn get(&self, org_id: Uuid, id: Uuid) -> ApiResult<Workflow>;

    async fn create(&self, org_id: Uuid, workflow: Validated<NewWorkflow>) -> ApiResult<Workflow>;

    async fn update(&self, org_id: Uuid, id: Uuid, patch: Validated<WorkflowPatch>) -> ApiResult<Workflow>;

    /// Flip `enabled` and return the workflow with its new state
    async fn toggle(&self, org_id: Uuid, id: Uuid) -> ApiResult<Workflow>;

    async fn delete(&self, org_id: Uuid, id: Uuid) -> ApiResult<()>;

    /// Enabled workflows of the org listening for `trigger_type`
    async fn find_by_trigger(&self, org_id: Uuid, trigger_type: TriggerType) -> ApiResult<Vec<Workflow>>;
}

fn workflow_not_found() -> AppError {
    ApiError::not_found("Workflow")
}

/// Process-local store used when no database is configured, and in tests
#[derive(Default)]
pub struct InMemoryWorkflowStore {
    workflows: RwLock<HashMap<Uuid, Workflow>>,
}

impl InMemoryWorkflowStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl WorkflowStore for InMemoryWorkflowStore {
    async fn list(&self, org_id: Uuid) -> ApiResult<Vec<Workflow>> {
        let workflows = self.workflows.read().await;
        let mut items: Vec<Workflow> = workflows
            .values()
            .filter(|w| w.org_id == org_id)
            .cloned()
            .collect();
        items.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(items)
    }

    async fn get(&self, org_id: Uuid, id: Uuid) -> ApiResult<Workflow> {
        self.workflows
            .read()
            .await
            .get(&id)
            .filter(|w| w.org_id == org_id)
            .cloned()
            .ok_or_else(workflow_not_found)
    }

    async fn create(&self, org_id: Uuid, workflow: Validated<NewWorkflow>) -> ApiResult<Workflow> {
        let workflow = workflow.into_inner().into_workflow(org_id);
        self.workflows.write().await.insert(workflow.id, workflow.clone());
        Ok(workflow)
    }

    async fn update(&self, org_id: Uuid, id: Uuid, patch: Validated<WorkflowPatch>) -> ApiResult<Workflow> {
        let mut workflows = self.workflows.write().await;
        let workflow = workflows
            .get_mut(&id)
            .filter(|w| w.org_id == org_id)
            .ok_or_else(workflow_not_found)?;
        patch.into_inner().apply(workflow);
        Ok(workflow.clone())
    }

    async fn toggle(&self, org_id: Uuid, id: Uuid) -> ApiResult<Workflow> {
        let mut workflows = self.workflows.write().await;
        let workflow = workflows
            .get_mut(&id)
            .filter(|w| w.org_id == org_id)
            .ok_or_else(workflow_not_found)?;
        workflow.enabled = !workflow.enabled;
        workflow.updated_at = Some(Utc::now());
        Ok(workflow.clone())
    }

    async fn delete(&self, org_id: Uuid, id: Uuid) -> ApiResult<()> {
        let mut workflows = self.workflows.write().await;
        match workflows.get(&id) {
            Some(w) if w.org_id == org_id => {
                workflows.remove(&id);
                Ok(())
            }
            _ => Err(workflow_not_found()),
        }
    }

    async fn find_by_trigger(&self, org_id: Uuid, trigger_type: TriggerType) -> ApiResult<Vec<Workflow>> {
        Ok(self
            .list(org_id)
            .await?
            .into_iter()
            .filter(|w| w.enabled && w.trigger.trigger_type == trigger_type)
            .collect())
    }
}

const WORKFLOW_COLUMNS: &str = "id, org_id, name, description, enabled, trigger_type, trigger_params, \
     conditions, actions, created_by, created_at, updated_at";

#[derive(sqlx::FromRow)]
struct WorkflowRow {
    id: Uuid,
    org_id: Uuid,
    name: String,
    description: Option<String>,
    enabled: bool,
    trigger_type: String,
    trigger_params: Option<Value>,
    conditions: Json<Vec<Condition>>,
    actions: Json<Vec<Action>>,
    created_by: Uuid,
    created_at: DateTime<Utc>,
    updated_at: Option<DateTime<Utc>>,
}

impl TryFrom<WorkflowRow> for Workflow {
    type Error = AppError;

    fn try_from(row: WorkflowRow) -> Result<Self, Self::Error> {
        let trigger_type = row.trigger_type.parse::<TriggerType>().map_err(|e| {
            AppError::InternalError(format!("workflow {} has a corrupt trigger: {}", row.id, e))
        })?;

        Ok(Workflow {
            id: row.id,
            org_id: row.org_id,
            name: row.name,
            description: row.description,
            enabled: row.enabled,
            trigger: Trigger {
                trigger_type,
                params: row.trigger_params,
            },
            conditions: row.conditions.0,
            actions: row.actions.0,
            created_by: row.created_by,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn into_workflows(rows: Vec<WorkflowRow>) -> ApiResult<Vec<Workflow>> {
    rows.into_iter().map(Workflow::try_from).collect()
}

pub struct PgWorkflowStore {
    pool: PgPool,
}

impl PgWorkflowStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl WorkflowStore for PgWorkflowStore {
    async fn list(&self, org_id: Uuid) -> ApiResult<Vec<Workflow>> {
        let sql = format!(
            "SELECT {} FROM automation_workflows WHERE org_id = $1 ORDER BY created_at, id",
            WORKFLOW_COLUMNS
        );
        let rows = sqlx::query_as::<_, WorkflowRow>(&sql)
            .bind(org_id)
            .fetch_all(&self.pool)
            .await?;
        into_workflows(rows)
    }

    async fn get(&self, org_id: Uuid, id: Uuid) -> ApiResult<Workflow> {
        let sql = format!(
            "SELECT {} FROM automation_workflows WHERE org_id = $1 AND id = $2",
            WORKFLOW_COLUMNS
        );
        sqlx::query_as::<_, WorkflowRow>(&sql)
            .bind(org_id)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(workflow_not_found)?
            .try_into()
    }

    async fn create(&self, org_id: Uuid, workflow: Validated<NewWorkflow>) -> ApiResult<Workflow> {
        let workflow = workflow.into_inner().into_workflow(org_id);
        let sql = format!(
            r#"INSERT INTO automation_workflows
                (id, org_id, name, description, enabled, trigger_type, trigger_params,
                 conditions, actions, created_by, created_at)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
               RETURNING {}"#,
            WORKFLOW_COLUMNS
        );

        sqlx::query_as::<_, WorkflowRow>(&sql)
            .bind(workflow.id)
            .bind(workflow.org_id)
            .bind(&workflow.name)
            .bind(&workflow.description)
            .bind(workflow.enabled)
            .bind(workflow.trigger.trigger_type.as_str())
            .bind(&workflow.trigger.params)
            .bind(Json(&workflow.conditions))
            .bind(Json(&workflow.actions))
            .bind(workflow.created_by)
            .bind(workflow.created_at)
            .fetch_one(&self.pool)
            .await?
            .try_into()
    }

    async fn update(&self, org_id: Uuid, id: Uuid, patch: Validated<WorkflowPatch>) -> ApiResult<Workflow> {
        let patch = patch.into_inner();
        let (trigger_type, trigger_params) = match &patch.trigger {
            Some(trigger) => (Some(trigger.trigger_type.as_str()), trigger.params.clone()),
            None => (None, None),
        };

        // Replacing the trigger replaces its params too, even with NULL
        let sql = format!(
            r#"UPDATE automation_workflows SET
                 name = COALESCE($3, name),
                 description = CASE WHEN $4 THEN $5 ELSE description END,
                 enabled = COALESCE($6, enabled),
                 trigger_params = CASE WHEN $7::text IS NULL THEN trigger_params ELSE $8 END,
                 trigger_type = COALESCE($7, trigger_type),
                 conditions = COALESCE($9, conditions),
                 actions = COALESCE($10, actions),
                 updated_at = NOW()
               WHERE org_id = $1 AND id = $2
               RETURNING {}"#,
            WORKFLOW_COLUMNS
        );

        sqlx::query_as::<_, WorkflowRow>(&sql)
            .bind(org_id)
            .bind(id)
            .bind(&patch.name)
            .bind(patch.description.is_some())
            .bind(patch.description.clone().flatten())
            .bind(patch.enabled)
            .bind(trigger_type)
            .bind(trigger_params)
            .bind(patch.conditions.as_ref().map(Json))
            .bind(patch.actions.as_ref().map(Json))
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(workflow_not_found)?
            .try_into()
    }

    async fn toggle(&self, org_id: Uuid, id: Uuid) -> ApiResult<Workflow> {
        let sql = format!(
            r#"UPDATE automation_workflows SET enabled = NOT enabled, updated_at = NOW()
               WHERE org_id = $1 AND id = $2
               RETURNING {}"#,
            WORKFLOW_COLUMNS
        );

        sqlx::query_as::<_, WorkflowRow>(&sql)
            .bind(org_id)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(workflow_not_found)?
            .try_into()
    }

    async fn delete(&self, org_id: Uuid, id: Uuid) -> ApiResult<()> {
        let result = sqlx::query("DELETE FROM automation_workflows WHERE org_id = $1 AND id = $2")
            .bind(org_id)
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(workflow_not_found());
        }
        Ok(())
    }

    async fn find_by_trigger(&self, org_id: Uuid, trigger_type: TriggerType) -> ApiResult<Vec<Workflow>> {
        let sql = format!(
            r#"SELECT {} FROM automation_workflows
               WHERE org_id = $1 AND trigger_type = $2 AND enabled
               ORDER BY created_at, id"#,
            WORKFLOW_COLUMNS
        );
        let rows = sqlx::query_as::<_, WorkflowRow>(&sql)
            .bind(org_id)
            .bind(trigger_type.as_str())
            .fetch_all(&self.pool)
            .await?;
        into_workflows(rows)
    }
}
