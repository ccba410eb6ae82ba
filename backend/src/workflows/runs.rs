// Workflow Runs - append-only history of evaluations

use async_trait::async_trait;
use automation_shared::{RunStatus, WorkflowRun};
use chrono::Utc;
use serde::Deserialize;
use sqlx::{PgPool, Postgres, QueryBuilder};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::ApiResult;

pub const DEFAULT_RUN_LIMIT: i64 = 100;
pub const MAX_RUN_LIMIT: i64 = 500;

/// Filters for `GET /automation/runs`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunQuery {
    pub workflow_id: Option<Uuid>,
    pub status: Option<RunStatus>,
    pub limit: Option<i64>,
}

impl RunQuery {
    pub fn effective_limit(&self) -> i64 {
        self.limit.unwrap_or(DEFAULT_RUN_LIMIT).clamp(1, MAX_RUN_LIMIT)
    }

    fn accepts(&self, run: &WorkflowRun) -> bool {
        self.workflow_id.is_none_or(|id| run.workflow_id == id)
            && self.status.is_none_or(|status| run.status == status)
    }
}

#[async_trait]
pub trait RunRecorder: Send + Sync {
    /// Append one run; records are never updated afterwards
    async fn record(
        &self,
        org_id: Uuid,
        workflow_id: Uuid,
        status: RunStatus,
        trigger_event: String,
        result: Option<String>,
        error: Option<String>,
    ) -> ApiResult<WorkflowRun>;

    /// Runs of the org, newest first
    async fn list(&self, org_id: Uuid, query: &RunQuery) -> ApiResult<Vec<WorkflowRun>>;
}

#[derive(Default)]
pub struct InMemoryRunRecorder {
    runs: RwLock<Vec<WorkflowRun>>,
}

impl InMemoryRunRecorder {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RunRecorder for InMemoryRunRecorder {
    async fn record(
        &self,
        org_id: Uuid,
        workflow_id: Uuid,
        status: RunStatus,
        trigger_event: String,
        result: Option<String>,
        error: Option<String>,
    ) -> ApiResult<WorkflowRun> {
        let run = WorkflowRun {
            id: Uuid::new_v4(),
            org_id,
            workflow_id,
            status,
            trigger_event,
            result,
            error,
            executed_at: Utc::now(),
        };
        self.runs.write().await.push(run.clone());
        Ok(run)
    }

    async fn list(&self, org_id: Uuid, query: &RunQuery) -> ApiResult<Vec<WorkflowRun>> {
        let runs = self.runs.read().await;
        // Appended in execution order, so reverse iteration is newest first
        Ok(runs
            .iter()
            .rev()
            .filter(|run| run.org_id == org_id && query.accepts(run))
            .take(query.effective_limit() as usize)
            .cloned()
            .collect())
    }
}

pub struct PgRunRecorder {
    pool: PgPool,
}

impl PgRunRecorder {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RunRecorder for PgRunRecorder {
    async fn record(
        &self,
        org_id: Uuid,
        workflow_id: Uuid,
        status: RunStatus,
        trigger_event: String,
        result: Option<String>,
        error: Option<String>,
    ) -> ApiResult<WorkflowRun> {
        let run = sqlx::query_as::<_, WorkflowRun>(
            r#"INSERT INTO automation_runs
                (id, org_id, workflow_id, status, trigger_event, result, error, executed_at)
               VALUES ($1, $2, $3, $4, $5, $6, $7, NOW())
               RETURNING id, org_id, workflow_id, status, trigger_event, result, error, executed_at"#,
        )
        .bind(Uuid::new_v4())
        .bind(org_id)
        .bind(workflow_id)
        .bind(status)
        .bind(trigger_event)
        .bind(result)
        .bind(error)
        .fetch_one(&self.pool)
        .await?;

        Ok(run)
    }

    async fn list(&self, org_id: Uuid, query: &RunQuery) -> ApiResult<Vec<WorkflowRun>> {
        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(
            "SELECT id, org_id, workflow_id, status, trigger_event, result, error, executed_at \
             FROM automation_runs WHERE org_id = ",
        );
        builder.push_bind(org_id);

        if let Some(workflow_id) = query.workflow_id {
            builder.push(" AND workflow_id = ").push_bind(workflow_id);
        }
        if let Some(status) = query.status {
            builder.push(" AND status = ").push_bind(status);
        }

        builder
            .push(" ORDER BY executed_at DESC, id LIMIT ")
            .push_bind(query.effective_limit());

        let runs = builder
            .build_query_as::<WorkflowRun>()
            .fetch_all(&self.pool)
            .await?;

        Ok(runs)
    }
}
