// Workflow Engine - evaluates workflows against trigger events and records runs

use automation_shared::{RunStatus, Workflow, WorkflowRun};
use futures::future::join_all;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::conditions;
use super::executor::{ActionDispatcher, DispatchContext};
use super::runs::RunRecorder;
use super::store::WorkflowStore;
use super::triggers::{params_match, TriggerEvent};
use crate::error::ApiResult;

/// Lifecycle of one workflow against one event
///
/// `Candidate -> Matched | Skipped`, then `Matched -> Succeeded | Failed`.
/// Every terminal state produces at most one run record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Candidate,
    Matched,
    Skipped,
    Succeeded,
    Failed,
}

impl RunState {
    pub fn after_conditions(self, matched: bool) -> Self {
        match (self, matched) {
            (Self::Candidate, true) => Self::Matched,
            (Self::Candidate, false) => Self::Skipped,
            (state, _) => state,
        }
    }

    pub fn after_dispatch(self, status: RunStatus) -> Self {
        match (self, status) {
            (Self::Matched, RunStatus::Success) => Self::Succeeded,
            (Self::Matched, _) => Self::Failed,
            (state, _) => state,
        }
    }

    pub fn run_status(&self) -> Option<RunStatus> {
        match self {
            Self::Skipped => Some(RunStatus::Skipped),
            Self::Succeeded => Some(RunStatus::Success),
            Self::Failed => Some(RunStatus::Failed),
            Self::Candidate | Self::Matched => None,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct EnginePolicy {
    /// Write a SKIPPED run when a candidate's conditions fail
    pub record_skipped: bool,
}

impl Default for EnginePolicy {
    fn default() -> Self {
        Self { record_skipped: true }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationOutcome {
    pub workflow_id: Uuid,
    pub status: RunStatus,
    /// `None` when no record was written (policy, or the recorder failed)
    pub run: Option<WorkflowRun>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TestRunOutcome {
    pub ok: bool,
    pub status: RunStatus,
    pub run: Option<WorkflowRun>,
}

pub struct WorkflowEngine {
    store: Arc<dyn WorkflowStore>,
    recorder: Arc<dyn RunRecorder>,
    dispatcher: ActionDispatcher,
    policy: EnginePolicy,
}

impl WorkflowEngine {
    pub fn new(
        store: Arc<dyn WorkflowStore>,
        recorder: Arc<dyn RunRecorder>,
        dispatcher: ActionDispatcher,
        policy: EnginePolicy,
    ) -> Self {
        Self {
            store,
            recorder,
            dispatcher,
            policy,
        }
    }

    /// Evaluate every enabled workflow of the event's org listening for its trigger.
    /// Candidates are independent and evaluated concurrently; a failing
    /// workflow never affects the others.
    pub async fn process_event(&self, event: &TriggerEvent) -> ApiResult<Vec<EvaluationOutcome>> {
        let candidates = self
            .store
            .find_by_trigger(event.org_id, event.trigger_type)
            .await?;

        if candidates.is_empty() {
            debug!("No workflows listen for {} in org {}", event.trigger_type, event.org_id);
            return Ok(Vec::new());
        }

        info!(
            "Processing {} event {} for org {}: {} candidate workflows",
            event.trigger_type,
            event.event_id,
            event.org_id,
            candidates.len()
        );

        let outcomes = join_all(
            candidates
                .iter()
                .map(|workflow| self.evaluate(workflow, event, Mode::Live)),
        )
        .await;

        Ok(outcomes)
    }

    /// Run one workflow against a synthetic event regardless of its enabled flag.
    /// Trigger params are not checked and a run is always recorded.
    pub async fn test_run(&self, org_id: Uuid, workflow_id: Uuid, payload: Option<Value>) -> ApiResult<TestRunOutcome> {
        let workflow = self.store.get(org_id, workflow_id).await?;
        let event = TriggerEvent::synthetic(workflow.trigger.trigger_type, org_id, payload);

        info!("Test run of workflow '{}' ({})", workflow.name, workflow.id);
        let outcome = self.evaluate(&workflow, &event, Mode::Test).await;

        Ok(TestRunOutcome {
            ok: outcome.status == RunStatus::Success,
            status: outcome.status,
            run: outcome.run,
        })
    }

    async fn evaluate(&self, workflow: &Workflow, event: &TriggerEvent, mode: Mode) -> EvaluationOutcome {
        let mut state = RunState::Candidate;

        let trigger_matched = mode == Mode::Test
            || params_match(workflow.trigger.params.as_ref(), &event.payload);
        let matched = trigger_matched && conditions::matches(&workflow.conditions, event);
        state = state.after_conditions(matched);

        if state == RunState::Skipped {
            debug!("Workflow '{}' skipped for event {}", workflow.name, event.event_id);
            let reason = if trigger_matched {
                "conditions not met"
            } else {
                "trigger params not met"
            };
            let run = if self.policy.record_skipped || mode == Mode::Test {
                self.record(workflow, event, RunStatus::Skipped, Some(reason.to_string()), None)
                    .await
            } else {
                None
            };
            return EvaluationOutcome {
                workflow_id: workflow.id,
                status: RunStatus::Skipped,
                run,
            };
        }

        let ctx = DispatchContext {
            org_id: event.org_id,
            event,
            workflow,
        };
        let dispatched = self.dispatcher.execute(&workflow.actions, &ctx).await;
        state = state.after_dispatch(dispatched.status);

        let status = state.run_status().unwrap_or(dispatched.status);
        match status {
            RunStatus::Success => info!("Workflow '{}' executed successfully", workflow.name),
            _ => warn!(
                "Workflow '{}' failed: {}",
                workflow.name,
                dispatched.error.as_deref().unwrap_or("unknown error")
            ),
        }

        let run = self
            .record(workflow, event, status, dispatched.result, dispatched.error)
            .await;

        EvaluationOutcome {
            workflow_id: workflow.id,
            status,
            run,
        }
    }

    async fn record(
        &self,
        workflow: &Workflow,
        event: &TriggerEvent,
        status: RunStatus,
        result: Option<String>,
        error: Option<String>,
    ) -> Option<WorkflowRun> {
        match self
            .recorder
            .record(event.org_id, workflow.id, status, event.snapshot(), result, error)
            .await
        {
            Ok(run) => Some(run),
            Err(e) => {
                error!("Failed to record run of workflow {}: {}", workflow.id, e);
                None
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Live,
    Test,
}
