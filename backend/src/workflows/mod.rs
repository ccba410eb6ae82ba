// Workflow Automation Engine
//
// Rule-based automation for the CRM. Producers publish trigger events onto the
// event bus; the engine evaluates each org's enabled workflows against them,
// dispatches matched actions to CRM collaborators and records one run per
// evaluation.

pub mod actions;
pub mod conditions;
pub mod engine;
pub mod event_bus;
pub mod executor;
pub mod runs;
pub mod store;
pub mod templates;
pub mod triggers;
pub mod validation;

pub use actions::Collaborators;
pub use engine::{EnginePolicy, WorkflowEngine};
pub use event_bus::{spawn_consumer, EventBus};
pub use executor::ActionDispatcher;
pub use runs::{InMemoryRunRecorder, PgRunRecorder, RunQuery, RunRecorder};
pub use store::{InMemoryWorkflowStore, PgWorkflowStore, WorkflowStore};
pub use triggers::{EventSource, TriggerEvent};
