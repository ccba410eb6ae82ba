// Event Bus - bounded in-process queue between event producers and the engine

use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinHandle, JoinSet};
use tracing::{error, info, warn};
use uuid::Uuid;

use super::engine::WorkflowEngine;
use super::triggers::TriggerEvent;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum PublishError {
    #[error("event bus is full")]
    Full,
    #[error("event bus is closed")]
    Closed,
}

/// Producer handle; cheap to clone into every request handler
#[derive(Clone)]
pub struct EventBus {
    sender: mpsc::Sender<TriggerEvent>,
}

pub struct EventReceiver {
    receiver: mpsc::Receiver<TriggerEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> (Self, EventReceiver) {
        let (sender, receiver) = mpsc::channel(capacity);
        (Self { sender }, EventReceiver { receiver })
    }

    /// Enqueue without waiting; a full queue is reported instead of blocking the caller
    pub fn publish(&self, event: TriggerEvent) -> Result<Uuid, PublishError> {
        let event_id = event.event_id;
        self.sender.try_send(event).map_err(|e| match e {
            mpsc::error::TrySendError::Full(event) => {
                warn!("Event bus full, dropping {} event {}", event.trigger_type, event.event_id);
                PublishError::Full
            }
            mpsc::error::TrySendError::Closed(_) => PublishError::Closed,
        })?;
        Ok(event_id)
    }
}

impl EventReceiver {
    pub async fn recv(&mut self) -> Option<TriggerEvent> {
        self.receiver.recv().await
    }
}

/// Drain the bus until every producer is gone, evaluating at most `max_in_flight`
/// events at a time. Returns once the last in-flight evaluation has finished.
pub fn spawn_consumer(
    engine: Arc<WorkflowEngine>,
    mut events: EventReceiver,
    max_in_flight: usize,
) -> JoinHandle<()> {
    let max_in_flight = max_in_flight.max(1);

    tokio::spawn(async move {
        info!("Workflow event consumer started");
        let mut in_flight = JoinSet::new();

        loop {
            tokio::select! {
                Some(joined) = in_flight.join_next(), if !in_flight.is_empty() => log_join(joined),
                received = events.recv(), if in_flight.len() < max_in_flight => match received {
                    Some(event) => {
                        let engine = engine.clone();
                        in_flight.spawn(async move { evaluate(&engine, event).await });
                    }
                    None => break,
                },
            }
        }

        if !in_flight.is_empty() {
            info!("Event bus closed, waiting for {} in-flight evaluations", in_flight.len());
        }
        while let Some(joined) = in_flight.join_next().await {
            log_join(joined);
        }

        info!("Workflow event consumer stopped");
    })
}

async fn evaluate(engine: &WorkflowEngine, event: TriggerEvent) {
    match engine.process_event(&event).await {
        Ok(outcomes) if !outcomes.is_empty() => {
            info!("Event {} evaluated against {} workflows", event.event_id, outcomes.len());
        }
        Ok(_) => {}
        Err(e) => error!("Failed to process event {}: {}", event.event_id, e),
    }
}

fn log_join(joined: Result<(), JoinError>) {
    if let Err(e) = joined {
        error!("Event evaluation task failed: {}", e);
    }
}
