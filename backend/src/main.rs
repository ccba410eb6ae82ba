use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod auth;
mod config;
mod database;
mod error;
mod handlers;
mod integrations;
mod validation;
mod workflows;


use workflows::{
    ActionDispatcher, Collaborators, EnginePolicy, EventBus, InMemoryRunRecorder, InMemoryWorkflowStore,
    PgRunRecorder, PgWorkflowStore, RunRecorder, WorkflowEngine, WorkflowStore,
};

pub struct AppState {
    pub store: Arc<dyn WorkflowStore>,
    pub recorder: Arc<dyn RunRecorder>,
    pub engine: Arc<WorkflowEngine>,
    pub event_bus: EventBus,
    pub jwt_secret: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,tower_http=info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = config::Config::from_env()?;

    let (store, recorder): (Arc<dyn WorkflowStore>, Arc<dyn RunRecorder>) = match &config.database_url {
        Some(url) => {
            let db_pool = database::create_pool(url, database::PoolConfig::from_env()).await?;
            database::migrate(&db_pool).await?;
            (
                Arc::new(PgWorkflowStore::new(db_pool.clone())),
                Arc::new(PgRunRecorder::new(db_pool)),
            )
        }
        None => {
            tracing::warn!("DATABASE_URL not set, workflows and runs are kept in memory only");
            (
                Arc::new(InMemoryWorkflowStore::new()),
                Arc::new(InMemoryRunRecorder::new()),
            )
        }
    };

    if !config.crm.is_configured() {
        tracing::warn!("CRM_API_URL or CRM_SERVICE_TOKEN not set, workflow actions will fail");
    }
    let crm = Arc::new(integrations::CrmApiClient::new(&config.crm, config.automation.action_timeout)?);
    let dispatcher = ActionDispatcher::new(Collaborators::shared(crm), config.automation.action_timeout);

    let engine = Arc::new(WorkflowEngine::new(
        store.clone(),
        recorder.clone(),
        dispatcher,
        EnginePolicy {
            record_skipped: config.automation.record_skipped,
        },
    ));

    let (event_bus, events) = EventBus::new(config.automation.event_bus_capacity);
    let consumer = workflows::spawn_consumer(engine.clone(), events, config.automation.max_concurrent_events);

    let app_state = Arc::new(AppState {
        store,
        recorder,
        engine,
        event_bus,
        jwt_secret: config.jwt_secret.clone(),
    });
    let app = handlers::router(app_state);

    let listener = tokio::net::TcpListener::bind(&config.server_addr).await?;
    tracing::info!("Server running on {}", config.server_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // The router held the last producer handle; the consumer drains what is queued
    // and waits for evaluations still in flight
    consumer.await?;
    tracing::info!("Shut down cleanly");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
    tracing::info!("Shutdown signal received");
}
