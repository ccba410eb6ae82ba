use std::env;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    /// Postgres connection string; without one the in-memory backends are used
    pub database_url: Option<String>,
    pub server_addr: String,
    pub jwt_secret: String,
    pub crm: CrmApiConfig,
    pub automation: AutomationConfig,
}

/// Where the CRM collaborator services live
#[derive(Debug, Clone)]
pub struct CrmApiConfig {
    pub base_url: String,
    pub service_token: String,
}

#[derive(Debug, Clone)]
pub struct AutomationConfig {
    /// Upper bound for a single collaborator call during dispatch
    pub action_timeout: Duration,
    pub event_bus_capacity: usize,
    /// Events evaluated at the same time; the bus fills up beyond this
    pub max_concurrent_events: usize,
    pub record_skipped: bool,
}

impl Default for AutomationConfig {
    fn default() -> Self {
        Self {
            action_timeout: Duration::from_secs(10),
            event_bus_capacity: 1024,
            max_concurrent_events: 32,
            record_skipped: true,
        }
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let defaults = AutomationConfig::default();

        let action_timeout_secs: u64 = match env::var("ACTION_TIMEOUT_SECS") {
            Ok(v) => v.parse()?,
            Err(_) => defaults.action_timeout.as_secs(),
        };
        if action_timeout_secs == 0 {
            anyhow::bail!("ACTION_TIMEOUT_SECS must be greater than zero");
        }

        let event_bus_capacity: usize = match env::var("EVENT_BUS_CAPACITY") {
            Ok(v) => v.parse()?,
            Err(_) => defaults.event_bus_capacity,
        };
        if event_bus_capacity == 0 {
            anyhow::bail!("EVENT_BUS_CAPACITY must be greater than zero");
        }

        let max_concurrent_events: usize = match env::var("AUTOMATION_MAX_CONCURRENT_EVENTS") {
            Ok(v) => v.parse()?,
            Err(_) => defaults.max_concurrent_events,
        };
        if max_concurrent_events == 0 {
            anyhow::bail!("AUTOMATION_MAX_CONCURRENT_EVENTS must be greater than zero");
        }

        let record_skipped = match env::var("AUTOMATION_RECORD_SKIPPED") {
            Ok(v) => parse_flag(&v).ok_or_else(|| {
                anyhow::anyhow!("AUTOMATION_RECORD_SKIPPED must be true or false, got '{}'", v)
            })?,
            Err(_) => defaults.record_skipped,
        };

        Ok(Config {
            database_url: env::var("DATABASE_URL").ok().filter(|url| !url.is_empty()),
            server_addr: env::var("SERVER_ADDR")
                .unwrap_or_else(|_| "0.0.0.0:8080".to_string()),
            jwt_secret: env::var("JWT_SECRET").unwrap_or_else(|_| {
                tracing::warn!("JWT_SECRET not set, using default (insecure for production)");
                "your-secret-key-change-in-production".to_string()
            }),
            crm: CrmApiConfig {
                base_url: env::var("CRM_API_URL")
                    .unwrap_or_else(|_| "http://localhost:3000/api".to_string()),
                service_token: env::var("CRM_SERVICE_TOKEN").unwrap_or_default(),
            },
            automation: AutomationConfig {
                action_timeout: Duration::from_secs(action_timeout_secs),
                event_bus_capacity,
                max_concurrent_events,
                record_skipped,
            },
        })
    }
}

impl CrmApiConfig {
    /// Check if the service token is set
    pub fn is_configured(&self) -> bool {
        !self.base_url.is_empty() && !self.service_token.is_empty()
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" => Some(true),
        "false" => Some(false),
        _ => None,
    }
}
