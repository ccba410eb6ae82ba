pub mod jwt;
pub mod middleware;

pub use middleware::AuthUser;

/// View workflows, templates and run history
pub const AUTOMATION_READ: &str = "automation:read";
/// Create, change, install and test-run workflows; publish events
pub const AUTOMATION_WRITE: &str = "automation:write";
