use std::sync::Arc;

use mugo_adk::AgentClient;

use crate::config::AgentApps;
use crate::db::Database;
use crate::error::AppError;
use crate::registry::SessionRegistry;

#[derive(Clone)]
pub struct AppState {
    /// `None` when running without persistence
    pub db: Option<Database>,
    /// A database URL was configured, whether or not the connection succeeded
    pub database_configured: bool,
    pub agents: AgentClient,
    pub apps: AgentApps,
    pub registry: Arc<SessionRegistry>,
}

impl AppState {
    /// The database, or 503 for routes that cannot work without it.
    pub fn db(&self) -> Result<&Database, AppError> {
        self.db.as_ref().ok_or_else(|| AppError::Unavailable {
            message: "Persistence is not available on this server".to_string(),
        })
    }
}
