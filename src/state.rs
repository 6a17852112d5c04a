use sea_orm::DatabaseConnection;
use std::sync::Arc;

use crate::config::Config;
use crate::mailer::Mailer;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: Arc<DatabaseConnection>,
    /// Application configuration
    pub config: Arc<Config>,
    /// Outgoing mail seam (delivery itself is an external collaborator)
    pub mailer: Arc<dyn Mailer>,
}

impl AppState {
    /// Create new application state
    pub fn new(db: DatabaseConnection, config: Config, mailer: Arc<dyn Mailer>) -> Self {
        Self {
            db: Arc::new(db),
            config: Arc::new(config),
            mailer,
        }
    }
}
