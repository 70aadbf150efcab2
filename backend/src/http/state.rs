//! Application state for the HTTP server.

use std::sync::Arc;

use crate::db::repository::FullRepository;
use crate::db::ServerSettings;

/// Shared application state passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Repository instance for database operations
    pub repository: Arc<dyn FullRepository>,
    /// Maximum accepted request body, in bytes
    pub body_limit_bytes: usize,
}

impl AppState {
    /// Create a new application state with the given repository.
    pub fn new(repository: Arc<dyn FullRepository>) -> Self {
        Self {
            repository,
            body_limit_bytes: ServerSettings::default().body_limit_bytes,
        }
    }

    /// Apply the listener settings from `chickerp.toml`.
    pub fn with_settings(mut self, settings: &ServerSettings) -> Self {
        self.body_limit_bytes = settings.body_limit_bytes;
        self
    }
}
