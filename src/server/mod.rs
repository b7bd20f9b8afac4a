//! MCP server wiring: shared state, protocol loop, and tool handlers.

pub mod handlers;
pub mod mcp;

pub use handlers::handle_tool_call;
pub use mcp::{McpServer, Tool};

use std::sync::Arc;

use crate::config::Config;
use crate::critic::Critic;
use crate::session::SessionController;

/// Application state shared across all request handlers.
pub struct AppState {
    /// Application configuration.
    pub config: Config,
    /// Session controller over the persistent store.
    pub controller: SessionController,
    /// Critic capability (a no-op when no backend is configured).
    pub critic: Arc<dyn Critic>,
}

impl AppState {
    /// Create application state from its parts
    pub fn new(config: Config, controller: SessionController, critic: Arc<dyn Critic>) -> Self {
        Self {
            config,
            controller,
            critic,
        }
    }
}

/// Shared application state handle.
pub type SharedState = Arc<AppState>;

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::config::StorageConfig;
    use crate::critic::NoopCritic;
    use crate::store::SessionStore;
    use tempfile::TempDir;

    /// State backed by a temp directory and a no-op critic.
    pub fn test_state(dir: &TempDir) -> SharedState {
        let config = Config {
            storage: StorageConfig {
                dir: dir.path().to_path_buf(),
                ..StorageConfig::default()
            },
            ..Config::default()
        };
        let store = SessionStore::open(&config.storage).unwrap();
        let controller = SessionController::new(store);
        Arc::new(AppState::new(config, controller, Arc::new(NoopCritic)))
    }
}
