use std::sync::Arc;

use threadline_persist::PersistenceClient;
use threadline_turns::TurnOrchestrator;

use crate::config::Config;

/// Shared application state passed to all handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub orchestrator: Arc<TurnOrchestrator>,
    pub persistence: Arc<dyn PersistenceClient>,
}

impl AppState {
    pub fn new(
        config: Config,
        orchestrator: Arc<TurnOrchestrator>,
        persistence: Arc<dyn PersistenceClient>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            orchestrator,
            persistence,
        }
    }
}
