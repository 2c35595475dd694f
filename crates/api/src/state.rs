use std::sync::Arc;

use avatar_core::Orchestrator;
use tokio::sync::Mutex;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    pub orchestrator: Arc<Orchestrator>,
    /// Held for the duration of a generation. The worker writes into a
    /// shared output tree, so only one job may run at a time.
    pub generation_lock: Arc<Mutex<()>>,
}

impl AppState {
    pub fn new(config: ServerConfig, orchestrator: Orchestrator) -> Self {
        Self {
            config: Arc::new(config),
            orchestrator: Arc::new(orchestrator),
            generation_lock: Arc::new(Mutex::new(())),
        }
    }
}
