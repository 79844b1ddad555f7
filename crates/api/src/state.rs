use std::sync::Arc;

use modelforge_pipeline::{LocalStore, Orchestrator};

use crate::config::ServerConfig;
use crate::ws::WsManager;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc` or is already `Clone`).
#[derive(Clone)]
pub struct AppState {
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// Job lifecycle: create, dispatch, refresh-on-read.
    pub orchestrator: Arc<Orchestrator>,
    /// WebSocket connection manager (browser clients).
    pub ws_manager: Arc<WsManager>,
    /// File storage shared by uploads and delivered models.
    pub storage: LocalStore,
}
