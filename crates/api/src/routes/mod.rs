pub mod health;
pub mod model3d;

use axum::routing::get;
use axum::Router;

use crate::config::ServerConfig;
use crate::state::AppState;
use crate::ws;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /ws                                              WebSocket (token in query)
///
/// /model3d/providers                               provider availability
/// /model3d/jobs                                    list, create (multipart)
/// /model3d/jobs/{id}                               get (refresh-on-read)
/// ```
pub fn api_routes(config: &ServerConfig) -> Router<AppState> {
    Router::new()
        // Per-user push channel for job updates.
        .route("/ws", get(ws::ws_handler))
        // 2D to 3D conversion jobs.
        .nest("/model3d", model3d::router(config))
}
