//! Route definitions for the `/model3d` resource.
//!
//! All endpoints require authentication.

use axum::extract::DefaultBodyLimit;
use axum::routing::get;
use axum::Router;

use crate::config::ServerConfig;
use crate::handlers::jobs;
use crate::state::AppState;

/// Routes mounted at `/model3d`.
///
/// ```text
/// GET    /providers       -> list_providers
/// GET    /jobs            -> list_jobs
/// POST   /jobs            -> create_job
/// GET    /jobs/{id}       -> get_job
/// ```
pub fn router(config: &ServerConfig) -> Router<AppState> {
    Router::new()
        .route("/providers", get(jobs::list_providers))
        .route(
            "/jobs",
            get(jobs::list_jobs)
                .post(jobs::create_job)
                .layer(DefaultBodyLimit::max(config.max_submission_bytes())),
        )
        .route("/jobs/{id}", get(jobs::get_job))
}
