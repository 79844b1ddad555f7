//! Delivers job updates to the owning user's WebSocket sessions.

use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::ws::Message;
use modelforge_core::job_events::MSG_TYPE_MODEL_JOB_UPDATED;
use modelforge_core::types::DbId;
use modelforge_pipeline::{JobPublisher, JobSummary};

use crate::ws::manager::WsManager;

/// [`JobPublisher`] backed by [`WsManager`].
///
/// Frames look like `{"type": "model3d_job_updated", "data": <summary>}`.
pub struct WsJobPublisher {
    ws_manager: Arc<WsManager>,
}

impl WsJobPublisher {
    pub fn new(ws_manager: Arc<WsManager>) -> Self {
        Self { ws_manager }
    }
}

/// Serialize a summary into the push frame.
pub fn job_updated_message(summary: &JobSummary) -> serde_json::Value {
    serde_json::json!({
        "type": MSG_TYPE_MODEL_JOB_UPDATED,
        "data": summary,
    })
}

#[async_trait]
impl JobPublisher for WsJobPublisher {
    async fn publish(&self, owner_id: DbId, summary: &JobSummary) {
        let payload = job_updated_message(summary);
        let delivered = self
            .ws_manager
            .send_to_user(owner_id, Message::Text(payload.to_string().into()))
            .await;
        tracing::debug!(
            job_id = summary.id,
            user_id = owner_id,
            status = summary.status.label(),
            delivered,
            "Job update pushed",
        );
    }
}
