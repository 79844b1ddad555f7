//! Network-free adapter for demo and dev environments.

use async_trait::async_trait;
use modelforge_core::provider::Provider;
use serde_json::{json, Value};

use crate::adapter::{ArtifactKind, ProviderAdapter, TaskRef, TaskRequest};
use crate::error::ProviderError;

/// Produces an immediately-finished task whose artifact is a locally
/// generated placeholder.
#[derive(Debug, Default, Clone, Copy)]
pub struct MockAdapter;

#[async_trait]
impl ProviderAdapter for MockAdapter {
    fn provider(&self) -> Provider {
        Provider::Mock
    }

    async fn create_task(&self, request: &TaskRequest<'_>) -> Result<String, ProviderError> {
        self.check_inputs(request.image_urls)?;
        Ok(format!("mock-{}", uuid::Uuid::new_v4()))
    }

    async fn get_task_status(&self, task: &TaskRef<'_>) -> Result<Value, ProviderError> {
        Ok(json!({ "id": task.task_id, "status": "SUCCEEDED", "progress": 100 }))
    }

    fn extract_result_url(&self, _payload: &Value) -> Option<String> {
        None
    }

    fn artifact_kind(&self) -> ArtifactKind {
        ArtifactKind::Placeholder
    }
}
