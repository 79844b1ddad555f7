//! The uniform contract every generation backend is wrapped in.

use async_trait::async_trait;
use modelforge_core::generation::GenerationOptions;
use modelforge_core::provider::Provider;
use serde_json::Value;

use crate::error::ProviderError;

/// How a finished task's artifact has to be materialized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    /// The result URL points at a delivery-ready model file.
    Model,
    /// The result URL points at a compressed bundle that must be unpacked
    /// and converted.
    Archive,
    /// Nothing is fetched; a placeholder model is generated locally.
    Placeholder,
}

/// Inputs for creating a remote task.
#[derive(Debug, Clone, Copy)]
pub struct TaskRequest<'a> {
    /// Ordered image URLs; the first is the primary/reference image.
    pub image_urls: &'a [String],
    pub options: &'a GenerationOptions,
}

/// Handle for polling a remote task.
///
/// Carries the stored image list so adapters whose status endpoint depends on
/// the task type can re-derive it from the same input that created the task.
#[derive(Debug, Clone, Copy)]
pub struct TaskRef<'a> {
    pub task_id: &'a str,
    pub image_urls: &'a [String],
}

#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    fn provider(&self) -> Provider;

    /// Check provider-specific input constraints. Must not touch the network.
    fn check_inputs(&self, image_urls: &[String]) -> Result<(), ProviderError> {
        if image_urls.is_empty() {
            return Err(ProviderError::Precondition(format!(
                "{} requires at least one image",
                self.provider().display_name()
            )));
        }
        Ok(())
    }

    /// Create the remote task and return its identifier.
    async fn create_task(&self, request: &TaskRequest<'_>) -> Result<String, ProviderError>;

    /// Fetch the provider-native status payload. No interpretation.
    async fn get_task_status(&self, task: &TaskRef<'_>) -> Result<Value, ProviderError>;

    /// Locate the artifact URL in a finished task's payload.
    fn extract_result_url(&self, payload: &Value) -> Option<String>;

    /// Locate the provider's own failure message in a payload.
    fn extract_error_message(&self, payload: &Value) -> Option<String> {
        crate::scan::find_error_message(payload)
    }

    /// Message used when a failed task carries no message of its own.
    fn failure_fallback(&self) -> String {
        format!(
            "{} reported the task as failed",
            self.provider().display_name()
        )
    }

    fn artifact_kind(&self) -> ArtifactKind {
        ArtifactKind::Model
    }
}
