//! Meshy image-to-3D adapter.
//!
//! One image goes to the single-image endpoint, two to four images go to the
//! multi-image endpoint. The status endpoint differs by task type, so the
//! type is re-derived from the stored image list at poll time with
//! [`MeshyTaskKind::for_images`].

use std::time::Duration;

use async_trait::async_trait;
use modelforge_core::generation::TextureGuidance;
use modelforge_core::provider::Provider;
use serde::Deserialize;
use serde_json::{json, Map, Value};

use crate::adapter::{ProviderAdapter, TaskRef, TaskRequest};
use crate::config::MeshyConfig;
use crate::error::ProviderError;
use crate::{http, scan};

/// Most images a single Meshy task accepts.
pub const MAX_IMAGES: usize = 4;

/// Which Meshy endpoint family a task belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MeshyTaskKind {
    SingleImage,
    MultiImage,
}

impl MeshyTaskKind {
    /// Derive the task type from the image count. Pure; called identically at
    /// dispatch and at every poll.
    pub fn for_images(count: usize) -> Result<Self, ProviderError> {
        match count {
            0 => Err(ProviderError::Precondition(
                "Meshy requires at least one image".into(),
            )),
            1 => Ok(MeshyTaskKind::SingleImage),
            n if n <= MAX_IMAGES => Ok(MeshyTaskKind::MultiImage),
            n => Err(ProviderError::Precondition(format!(
                "Meshy accepts at most {MAX_IMAGES} images, got {n}"
            ))),
        }
    }

    pub fn path_segment(self) -> &'static str {
        match self {
            MeshyTaskKind::SingleImage => "image-to-3d",
            MeshyTaskKind::MultiImage => "multi-image-to-3d",
        }
    }
}

/// Known subset of a Meshy task record.
#[derive(Debug, Default, Deserialize)]
struct MeshyTask {
    #[serde(default)]
    model_urls: Option<MeshyModelUrls>,
    #[serde(default)]
    task_error: Option<MeshyTaskError>,
}

#[derive(Debug, Default, Deserialize)]
struct MeshyModelUrls {
    glb: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct MeshyTaskError {
    message: Option<String>,
}

pub struct MeshyAdapter {
    client: reqwest::Client,
    config: MeshyConfig,
}

impl MeshyAdapter {
    pub fn new(config: MeshyConfig, timeout: Duration) -> Result<Self, ProviderError> {
        Ok(Self::with_client(http::build_client(timeout)?, config))
    }

    pub fn with_client(client: reqwest::Client, config: MeshyConfig) -> Self {
        Self { client, config }
    }

    fn endpoint(&self, kind: MeshyTaskKind) -> String {
        http::join(
            &self.config.base_url,
            &format!("openapi/v1/{}", kind.path_segment()),
        )
    }
}

/// Build the task creation body.
///
/// `target_polycount` is only sent when remeshing. Only one texture hint is
/// forwarded; the prompt wins over a guide image.
pub fn task_body(kind: MeshyTaskKind, request: &TaskRequest<'_>) -> Value {
    let options = request.options;
    let mut body = Map::new();

    match kind {
        MeshyTaskKind::SingleImage => {
            body.insert("image_url".into(), json!(request.image_urls[0]));
        }
        MeshyTaskKind::MultiImage => {
            body.insert("image_urls".into(), json!(request.image_urls));
        }
    }

    body.insert("should_remesh".into(), json!(options.should_remesh));
    if options.should_remesh {
        if let Some(polycount) = options.target_polycount {
            body.insert("target_polycount".into(), json!(polycount));
        }
    }
    if let Some(mode) = options.symmetry_mode {
        body.insert("symmetry_mode".into(), json!(mode.as_str()));
    }
    body.insert("enable_pbr".into(), json!(options.enable_pbr));

    match options.texture_guidance() {
        TextureGuidance::Prompt(prompt) => {
            body.insert("should_texture".into(), json!(true));
            body.insert("texture_prompt".into(), json!(prompt));
        }
        TextureGuidance::Image(url) => {
            body.insert("should_texture".into(), json!(true));
            body.insert("texture_image_url".into(), json!(url));
        }
        TextureGuidance::None => {}
    }

    Value::Object(body)
}

#[async_trait]
impl ProviderAdapter for MeshyAdapter {
    fn provider(&self) -> Provider {
        Provider::Meshy
    }

    fn check_inputs(&self, image_urls: &[String]) -> Result<(), ProviderError> {
        MeshyTaskKind::for_images(image_urls.len()).map(|_| ())
    }

    async fn create_task(&self, request: &TaskRequest<'_>) -> Result<String, ProviderError> {
        let kind = MeshyTaskKind::for_images(request.image_urls.len())?;
        let body = task_body(kind, request);

        tracing::debug!(kind = kind.path_segment(), images = request.image_urls.len(), "Creating Meshy task");

        let response = self
            .client
            .post(self.endpoint(kind))
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await?;

        let payload = http::parse_json(Provider::Meshy, response).await?;
        http::id_from(payload.get("result")).ok_or_else(|| {
            ProviderError::MalformedResponse("Meshy response has no task id in `result`".into())
        })
    }

    async fn get_task_status(&self, task: &TaskRef<'_>) -> Result<Value, ProviderError> {
        let kind = MeshyTaskKind::for_images(task.image_urls.len())?;
        let response = self
            .client
            .get(format!("{}/{}", self.endpoint(kind), task.task_id))
            .bearer_auth(&self.config.api_key)
            .send()
            .await?;

        http::parse_json(Provider::Meshy, response).await
    }

    fn extract_result_url(&self, payload: &Value) -> Option<String> {
        let typed: MeshyTask = serde_json::from_value(payload.clone()).unwrap_or_default();
        typed
            .model_urls
            .and_then(|urls| urls.glb)
            .filter(|url| scan::is_http_url(url))
            .or_else(|| scan::find_model_url(payload))
    }

    fn extract_error_message(&self, payload: &Value) -> Option<String> {
        let typed: MeshyTask = serde_json::from_value(payload.clone()).unwrap_or_default();
        typed
            .task_error
            .and_then(|e| e.message)
            .map(|m| m.trim().to_string())
            .filter(|m| !m.is_empty())
            .or_else(|| scan::find_error_message(payload))
    }

    fn failure_fallback(&self) -> String {
        "Meshy could not generate a model from these images".into()
    }
}
