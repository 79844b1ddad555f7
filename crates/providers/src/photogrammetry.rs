//! Photogrammetry reconstruction engine adapter.
//!
//! Wide-baseline reconstruction needs many views, so the image count is
//! bounded on both sides. Finished tasks deliver a zip archive that the
//! materializer unpacks and converts.

use std::time::Duration;

use async_trait::async_trait;
use modelforge_core::provider::Provider;
use serde_json::{json, Value};

use crate::adapter::{ArtifactKind, ProviderAdapter, TaskRef, TaskRequest};
use crate::config::PhotogrammetryConfig;
use crate::error::ProviderError;
use crate::{http, scan};

/// Keys that carry the archive URL, checked at the top level and in `data`.
const ARCHIVE_KEYS: &[&str] = &["result_url", "archive_url", "download_url", "output_url", "url"];

pub struct PhotogrammetryAdapter {
    client: reqwest::Client,
    config: PhotogrammetryConfig,
}

impl PhotogrammetryAdapter {
    pub fn new(config: PhotogrammetryConfig, timeout: Duration) -> Result<Self, ProviderError> {
        Ok(Self::with_client(http::build_client(timeout)?, config))
    }

    pub fn with_client(client: reqwest::Client, config: PhotogrammetryConfig) -> Self {
        Self { client, config }
    }

    fn request(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.config.api_key {
            Some(key) => builder.bearer_auth(key),
            None => builder,
        }
    }
}

#[async_trait]
impl ProviderAdapter for PhotogrammetryAdapter {
    fn provider(&self) -> Provider {
        Provider::Photogrammetry
    }

    fn check_inputs(&self, image_urls: &[String]) -> Result<(), ProviderError> {
        let count = image_urls.len();
        if count < self.config.min_images {
            return Err(ProviderError::Precondition(format!(
                "Photogrammetry requires at least {} images, got {count}",
                self.config.min_images
            )));
        }
        if count > self.config.max_images {
            return Err(ProviderError::Precondition(format!(
                "Photogrammetry accepts at most {} images, got {count}",
                self.config.max_images
            )));
        }
        Ok(())
    }

    async fn create_task(&self, request: &TaskRequest<'_>) -> Result<String, ProviderError> {
        self.check_inputs(request.image_urls)?;

        let body = json!({
            "images": request.image_urls,
            "options": {
                "target_polycount": request.options.target_polycount,
                "texture": true,
            },
        });

        let response = self
            .request(
                self.client
                    .post(http::join(&self.config.base_url, "tasks"))
                    .json(&body),
            )
            .send()
            .await?;

        let payload = http::parse_json(Provider::Photogrammetry, response).await?;
        http::id_from(payload.get("task_id"))
            .or_else(|| http::id_from(payload.get("data").and_then(|d| d.get("task_id"))))
            .or_else(|| http::id_from(payload.get("id")))
            .ok_or_else(|| {
                ProviderError::MalformedResponse(
                    "photogrammetry response has no task id (task_id, data.task_id, id)".into(),
                )
            })
    }

    async fn get_task_status(&self, task: &TaskRef<'_>) -> Result<Value, ProviderError> {
        let response = self
            .request(self.client.get(http::join(
                &self.config.base_url,
                &format!("tasks/{}", task.task_id),
            )))
            .send()
            .await?;

        http::parse_json(Provider::Photogrammetry, response).await
    }

    fn extract_result_url(&self, payload: &Value) -> Option<String> {
        [Some(payload), payload.get("data")]
            .into_iter()
            .flatten()
            .find_map(|obj| {
                ARCHIVE_KEYS
                    .iter()
                    .filter_map(|key| obj.get(*key))
                    .find_map(scan::first_url)
            })
            .or_else(|| scan::find_model_url(payload))
    }

    fn failure_fallback(&self) -> String {
        "Photogrammetry reconstruction failed".into()
    }

    fn artifact_kind(&self) -> ArtifactKind {
        ArtifactKind::Archive
    }
}
