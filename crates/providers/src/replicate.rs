//! Replicate prediction adapter.
//!
//! The configured model may be a bare version hash, an `owner/name` slug
//! (run through the model's own predictions endpoint), or
//! `owner/name:version`.

use std::time::Duration;

use async_trait::async_trait;
use modelforge_core::generation::TextureGuidance;
use modelforge_core::provider::Provider;
use serde_json::{json, Map, Value};

use crate::adapter::{ProviderAdapter, TaskRef, TaskRequest};
use crate::config::ReplicateConfig;
use crate::error::ProviderError;
use crate::{http, scan};

/// Keys checked, in order, when a prediction's output is an object.
const OUTPUT_KEYS: &[&str] = &["model_file", "glb", "mesh", "model"];

/// How a prediction is addressed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelRef {
    /// `POST /predictions` with `version`.
    Version(String),
    /// `POST /models/{owner}/{name}/predictions`.
    Slug { owner: String, name: String },
}

impl ModelRef {
    pub fn parse(model: &str) -> Result<Self, ProviderError> {
        let model = model.trim();
        if let Some((_, version)) = model.split_once(':') {
            if version.is_empty() {
                return Err(ProviderError::misconfigured(
                    Provider::Replicate,
                    "REPLICATE_MODEL has an empty version",
                ));
            }
            return Ok(ModelRef::Version(version.to_string()));
        }
        match model.split_once('/') {
            Some((owner, name)) if !owner.is_empty() && !name.is_empty() && !name.contains('/') => {
                Ok(ModelRef::Slug {
                    owner: owner.to_string(),
                    name: name.to_string(),
                })
            }
            Some(_) => Err(ProviderError::misconfigured(
                Provider::Replicate,
                format!("REPLICATE_MODEL '{model}' is not owner/name"),
            )),
            None if model.is_empty() => Err(ProviderError::misconfigured(
                Provider::Replicate,
                "REPLICATE_MODEL is empty",
            )),
            None => Ok(ModelRef::Version(model.to_string())),
        }
    }
}

pub struct ReplicateAdapter {
    client: reqwest::Client,
    config: ReplicateConfig,
    model: ModelRef,
}

impl ReplicateAdapter {
    pub fn new(config: ReplicateConfig, timeout: Duration) -> Result<Self, ProviderError> {
        Self::with_client(http::build_client(timeout)?, config)
    }

    pub fn with_client(
        client: reqwest::Client,
        config: ReplicateConfig,
    ) -> Result<Self, ProviderError> {
        let model = ModelRef::parse(&config.model)?;
        Ok(Self {
            client,
            config,
            model,
        })
    }

    /// Build the `input` object for a prediction.
    pub fn prediction_input(&self, request: &TaskRequest<'_>) -> Value {
        let mut input = Map::new();
        input.insert(
            self.config.image_field.clone(),
            json!(request.image_urls[0]),
        );
        if let Some(field) = &self.config.images_field {
            input.insert(field.clone(), json!(request.image_urls));
        }
        if let (Some(field), TextureGuidance::Prompt(prompt)) =
            (&self.config.prompt_field, request.options.texture_guidance())
        {
            input.insert(field.clone(), json!(prompt));
        }
        Value::Object(input)
    }
}

#[async_trait]
impl ProviderAdapter for ReplicateAdapter {
    fn provider(&self) -> Provider {
        Provider::Replicate
    }

    async fn create_task(&self, request: &TaskRequest<'_>) -> Result<String, ProviderError> {
        self.check_inputs(request.image_urls)?;
        let input = self.prediction_input(request);

        let (url, body) = match &self.model {
            ModelRef::Version(version) => (
                http::join(&self.config.base_url, "predictions"),
                json!({ "version": version, "input": input }),
            ),
            ModelRef::Slug { owner, name } => (
                http::join(
                    &self.config.base_url,
                    &format!("models/{owner}/{name}/predictions"),
                ),
                json!({ "input": input }),
            ),
        };

        tracing::debug!(url = %url, "Creating Replicate prediction");

        let response = self
            .client
            .post(url)
            .bearer_auth(&self.config.api_token)
            .json(&body)
            .send()
            .await?;

        let payload = http::parse_json(Provider::Replicate, response).await?;
        http::id_from(payload.get("id")).ok_or_else(|| {
            ProviderError::MalformedResponse("Replicate response has no prediction `id`".into())
        })
    }

    async fn get_task_status(&self, task: &TaskRef<'_>) -> Result<Value, ProviderError> {
        let response = self
            .client
            .get(http::join(
                &self.config.base_url,
                &format!("predictions/{}", task.task_id),
            ))
            .bearer_auth(&self.config.api_token)
            .send()
            .await?;

        http::parse_json(Provider::Replicate, response).await
    }

    fn extract_result_url(&self, payload: &Value) -> Option<String> {
        let output = payload.get("output")?;
        scan::first_url(output)
            .or_else(|| {
                let obj = output.as_object()?;
                OUTPUT_KEYS
                    .iter()
                    .filter_map(|key| obj.get(*key))
                    .find_map(|v| scan::first_url(v).or_else(|| scan::find_model_url(v)))
            })
            .or_else(|| scan::find_model_url(output))
    }

    fn extract_error_message(&self, payload: &Value) -> Option<String> {
        match payload.get("error") {
            Some(Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
            _ => scan::find_error_message(payload),
        }
    }

    fn failure_fallback(&self) -> String {
        "Replicate prediction failed".into()
    }
}
