//! Shared fixtures for pipeline integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use modelforge_core::generation::GenerationOptions;
use modelforge_core::provider::Provider;
use modelforge_core::types::DbId;
use modelforge_db::store::MemoryJobStore;
use modelforge_pipeline::{
    JobPublisher, JobSummary, LocalStore, Materializer, Orchestrator, PipelineConfig,
};
use modelforge_providers::{
    scan, ArtifactKind, ProviderAdapter, ProviderError, ProviderRegistry, TaskRef, TaskRequest,
};
use serde_json::Value;
use tempfile::TempDir;

// ---------------------------------------------------------------------------
// Scripted adapter
// ---------------------------------------------------------------------------

/// What the next status poll returns.
#[derive(Debug, Clone)]
pub enum Poll {
    Payload(Value),
    /// Transport-level failure (HTTP 503 from the provider).
    Unavailable(String),
    /// Credentials rejected or missing at poll time.
    Misconfigured(String),
}

/// Adapter driven entirely by the test. Counts every "network" call.
pub struct ScriptedAdapter {
    provider: Provider,
    kind: ArtifactKind,
    min_images: usize,
    task_id: String,
    create_error: Option<String>,
    create_delay: Option<Duration>,
    poll: Mutex<Poll>,
    pub create_calls: AtomicUsize,
    pub status_calls: AtomicUsize,
    pub requests: Mutex<Vec<(Vec<String>, GenerationOptions)>>,
}

impl ScriptedAdapter {
    pub fn new(provider: Provider) -> Self {
        Self {
            provider,
            kind: ArtifactKind::Model,
            min_images: 1,
            task_id: "task-1".into(),
            create_error: None,
            create_delay: None,
            poll: Mutex::new(Poll::Payload(serde_json::json!({ "status": "starting" }))),
            create_calls: AtomicUsize::new(0),
            status_calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn min_images(mut self, n: usize) -> Self {
        self.min_images = n;
        self
    }

    pub fn task_id(mut self, id: &str) -> Self {
        self.task_id = id.into();
        self
    }

    pub fn failing_create(mut self, body: &str) -> Self {
        self.create_error = Some(body.into());
        self
    }

    pub fn slow_create(mut self, delay: Duration) -> Self {
        self.create_delay = Some(delay);
        self
    }

    pub fn set_poll(&self, poll: Poll) {
        *self.poll.lock().unwrap() = poll;
    }

    pub fn creates(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
    }

    pub fn polls(&self) -> usize {
        self.status_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProviderAdapter for ScriptedAdapter {
    fn provider(&self) -> Provider {
        self.provider
    }

    fn check_inputs(&self, image_urls: &[String]) -> Result<(), ProviderError> {
        if image_urls.len() < self.min_images {
            return Err(ProviderError::Precondition(format!(
                "Scripted provider requires at least {} images, got {}",
                self.min_images,
                image_urls.len()
            )));
        }
        Ok(())
    }

    async fn create_task(&self, request: &TaskRequest<'_>) -> Result<String, ProviderError> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        self.requests
            .lock()
            .unwrap()
            .push((request.image_urls.to_vec(), request.options.clone()));
        if let Some(delay) = self.create_delay {
            tokio::time::sleep(delay).await;
        }
        match &self.create_error {
            Some(body) => Err(ProviderError::Api {
                provider: self.provider,
                status: 400,
                body: body.clone(),
            }),
            None => Ok(self.task_id.clone()),
        }
    }

    async fn get_task_status(&self, _task: &TaskRef<'_>) -> Result<Value, ProviderError> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        let poll = self.poll.lock().unwrap().clone();
        match poll {
            Poll::Payload(value) => Ok(value),
            Poll::Unavailable(body) => Err(ProviderError::Api {
                provider: self.provider,
                status: 503,
                body,
            }),
            Poll::Misconfigured(reason) => Err(ProviderError::misconfigured(self.provider, reason)),
        }
    }

    fn extract_result_url(&self, payload: &Value) -> Option<String> {
        scan::find_model_url(payload)
    }

    fn artifact_kind(&self) -> ArtifactKind {
        self.kind
    }
}

// ---------------------------------------------------------------------------
// Recording publisher
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct RecordingPublisher {
    pub events: Mutex<Vec<(DbId, JobSummary)>>,
}

impl RecordingPublisher {
    pub fn count(&self) -> usize {
        self.events.lock().unwrap().len()
    }

    pub fn last(&self) -> Option<(DbId, JobSummary)> {
        self.events.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl JobPublisher for RecordingPublisher {
    async fn publish(&self, owner_id: DbId, summary: &JobSummary) {
        self.events.lock().unwrap().push((owner_id, summary.clone()));
    }
}

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

pub const OWNER: DbId = 7;
pub const PUBLIC_BASE: &str = "http://files.test";

pub struct Harness {
    pub orchestrator: Arc<Orchestrator>,
    pub store: Arc<MemoryJobStore>,
    pub publisher: Arc<RecordingPublisher>,
    pub storage_dir: TempDir,
}

pub fn harness(registry: ProviderRegistry) -> Harness {
    harness_with_config(registry, PipelineConfig::default())
}

pub fn harness_with_config(registry: ProviderRegistry, config: PipelineConfig) -> Harness {
    let storage_dir = tempfile::tempdir().unwrap();
    let storage = LocalStore::new(storage_dir.path(), PUBLIC_BASE);
    let materializer = Arc::new(
        Materializer::new(storage, Duration::from_secs(5), config.max_artifact_bytes).unwrap(),
    );
    let store = Arc::new(MemoryJobStore::new());
    let publisher = Arc::new(RecordingPublisher::default());

    let orchestrator = Arc::new(Orchestrator::new(
        store.clone(),
        registry,
        materializer,
        publisher.clone(),
        config,
    ));

    Harness {
        orchestrator,
        store,
        publisher,
        storage_dir,
    }
}

impl Harness {
    /// A second orchestrator over the same store and files, as after a
    /// restart with a different provider setup.
    pub fn restarted(&self, registry: ProviderRegistry) -> Arc<Orchestrator> {
        let storage = LocalStore::new(self.storage_dir.path(), PUBLIC_BASE);
        let materializer = Arc::new(
            Materializer::new(storage, Duration::from_secs(5), PipelineConfig::default().max_artifact_bytes)
                .unwrap(),
        );
        Arc::new(Orchestrator::new(
            self.store.clone(),
            registry,
            materializer,
            self.publisher.clone(),
            PipelineConfig::default(),
        ))
    }
}

pub fn images(n: usize) -> Vec<String> {
    (0..n).map(|i| format!("https://uploads.test/{i}.png")).collect()
}
