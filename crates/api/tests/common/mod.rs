#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use modelforge_api::auth::jwt::{generate_access_token, JwtConfig};
use modelforge_api::config::{ServerConfig, StorageConfig};
use modelforge_api::router::build_app_router;
use modelforge_api::state::AppState;
use modelforge_api::ws::{WsJobPublisher, WsManager};
use modelforge_core::types::DbId;
use modelforge_db::store::MemoryJobStore;
use modelforge_pipeline::{LocalStore, Materializer, Orchestrator, PipelineConfig};
use modelforge_providers::{ProviderRegistry, ProvidersConfig};
use tempfile::TempDir;
use tower::ServiceExt;

pub const PUBLIC_BASE: &str = "http://localhost:3000/files";
pub const BOUNDARY: &str = "modelforge-test-boundary";

/// Smallest valid PNG: 1x1, 8-bit grayscale.
pub const TINY_PNG: &[u8] = &[
    0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44,
    0x52, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x00, 0x00, 0x00, 0x00, 0x3A,
    0x7E, 0x9B, 0x55, 0x00, 0x00, 0x00, 0x0A, 0x49, 0x44, 0x41, 0x54, 0x78, 0x9C, 0x63, 0x60,
    0x00, 0x00, 0x00, 0x02, 0x00, 0x01, 0x48, 0xAF, 0xA4, 0x71, 0x00, 0x00, 0x00, 0x00, 0x49,
    0x45, 0x4E, 0x44, 0xAE, 0x42, 0x60, 0x82,
];

/// Build a test `ServerConfig` with safe defaults and storage under `dir`.
pub fn test_config(dir: &TempDir) -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        shutdown_timeout_secs: 30,
        jwt: JwtConfig {
            secret: "test-secret-that-is-long-enough-for-hmac".to_string(),
            access_token_expiry_mins: 15,
        },
        storage: StorageConfig {
            root: dir.path().to_path_buf(),
            public_base_url: PUBLIC_BASE.to_string(),
        },
        max_upload_images: 4,
        max_upload_bytes: 64 * 1024,
    }
}

/// Everything a test needs besides the router itself.
pub struct TestApp {
    pub router: Router,
    pub config: ServerConfig,
    pub orchestrator: Arc<Orchestrator>,
    pub ws_manager: Arc<WsManager>,
    pub storage_dir: TempDir,
}

impl TestApp {
    /// A fresh router over the same state; `oneshot` consumes it.
    pub fn app(&self) -> Router {
        self.router.clone()
    }

    pub fn token(&self, user_id: DbId) -> String {
        generate_access_token(user_id, "user", &self.config.jwt).unwrap()
    }
}

/// Build the full application router over an in-memory job store, with only
/// the mock provider configured.
///
/// Uses the same [`build_app_router`] as `main.rs`, so tests exercise the
/// production middleware stack.
pub fn build_test_app() -> TestApp {
    let storage_dir = tempfile::tempdir().unwrap();
    let config = test_config(&storage_dir);
    let storage = LocalStore::new(&config.storage.root, &config.storage.public_base_url);
    let ws_manager = Arc::new(WsManager::new());

    let pipeline_config = PipelineConfig::default();
    let materializer = Arc::new(
        Materializer::new(
            storage.clone(),
            pipeline_config.download_timeout,
            pipeline_config.max_artifact_bytes,
        )
        .unwrap(),
    );
    let orchestrator = Arc::new(Orchestrator::new(
        Arc::new(MemoryJobStore::new()),
        ProviderRegistry::from_config(&ProvidersConfig::default()),
        materializer,
        Arc::new(WsJobPublisher::new(Arc::clone(&ws_manager))),
        pipeline_config,
    ));

    let state = AppState {
        config: Arc::new(config.clone()),
        orchestrator: Arc::clone(&orchestrator),
        ws_manager: Arc::clone(&ws_manager),
        storage,
    };

    TestApp {
        router: build_app_router(state, &config),
        config,
        orchestrator,
        ws_manager,
        storage_dir,
    }
}

// ---------------------------------------------------------------------------
// Request helpers
// ---------------------------------------------------------------------------

pub async fn get(app: Router, path: &str) -> Response<Body> {
    let request = Request::get(path).body(Body::empty()).unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn get_auth(app: Router, path: &str, token: &str) -> Response<Body> {
    let request = Request::get(path)
        .header("authorization", format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn post_multipart(app: Router, path: &str, token: &str, body: Vec<u8>) -> Response<Body> {
    let request = Request::post(path)
        .header("authorization", format!("Bearer {token}"))
        .header(
            "content-type",
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

// ---------------------------------------------------------------------------
// Multipart builder
// ---------------------------------------------------------------------------

/// Hand-rolled `multipart/form-data` body using [`BOUNDARY`].
#[derive(Default)]
pub struct Form {
    body: Vec<u8>,
}

impl Form {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(mut self, name: &str, value: &str) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
        self
    }

    pub fn file(mut self, name: &str, filename: &str, bytes: &[u8]) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"; filename=\"{filename}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
            )
            .as_bytes(),
        );
        self.body.extend_from_slice(bytes);
        self.body.extend_from_slice(b"\r\n");
        self
    }

    pub fn finish(mut self) -> Vec<u8> {
        self.body
            .extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
        self.body
    }
}
