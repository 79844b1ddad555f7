use std::path::PathBuf;

use crate::auth::jwt::JwtConfig;

/// Default cap on images per job submission.
const DEFAULT_MAX_UPLOAD_IMAGES: usize = 32;
/// Default per-file upload limit (25 MiB).
const DEFAULT_MAX_UPLOAD_BYTES: usize = 25 * 1024 * 1024;

/// Server configuration loaded from environment variables.
///
/// All fields except the JWT secret have defaults suitable for local
/// development.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// Grace period for background work after the listener stops (default: `30`).
    pub shutdown_timeout_secs: u64,
    /// JWT token configuration.
    pub jwt: JwtConfig,
    /// Where uploads and delivered models live on disk and on the web.
    pub storage: StorageConfig,
    /// Most images accepted in one job submission.
    pub max_upload_images: usize,
    /// Largest single uploaded file, in bytes.
    pub max_upload_bytes: usize,
}

/// Local file storage served under `/files`.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Filesystem root (default: `./storage`).
    pub root: PathBuf,
    /// Public URL prefix that maps to `root`
    /// (default: `http://localhost:3000/files`).
    pub public_base_url: String,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                | Default                       |
    /// |------------------------|-------------------------------|
    /// | `HOST`                 | `0.0.0.0`                     |
    /// | `PORT`                 | `3000`                        |
    /// | `CORS_ORIGINS`         | `http://localhost:5173`       |
    /// | `REQUEST_TIMEOUT_SECS` | `30`                          |
    /// | `SHUTDOWN_TIMEOUT_SECS`| `30`                          |
    /// | `STORAGE_ROOT`         | `./storage`                   |
    /// | `PUBLIC_BASE_URL`      | `http://localhost:3000/files` |
    /// | `MAX_UPLOAD_IMAGES`    | `32`                          |
    /// | `MAX_UPLOAD_BYTES`     | `26214400`                    |
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        let port: u16 = std::env::var("PORT")
            .unwrap_or_else(|_| "3000".into())
            .parse()
            .expect("PORT must be a valid u16");

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs: u64 = std::env::var("REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("REQUEST_TIMEOUT_SECS must be a valid u64");

        let shutdown_timeout_secs: u64 = std::env::var("SHUTDOWN_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("SHUTDOWN_TIMEOUT_SECS must be a valid u64");

        let storage = StorageConfig {
            root: std::env::var("STORAGE_ROOT")
                .unwrap_or_else(|_| "./storage".into())
                .into(),
            public_base_url: std::env::var("PUBLIC_BASE_URL")
                .unwrap_or_else(|_| "http://localhost:3000/files".into()),
        };

        let max_upload_images: usize = std::env::var("MAX_UPLOAD_IMAGES")
            .unwrap_or_else(|_| DEFAULT_MAX_UPLOAD_IMAGES.to_string())
            .parse()
            .expect("MAX_UPLOAD_IMAGES must be a valid usize");

        let max_upload_bytes: usize = std::env::var("MAX_UPLOAD_BYTES")
            .unwrap_or_else(|_| DEFAULT_MAX_UPLOAD_BYTES.to_string())
            .parse()
            .expect("MAX_UPLOAD_BYTES must be a valid usize");

        let jwt = JwtConfig::from_env();

        Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            shutdown_timeout_secs,
            jwt,
            storage,
            max_upload_images,
            max_upload_bytes,
        }
    }

    /// Body limit for the job submission route: every image plus the
    /// optional texture guide at full size, with room for form fields.
    pub fn max_submission_bytes(&self) -> usize {
        self.max_upload_bytes
            .saturating_mul(self.max_upload_images + 1)
            .saturating_add(64 * 1024)
    }
}
