use std::time::Duration;

const DEFAULT_MAX_ARTIFACT_BYTES: u64 = 512 * 1024 * 1024;

/// Orchestration timing and limits, loaded once at startup.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Upper bound on a background dispatch. Also the age after which a job
    /// that still has no provider task is considered abandoned.
    pub dispatch_timeout: Duration,
    /// Timeout for artifact downloads.
    pub download_timeout: Duration,
    /// Largest artifact the materializer will download.
    pub max_artifact_bytes: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            dispatch_timeout: Duration::from_secs(120),
            download_timeout: Duration::from_secs(300),
            max_artifact_bytes: DEFAULT_MAX_ARTIFACT_BYTES,
        }
    }
}

impl PipelineConfig {
    /// Load from environment variables with defaults.
    ///
    /// | Env Var                 | Default |
    /// |-------------------------|---------|
    /// | `DISPATCH_TIMEOUT_SECS` | `120`   |
    /// | `DOWNLOAD_TIMEOUT_SECS` | `300`   |
    /// | `MAX_ARTIFACT_BYTES`    | 512 MiB |
    pub fn from_env() -> Self {
        let dispatch_timeout_secs: u64 = std::env::var("DISPATCH_TIMEOUT_SECS")
            .unwrap_or_else(|_| "120".into())
            .parse()
            .expect("DISPATCH_TIMEOUT_SECS must be a valid u64");

        let download_timeout_secs: u64 = std::env::var("DOWNLOAD_TIMEOUT_SECS")
            .unwrap_or_else(|_| "300".into())
            .parse()
            .expect("DOWNLOAD_TIMEOUT_SECS must be a valid u64");

        let max_artifact_bytes: u64 = std::env::var("MAX_ARTIFACT_BYTES")
            .ok()
            .map(|v| v.parse().expect("MAX_ARTIFACT_BYTES must be a valid u64"))
            .unwrap_or(DEFAULT_MAX_ARTIFACT_BYTES);

        Self {
            dispatch_timeout: Duration::from_secs(dispatch_timeout_secs),
            download_timeout: Duration::from_secs(download_timeout_secs),
            max_artifact_bytes,
        }
    }
}
