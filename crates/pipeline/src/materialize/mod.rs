//! Turns a finished provider task into a locally served model file.
//!
//! Three paths, chosen by the adapter's [`ArtifactKind`]:
//! - `Model`: download the result URL as-is.
//! - `Archive`: download a zip, unpack it, find the geometry, convert to GLB.
//! - `Placeholder`: generate a stand-in cube without touching the network.
//!
//! Every artifact lands at `models/job-{id}.{ext}` in the [`LocalStore`].

mod archive;

use std::time::Duration;

use modelforge_core::types::DbId;
use modelforge_providers::scan;
use modelforge_providers::ArtifactKind;

use crate::mesh::placeholder;
use crate::storage::LocalStore;

/// Extension used when a URL does not reveal a usable one.
pub const DEFAULT_EXTENSION: &str = "glb";

/// Local file header signature of a zip archive.
const ZIP_MAGIC: &[u8] = b"PK\x03\x04";

/// Extensions accepted for directly downloaded models.
const DELIVERY_EXTENSIONS: &[&str] = &["glb", "gltf", "obj", "fbx", "usdz", "stl", "ply"];

#[derive(Debug, thiserror::Error)]
pub enum MaterializeError {
    #[error("no result URL found in provider payload")]
    NoResultUrl,

    #[error("artifact download failed with HTTP {status}")]
    Download { status: u16 },

    #[error("artifact download failed: {0}")]
    DownloadRequest(#[from] reqwest::Error),

    #[error("artifact exceeds the {limit} byte download limit")]
    TooLarge { limit: u64 },

    #[error("result is a zip archive, expected a model file")]
    UnexpectedArchive,

    #[error("could not decompress result archive: {0}")]
    Decompress(String),

    #[error("no .glb or .obj file found in result archive")]
    GeometryNotFound,

    #[error("mesh conversion failed: {0}")]
    Conversion(String),

    #[error("storage error: {0}")]
    Io(#[from] std::io::Error),
}

pub struct Materializer {
    client: reqwest::Client,
    storage: LocalStore,
    max_bytes: u64,
}

impl Materializer {
    pub fn new(
        storage: LocalStore,
        download_timeout: Duration,
        max_bytes: u64,
    ) -> Result<Self, MaterializeError> {
        let client = reqwest::Client::builder()
            .timeout(download_timeout)
            .build()?;
        Ok(Self::with_client(client, storage, max_bytes))
    }

    pub fn with_client(client: reqwest::Client, storage: LocalStore, max_bytes: u64) -> Self {
        Self {
            client,
            storage,
            max_bytes,
        }
    }

    pub fn storage(&self) -> &LocalStore {
        &self.storage
    }

    /// Materialize a job's artifact and return its public URL.
    pub async fn materialize(
        &self,
        job_id: DbId,
        kind: ArtifactKind,
        result_url: Option<&str>,
    ) -> Result<String, MaterializeError> {
        match kind {
            ArtifactKind::Placeholder => self.write_placeholder(job_id).await,
            ArtifactKind::Model => {
                let url = result_url.ok_or(MaterializeError::NoResultUrl)?;
                self.fetch_model(job_id, url).await
            }
            ArtifactKind::Archive => {
                let url = result_url.ok_or(MaterializeError::NoResultUrl)?;
                self.fetch_archive(job_id, url).await
            }
        }
    }

    /// Download a delivery-ready model and store it under the job's key.
    ///
    /// Zip archives are refused, whether the URL or the content gives them
    /// away; they would otherwise be served under a model extension.
    pub async fn fetch_model(&self, job_id: DbId, url: &str) -> Result<String, MaterializeError> {
        if scan::url_extension(url).as_deref() == Some("zip") {
            return Err(MaterializeError::UnexpectedArchive);
        }
        let bytes = self.download(url).await?;
        if bytes.starts_with(ZIP_MAGIC) {
            return Err(MaterializeError::UnexpectedArchive);
        }
        let key = model_key(job_id, &delivery_extension(url));
        let public_url = self.storage.write(&key, &bytes).await?;
        tracing::info!(job_id, bytes = bytes.len(), key = %key, "Model artifact stored");
        Ok(public_url)
    }

    /// Download a result archive, extract its geometry, and store it as GLB
    /// (or as the archive's own GLB when it ships one).
    pub async fn fetch_archive(&self, job_id: DbId, url: &str) -> Result<String, MaterializeError> {
        let bytes = self.download(url).await?;
        let work_dir = self.storage.path_for(&format!("tmp/job-{job_id}"))?;

        let converted = tokio::task::spawn_blocking(move || {
            let result = archive::extract_and_convert(&bytes, &work_dir);
            if let Err(e) = std::fs::remove_dir_all(&work_dir) {
                if e.kind() != std::io::ErrorKind::NotFound {
                    tracing::warn!(path = %work_dir.display(), error = %e, "Failed to clean archive work dir");
                }
            }
            result
        })
        .await
        .map_err(|e| MaterializeError::Conversion(format!("conversion task aborted: {e}")))??;

        let key = model_key(job_id, "glb");
        let public_url = self.storage.write(&key, &converted).await?;
        tracing::info!(job_id, bytes = converted.len(), key = %key, "Archive artifact converted and stored");
        Ok(public_url)
    }

    /// Generate and store the placeholder cube.
    pub async fn write_placeholder(&self, job_id: DbId) -> Result<String, MaterializeError> {
        let bytes = placeholder::placeholder_glb()
            .map_err(|e| MaterializeError::Conversion(e.to_string()))?;
        let key = model_key(job_id, DEFAULT_EXTENSION);
        Ok(self.storage.write(&key, &bytes).await?)
    }

    /// Fetch a URL into memory, refusing bodies over the size limit both by
    /// declared length and while streaming.
    async fn download(&self, url: &str) -> Result<Vec<u8>, MaterializeError> {
        let mut response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(MaterializeError::Download {
                status: status.as_u16(),
            });
        }

        let limit = self.max_bytes;
        if response.content_length().is_some_and(|len| len > limit) {
            return Err(MaterializeError::TooLarge { limit });
        }

        let mut bytes = Vec::new();
        while let Some(chunk) = response.chunk().await? {
            if (bytes.len() + chunk.len()) as u64 > limit {
                return Err(MaterializeError::TooLarge { limit });
            }
            bytes.extend_from_slice(&chunk);
        }
        Ok(bytes)
    }
}

fn model_key(job_id: DbId, ext: &str) -> String {
    format!("models/job-{job_id}.{ext}")
}

/// Extension for a downloaded model, from the URL path when recognisable.
pub fn delivery_extension(url: &str) -> String {
    scan::url_extension(url)
        .filter(|ext| DELIVERY_EXTENSIONS.contains(&ext.as_str()))
        .unwrap_or_else(|| DEFAULT_EXTENSION.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_from_url_path() {
        assert_eq!(delivery_extension("https://cdn/a/model.OBJ?sig=1"), "obj");
        assert_eq!(delivery_extension("https://cdn/a/model.glb"), "glb");
    }

    #[test]
    fn unknown_extension_defaults_to_glb() {
        assert_eq!(delivery_extension("https://cdn/a/download"), "glb");
        assert_eq!(delivery_extension("https://cdn/a/file.exe"), "glb");
    }

    #[test]
    fn keys_are_deterministic_per_job() {
        assert_eq!(model_key(42, "glb"), "models/job-42.glb");
    }
}
