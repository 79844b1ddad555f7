//! Local filesystem storage with deterministic public URLs.

use std::path::{Path, PathBuf};

use tokio::fs;

/// Files under `root`, served publicly under `public_base_url`.
///
/// Keys are relative, slash-separated paths such as `models/job-7.glb`.
#[derive(Debug, Clone)]
pub struct LocalStore {
    root: PathBuf,
    public_base_url: String,
}

impl LocalStore {
    pub fn new(root: impl Into<PathBuf>, public_base_url: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            public_base_url: public_base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Public URL for a storage key.
    pub fn public_url(&self, key: &str) -> String {
        format!("{}/{}", self.public_base_url, key.trim_start_matches('/'))
    }

    /// Filesystem path for a storage key. Rejects keys that could escape the
    /// root.
    pub fn path_for(&self, key: &str) -> std::io::Result<PathBuf> {
        if key.is_empty() || key.starts_with('/') || key.split('/').any(|part| part == "..") {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("invalid storage key '{key}'"),
            ));
        }
        Ok(self.root.join(key))
    }

    /// Write `bytes` under `key` and return its public URL.
    ///
    /// Writes to a sibling `.part` file first and renames it into place, so a
    /// reader never sees a half-written artifact.
    pub async fn write(&self, key: &str, bytes: &[u8]) -> std::io::Result<String> {
        let path = self.path_for(key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let mut partial = path.clone().into_os_string();
        partial.push(".part");
        let partial = PathBuf::from(partial);

        fs::write(&partial, bytes).await?;
        fs::rename(&partial, &path).await?;
        Ok(self.public_url(key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn write_returns_public_url() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStore::new(dir.path(), "http://localhost:3000/files/");

        let url = store.write("models/job-1.glb", b"glTF").await.unwrap();

        assert_eq!(url, "http://localhost:3000/files/models/job-1.glb");
        let written = std::fs::read(dir.path().join("models/job-1.glb")).unwrap();
        assert_eq!(written, b"glTF");
        assert!(!dir.path().join("models/job-1.glb.part").exists());
    }

    #[test]
    fn traversal_keys_are_rejected() {
        let store = LocalStore::new("/srv/files", "http://h/files");
        assert!(store.path_for("../etc/passwd").is_err());
        assert!(store.path_for("/abs").is_err());
        assert!(store.path_for("uploads/a/../../x").is_err());
        assert!(store.path_for("uploads/a.png").is_ok());
    }
}
