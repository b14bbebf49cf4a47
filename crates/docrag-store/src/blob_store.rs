//! Filesystem blob store

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::debug;

use docrag_core::{BlobStore, Error, Result};

/// Stores each upload as `<root>/<filename>`.
pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    /// Open (or create) the storage directory.
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        tokio::fs::create_dir_all(&root).await?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Reject names that would escape the storage directory.
    pub fn validate_filename(filename: &str) -> Result<()> {
        if filename.trim().is_empty() {
            return Err(Error::InvalidInput("filename is empty".to_string()));
        }
        if filename == "." || filename == ".." {
            return Err(Error::InvalidInput(format!("invalid filename '{filename}'")));
        }
        if filename.contains(['/', '\\', '\0']) {
            return Err(Error::InvalidInput(format!(
                "filename '{filename}' must not contain path separators"
            )));
        }
        Ok(())
    }

    fn path_for(&self, filename: &str) -> Result<PathBuf> {
        Self::validate_filename(filename)?;
        Ok(self.root.join(filename))
    }
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn put(&self, filename: &str, bytes: &[u8]) -> Result<PathBuf> {
        let path = self.path_for(filename)?;
        tokio::fs::write(&path, bytes).await?;
        debug!(path = %path.display(), bytes = bytes.len(), "stored blob");
        Ok(path)
    }

    async fn get(&self, filename: &str) -> Result<Option<Vec<u8>>> {
        let path = self.path_for(filename)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn remove(&self, filename: &str) -> Result<bool> {
        let path = self.path_for(filename)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn list(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.root).await?;
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_file() {
                continue;
            }
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
        names.sort();
        Ok(names)
    }
}
