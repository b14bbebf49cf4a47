//! Document Store and File Blob Store traits

use async_trait::async_trait;
use std::path::PathBuf;

use crate::{DocumentRecord, DocumentStatus, Result};

/// Trait for the document-status store
///
/// Maps a document identifier to its record. It is the source of truth for
/// which filename belongs to which indexed document.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Insert or replace a record. A new id gets the next sequence number;
    /// an existing id keeps its sequence number.
    async fn upsert(&self, record: DocumentRecord) -> Result<DocumentRecord>;

    /// Change the status (and chunk count) of an existing record.
    async fn set_status(&self, id: &str, status: DocumentStatus, chunk_count: usize) -> Result<()>;

    async fn get(&self, id: &str) -> Result<Option<DocumentRecord>>;

    /// Remove a record, returning whether it existed.
    async fn remove(&self, id: &str) -> Result<bool>;

    /// All records ordered by insertion sequence.
    async fn list(&self) -> Result<Vec<DocumentRecord>>;

    /// First record (by sequence) using `filename`.
    async fn find_by_filename(&self, filename: &str) -> Result<Option<DocumentRecord>> {
        Ok(self.list().await?.into_iter().find(|r| r.filename == filename))
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.list().await?.len())
    }
}

/// Trait for raw file storage keyed by user-facing filename
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Write `bytes` under `filename`, overwriting any previous content.
    async fn put(&self, filename: &str, bytes: &[u8]) -> Result<PathBuf>;

    async fn get(&self, filename: &str) -> Result<Option<Vec<u8>>>;

    /// Remove a blob. Absent blobs are not an error; returns whether one existed.
    async fn remove(&self, filename: &str) -> Result<bool>;

    /// All stored filenames, sorted.
    async fn list(&self) -> Result<Vec<String>>;

    async fn count(&self) -> Result<usize> {
        Ok(self.list().await?.len())
    }
}
