//! JSON-backed document-status store

use async_trait::async_trait;
use chrono::Utc;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;
use tracing::debug;

use docrag_core::{DocumentRecord, DocumentStatus, DocumentStore, Error, Result};

use crate::persist::{read_json, write_json_atomic};

/// File name of the status store inside the working directory.
pub const DOC_STATUS_FILE: &str = "kv_store_doc_status.json";

struct State {
    records: BTreeMap<String, DocumentRecord>,
    next_seq: u64,
}

/// Document store persisted as one `id -> record` JSON object.
///
/// The file is readable without touching any vector data, so listing stays
/// cheap. Every mutation is written through before it becomes visible.
pub struct JsonDocumentStore {
    path: PathBuf,
    state: RwLock<State>,
}

impl JsonDocumentStore {
    /// Open (or create) the store under `working_dir`.
    pub async fn open(working_dir: impl AsRef<Path>) -> Result<Self> {
        let working_dir = working_dir.as_ref();
        tokio::fs::create_dir_all(working_dir).await?;
        let path = working_dir.join(DOC_STATUS_FILE);

        let records: BTreeMap<String, DocumentRecord> = read_json(&path).await?.unwrap_or_default();
        let next_seq = records.values().map(|r| r.seq).max().map_or(1, |max| max + 1);
        debug!(path = %path.display(), records = records.len(), "opened document store");

        Ok(Self {
            path,
            state: RwLock::new(State { records, next_seq }),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl DocumentStore for JsonDocumentStore {
    async fn upsert(&self, mut record: DocumentRecord) -> Result<DocumentRecord> {
        let mut state = self.state.write().await;
        let mut records = state.records.clone();
        let mut next_seq = state.next_seq;

        match records.get(&record.id) {
            Some(existing) => {
                record.seq = existing.seq;
                record.created_at = existing.created_at;
            }
            None => {
                record.seq = next_seq;
                next_seq += 1;
            }
        }
        record.updated_at = Utc::now();
        records.insert(record.id.clone(), record.clone());

        write_json_atomic(&self.path, &records).await?;
        state.records = records;
        state.next_seq = next_seq;
        Ok(record)
    }

    async fn set_status(&self, id: &str, status: DocumentStatus, chunk_count: usize) -> Result<()> {
        let mut state = self.state.write().await;
        let mut records = state.records.clone();
        let record = records
            .get_mut(id)
            .ok_or_else(|| Error::NotFound(format!("document '{id}'")))?;
        record.status = status;
        record.chunk_count = chunk_count;
        record.updated_at = Utc::now();

        write_json_atomic(&self.path, &records).await?;
        state.records = records;
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<DocumentRecord>> {
        Ok(self.state.read().await.records.get(id).cloned())
    }

    async fn remove(&self, id: &str) -> Result<bool> {
        let mut state = self.state.write().await;
        if !state.records.contains_key(id) {
            return Ok(false);
        }
        let mut records = state.records.clone();
        records.remove(id);

        write_json_atomic(&self.path, &records).await?;
        state.records = records;
        Ok(true)
    }

    async fn list(&self) -> Result<Vec<DocumentRecord>> {
        let state = self.state.read().await;
        let mut records: Vec<DocumentRecord> = state.records.values().cloned().collect();
        records.sort_by_key(|r| r.seq);
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str, filename: &str) -> DocumentRecord {
        DocumentRecord::pending(id, filename, "some content")
    }

    #[tokio::test]
    async fn test_list_preserves_insertion_order() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonDocumentStore::open(dir.path()).await.unwrap();

        // ids sort differently from insertion order on purpose
        store.upsert(record("doc-z", "first.txt")).await.unwrap();
        store.upsert(record("doc-a", "second.txt")).await.unwrap();
        store.upsert(record("doc-m", "third.txt")).await.unwrap();

        let names: Vec<String> = store.list().await.unwrap().into_iter().map(|r| r.filename).collect();
        assert_eq!(names, vec!["first.txt", "second.txt", "third.txt"]);
    }

    #[tokio::test]
    async fn test_upsert_keeps_sequence_of_existing_id() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonDocumentStore::open(dir.path()).await.unwrap();

        let first = store.upsert(record("doc-1", "a.txt")).await.unwrap();
        store.upsert(record("doc-2", "b.txt")).await.unwrap();
        let mut again = record("doc-1", "a.txt");
        again.status = DocumentStatus::Indexed;
        let updated = store.upsert(again).await.unwrap();

        assert_eq!(updated.seq, first.seq);
        assert_eq!(updated.created_at, first.created_at);
        assert_eq!(store.list().await.unwrap()[0].id, "doc-1");
    }

    #[tokio::test]
    async fn test_reopen_restores_records_and_sequence() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = JsonDocumentStore::open(dir.path()).await.unwrap();
            store.upsert(record("doc-1", "a.txt")).await.unwrap();
            store.set_status("doc-1", DocumentStatus::Indexed, 4).await.unwrap();
        }

        let store = JsonDocumentStore::open(dir.path()).await.unwrap();
        let loaded = store.get("doc-1").await.unwrap().unwrap();
        assert_eq!(loaded.status, DocumentStatus::Indexed);
        assert_eq!(loaded.chunk_count, 4);

        let next = store.upsert(record("doc-2", "b.txt")).await.unwrap();
        assert!(next.seq > loaded.seq);
    }

    #[tokio::test]
    async fn test_find_by_filename_and_remove() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonDocumentStore::open(dir.path()).await.unwrap();
        store.upsert(record("doc-1", "a.txt")).await.unwrap();

        assert_eq!(store.find_by_filename("a.txt").await.unwrap().unwrap().id, "doc-1");
        assert!(store.find_by_filename("missing.txt").await.unwrap().is_none());

        assert!(store.remove("doc-1").await.unwrap());
        assert!(!store.remove("doc-1").await.unwrap());
        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_set_status_unknown_id() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonDocumentStore::open(dir.path()).await.unwrap();
        let result = store.set_status("doc-x", DocumentStatus::Failed, 0).await;
        assert!(matches!(result, Err(Error::NotFound(_))));
    }

    #[tokio::test]
    async fn test_file_is_keyed_by_id() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonDocumentStore::open(dir.path()).await.unwrap();
        store.upsert(record("doc-1", "a.txt")).await.unwrap();

        let raw = tokio::fs::read_to_string(store.path()).await.unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["doc-1"]["filename"], "a.txt");
        assert_eq!(value["doc-1"]["status"], "pending");
    }
}
