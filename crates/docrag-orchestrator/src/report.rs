//! Structured results of orchestrator operations

use chrono::{DateTime, Utc};
use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};
use uuid::Uuid;

use docrag_core::{DocumentEntry, Error};

/// Errors appear in reports as `{ kind, message }`.
fn serialize_error<S: Serializer>(error: &Error, serializer: S) -> Result<S::Ok, S::Error> {
    let mut state = serializer.serialize_struct("Error", 2)?;
    state.serialize_field("kind", error.kind())?;
    state.serialize_field("message", &error.to_string())?;
    state.end()
}

/// One file that could not be ingested, and why.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileFailure {
    pub filename: String,
    #[serde(serialize_with = "serialize_error")]
    pub error: Error,
}

/// What happened to the files of a batch that reached the index.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum BatchOutcome {
    /// Files were indexed and the summary query answered.
    Summarized { filenames: Vec<String>, summary: String },
    /// Files were indexed but the summary query failed.
    IndexedWithoutSummary {
        filenames: Vec<String>,
        #[serde(serialize_with = "serialize_error")]
        error: Error,
    },
    /// Nothing from this batch is in the index.
    NotIndexed {
        #[serde(serialize_with = "serialize_error")]
        error: Error,
    },
}

impl BatchOutcome {
    pub fn indexed_filenames(&self) -> &[String] {
        match self {
            BatchOutcome::Summarized { filenames, .. }
            | BatchOutcome::IndexedWithoutSummary { filenames, .. } => filenames,
            BatchOutcome::NotIndexed { .. } => &[],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchReport {
    pub batch_id: Uuid,
    /// Position of the batch in the submitted file list.
    pub index: usize,
    /// Filenames submitted in this batch, in order.
    pub filenames: Vec<String>,
    pub outcome: BatchOutcome,
    /// Files rejected before the index insert.
    pub failures: Vec<FileFailure>,
}

/// Result of one `ingest` call, one entry per batch in submission order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct IngestReport {
    pub batches: Vec<BatchReport>,
}

impl IngestReport {
    pub fn indexed_filenames(&self) -> Vec<String> {
        self.batches
            .iter()
            .flat_map(|b| b.outcome.indexed_filenames().iter().cloned())
            .collect()
    }

    pub fn failures(&self) -> impl Iterator<Item = &FileFailure> {
        self.batches.iter().flat_map(|b| b.failures.iter())
    }

    /// True when every submitted file was indexed and every summary answered.
    pub fn is_complete_success(&self) -> bool {
        self.batches
            .iter()
            .all(|b| b.failures.is_empty() && matches!(b.outcome, BatchOutcome::Summarized { .. }))
    }
}

/// Result of deleting one document by filename.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeleteOutcome {
    pub id: String,
    pub filename: String,
    /// The index still held the document.
    pub index_deleted: bool,
    /// The blob still existed.
    pub blob_removed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "message", rename_all = "snake_case")]
pub enum ProviderStatus {
    Ok,
    Error(String),
}

impl ProviderStatus {
    pub fn is_ok(&self) -> bool {
        matches!(self, ProviderStatus::Ok)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    Ok,
    LlmError,
    FileError,
}

/// How the Blob Store and the Document Store currently line up.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StoreAgreement {
    pub blob_count: usize,
    pub indexed_count: usize,
    pub pending_count: usize,
    pub failed_count: usize,
    /// Blobs no document refers to.
    pub orphan_blobs: Vec<String>,
    /// Documents whose blob is gone.
    pub missing_blobs: Vec<String>,
    /// Set when a store could not be read at all.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StoreAgreement {
    pub fn is_consistent(&self) -> bool {
        self.error.is_none() && self.orphan_blobs.is_empty() && self.missing_blobs.is_empty()
    }

    pub fn unavailable(error: &Error) -> Self {
        Self {
            error: Some(error.to_string()),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthReport {
    pub status: HealthStatus,
    pub checked_at: DateTime<Utc>,
    pub llm: ProviderStatus,
    pub embedding: ProviderStatus,
    /// Whether the index engine could be initialized.
    pub index: ProviderStatus,
    pub embedding_dimension: Option<usize>,
    pub stores: StoreAgreement,
    /// Indexed documents, present only when the stores agree.
    pub documents: Option<Vec<DocumentEntry>>,
}

impl HealthReport {
    /// Store disagreement outranks provider failures.
    pub fn overall(
        llm: &ProviderStatus,
        embedding: &ProviderStatus,
        index: &ProviderStatus,
        stores: &StoreAgreement,
    ) -> HealthStatus {
        if !stores.is_consistent() {
            HealthStatus::FileError
        } else if !(llm.is_ok() && embedding.is_ok() && index.is_ok()) {
            HealthStatus::LlmError
        } else {
            HealthStatus::Ok
        }
    }
}
