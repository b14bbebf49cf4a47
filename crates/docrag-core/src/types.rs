//! Common types used across docrag

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::Error;

/// Ingestion status of a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentStatus {
    /// Insertion into the index is in flight.
    Pending,
    /// Content is part of the queryable index.
    Indexed,
    /// Insertion failed and removing partial index data could not be confirmed.
    Failed,
}

impl fmt::Display for DocumentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DocumentStatus::Pending => "pending",
            DocumentStatus::Indexed => "indexed",
            DocumentStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Document Store value: identity, join key and status of one document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub id: String,
    pub filename: String,
    pub status: DocumentStatus,
    pub chunk_count: usize,
    pub content_length: usize,
    pub content_summary: String,
    /// Monotonic insertion sequence; listing order.
    pub seq: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DocumentRecord {
    const SUMMARY_CHARS: usize = 100;

    /// Build a pending record. `seq` is assigned by the store on first insert.
    pub fn pending(id: impl Into<String>, filename: impl Into<String>, content: &str) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            filename: filename.into(),
            status: DocumentStatus::Pending,
            chunk_count: 0,
            content_length: content.len(),
            content_summary: content.chars().take(Self::SUMMARY_CHARS).collect(),
            seq: 0,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn entry(&self) -> DocumentEntry {
        DocumentEntry {
            id: self.id.clone(),
            filename: self.filename.clone(),
            status: self.status,
            chunk_count: self.chunk_count,
        }
    }
}

/// One row of a document listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentEntry {
    pub id: String,
    pub filename: String,
    pub status: DocumentStatus,
    pub chunk_count: usize,
}

/// Retrieval strategy for a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryMode {
    /// Keyword ranking over chunks.
    Local,
    /// Dense ranking over whole documents, then their best chunks.
    Global,
    /// Keyword and dense rankings fused.
    #[default]
    Hybrid,
    /// Dense ranking over chunks.
    Naive,
}

impl QueryMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryMode::Local => "local",
            QueryMode::Global => "global",
            QueryMode::Hybrid => "hybrid",
            QueryMode::Naive => "naive",
        }
    }
}

impl fmt::Display for QueryMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QueryMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "local" => Ok(QueryMode::Local),
            "global" => Ok(QueryMode::Global),
            "hybrid" => Ok(QueryMode::Hybrid),
            "naive" => Ok(QueryMode::Naive),
            other => Err(Error::InvalidInput(format!("unknown query mode '{other}'"))),
        }
    }
}

/// Retrieval parameters of a query session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryParam {
    pub mode: QueryMode,
    pub top_k: usize,
}

impl QueryParam {
    pub fn new(mode: QueryMode, top_k: usize) -> Self {
        Self { mode, top_k }
    }
}

impl Default for QueryParam {
    fn default() -> Self {
        Self {
            mode: QueryMode::Hybrid,
            top_k: 60,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

/// A prior turn handed to the completion provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self { role: ChatRole::User, content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: ChatRole::Assistant, content: content.into() }
    }
}

/// Identity assigned by the Index Engine to one inserted text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InsertedDocument {
    pub id: String,
    pub chunk_count: usize,
}

/// An uploaded file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadFile {
    pub filename: String,
    pub bytes: Vec<u8>,
}

impl UploadFile {
    pub fn new(filename: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            filename: filename.into(),
            bytes: bytes.into(),
        }
    }
}
