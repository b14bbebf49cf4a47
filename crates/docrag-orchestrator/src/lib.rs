//! Retrieval orchestration for docrag
//!
//! The [`Orchestrator`] turns uploaded files into indexed documents and
//! answers queries against them. It owns the consistency of three stores
//! that do not share transactions: the raw blobs, the document records and
//! the index itself.

mod claims;
mod config;
mod extract;
mod init;
mod orchestrator;
mod report;

#[cfg(test)]
mod tests;

pub use config::OrchestratorConfig;
pub use extract::PlainTextExtractor;
pub use orchestrator::{EMBEDDING_PROBE_TEXT, LLM_PROBE_PROMPT, Orchestrator, OrchestratorBuilder};
pub use report::{
    BatchOutcome, BatchReport, DeleteOutcome, FileFailure, HealthReport, HealthStatus,
    IngestReport, ProviderStatus, StoreAgreement,
};

// Re-export core types for convenience
pub use docrag_core::{
    DocumentEntry, DocumentStatus, Error, QueryMode, QueryParam, Result, UploadFile,
};
