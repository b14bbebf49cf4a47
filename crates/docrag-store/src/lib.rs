//! On-disk stores for docrag
//!
//! [`JsonDocumentStore`] keeps document identity and status;
//! [`FsBlobStore`] keeps the raw uploaded bytes.

mod blob_store;
mod document_store;
pub mod persist;

pub use blob_store::FsBlobStore;
pub use document_store::{DOC_STATUS_FILE, JsonDocumentStore};

// Re-export core types for convenience
pub use docrag_core::{BlobStore, DocumentRecord, DocumentStatus, DocumentStore, Error, Result};
