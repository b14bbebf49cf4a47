//! Core traits and types for docrag
//!
//! This crate defines the capability-facing interfaces of the retrieval
//! orchestrator: embedding and completion gateways, the document and blob
//! stores, the index engine and text extraction. Concrete implementations
//! live in sibling crates so each can be swapped for a stub in tests.

pub mod error;
pub mod extract;
pub mod gateway;
pub mod index;
pub mod store;
pub mod types;

pub use error::{Error, Result};
pub use extract::TextExtractor;
pub use gateway::{CompletionGateway, DIMENSION_PROBE_TEXT, EmbeddingGateway};
pub use index::{IndexEngine, IndexEngineFactory};
pub use store::{BlobStore, DocumentStore};
pub use types::*;
