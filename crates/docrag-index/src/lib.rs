//! Local retrieval index for docrag
//!
//! Documents are split into overlapping token windows, embedded through an
//! [`EmbeddingGateway`] and stored as JSON under the working directory.
//! Queries rank chunks by keyword, by vector similarity or by both, and the
//! best chunks become the context of a completion request.

mod chunker;
mod config;
mod engine;
mod prompt;
mod vector_store;


pub use chunker::{TextChunk, chunk_by_tokens};
pub use config::IndexConfig;
pub use engine::{
    CHUNKS_FILE, INDEX_META_FILE, IndexMeta, LocalIndexEngine, LocalIndexFactory,
    compute_document_id,
};
pub use prompt::FAIL_RESPONSE;

// Re-export core types for convenience
pub use docrag_core::{
    CompletionGateway, EmbeddingGateway, Error, IndexEngine, IndexEngineFactory, InsertedDocument,
    QueryMode, QueryParam, Result,
};
