//! Index engine trait

use async_trait::async_trait;
use std::sync::Arc;

use crate::{CompletionGateway, EmbeddingGateway, InsertedDocument, QueryParam, Result};

/// Trait for the searchable index (chunking, embedding, hybrid retrieval).
///
/// Every operation may fail with a provider or storage error; callers turn
/// those into typed results.
#[async_trait]
pub trait IndexEngine: Send + Sync {
    /// Vector dimension this index was built for.
    fn dimension(&self) -> usize;

    /// Identifier the engine assigns to `text` on insertion.
    fn document_id(&self, text: &str) -> String;

    /// Chunk, embed and index `texts` in one batch.
    ///
    /// Returns one entry per input, in input order. Either every text is
    /// indexed or none is.
    async fn insert(&self, texts: &[String]) -> Result<Vec<InsertedDocument>>;

    /// Remove a document and its chunks; `false` when it was not indexed.
    async fn delete_by_id(&self, id: &str) -> Result<bool>;

    /// Answer `text` from retrieved context.
    async fn query(&self, text: &str, param: &QueryParam) -> Result<String>;

    async fn document_count(&self) -> Result<usize>;

    async fn chunk_count(&self) -> Result<usize>;
}

/// Builds an [`IndexEngine`] once the embedding dimension is known.
#[async_trait]
pub trait IndexEngineFactory: Send + Sync {
    /// Fails with `DimensionMismatch` when persisted data was built at
    /// another dimension.
    async fn build(
        &self,
        dimension: usize,
        embedding: Arc<dyn EmbeddingGateway>,
        completion: Arc<dyn CompletionGateway>,
    ) -> Result<Arc<dyn IndexEngine>>;
}
