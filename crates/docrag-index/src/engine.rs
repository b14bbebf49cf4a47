//! Local index engine implementation

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::future::try_join_all;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{RwLock, Semaphore};
use tracing::{debug, info, warn};

use docrag_core::{
    CompletionGateway, EmbeddingGateway, Error, IndexEngine, IndexEngineFactory, InsertedDocument,
    QueryMode, QueryParam, Result,
};
use docrag_store::persist::{read_json, write_json_atomic};

use crate::chunker::{TextChunk, chunk_by_tokens};
use crate::config::IndexConfig;
use crate::prompt::{FAIL_RESPONSE, build_context, system_prompt};
use crate::vector_store::{
    IndexData, StoredChunk, StoredDocument, fuse_rankings, rank_dense, rank_global, rank_keyword,
};

pub const INDEX_META_FILE: &str = "index_meta.json";
pub const CHUNKS_FILE: &str = "vdb_chunks.json";

/// Facts about an index that must hold for its whole lifetime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexMeta {
    pub embedding_dim: usize,
    pub embedding_model: String,
    pub created_at: DateTime<Utc>,
}

/// `doc-` followed by the md5 of the trimmed content.
pub fn compute_document_id(text: &str) -> String {
    format!("doc-{:x}", md5::compute(text.trim().as_bytes()))
}

fn compute_chunk_id(doc_id: &str, chunk: &TextChunk) -> String {
    let key = format!("{}:{}:{}", doc_id, chunk.order, chunk.text);
    format!("chunk-{:x}", md5::compute(key.as_bytes()))
}

/// In-process index: token-window chunks, embedded through the gateway,
/// ranked by keyword, dense or fused retrieval, persisted as JSON.
pub struct LocalIndexEngine {
    config: IndexConfig,
    dimension: usize,
    embedding: Arc<dyn EmbeddingGateway>,
    completion: Arc<dyn CompletionGateway>,
    data: RwLock<IndexData>,
    data_path: PathBuf,
    embed_limit: Semaphore,
}

impl LocalIndexEngine {
    /// Open the index under `config.working_dir`, creating it on first use.
    ///
    /// Fails with `DimensionMismatch` when the stored index was built for
    /// another vector size.
    pub async fn open(
        config: IndexConfig,
        dimension: usize,
        embedding: Arc<dyn EmbeddingGateway>,
        completion: Arc<dyn CompletionGateway>,
    ) -> Result<Self> {
        if dimension == 0 {
            return Err(Error::InvalidInput("embedding dimension must be positive".to_string()));
        }
        tokio::fs::create_dir_all(&config.working_dir).await?;

        let meta_path = config.working_dir.join(INDEX_META_FILE);
        match read_json::<IndexMeta>(&meta_path).await? {
            Some(meta) => {
                if meta.embedding_dim != dimension {
                    return Err(Error::DimensionMismatch {
                        expected: meta.embedding_dim,
                        actual: dimension,
                    });
                }
                if meta.embedding_model != embedding.model_name() {
                    warn!(
                        stored = %meta.embedding_model,
                        current = %embedding.model_name(),
                        "embedding model changed but dimension matches"
                    );
                }
            }
            None => {
                let meta = IndexMeta {
                    embedding_dim: dimension,
                    embedding_model: embedding.model_name().to_string(),
                    created_at: Utc::now(),
                };
                write_json_atomic(&meta_path, &meta).await?;
            }
        }

        let data_path = config.working_dir.join(CHUNKS_FILE);
        let data = match read_json::<IndexData>(&data_path).await? {
            Some(data) if data.embedding_dim != dimension => {
                return Err(Error::DimensionMismatch {
                    expected: data.embedding_dim,
                    actual: dimension,
                });
            }
            Some(data) => data,
            None => IndexData::new(dimension),
        };

        info!(
            working_dir = %config.working_dir.display(),
            dimension,
            documents = data.documents.len(),
            "index engine ready"
        );

        let permits = config.embedding_max_async.max(1);
        Ok(Self {
            config,
            dimension,
            embedding,
            completion,
            data: RwLock::new(data),
            data_path,
            embed_limit: Semaphore::new(permits),
        })
    }

    fn check_dimension(&self, vector: &[f32]) -> Result<()> {
        if vector.len() != self.dimension {
            return Err(Error::DimensionMismatch {
                expected: self.dimension,
                actual: vector.len(),
            });
        }
        Ok(())
    }

    /// Embed `texts` in batches, with at most `embedding_max_async` requests in flight.
    async fn embed_chunks(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let batch_size = self.config.embedding_batch_num.max(1);
        let requests = texts.chunks(batch_size).map(|batch| async move {
            let _permit = self
                .embed_limit
                .acquire()
                .await
                .map_err(|e| Error::IndexOperationFailed(format!("semaphore error: {e}")))?;
            self.embedding.embed(batch).await
        });

        let vectors: Vec<Vec<f32>> = try_join_all(requests).await?.into_iter().flatten().collect();
        if vectors.len() != texts.len() {
            return Err(Error::ProviderUnavailable(format!(
                "embedding provider returned {} vectors for {} chunks",
                vectors.len(),
                texts.len()
            )));
        }
        for vector in &vectors {
            self.check_dimension(vector)?;
        }
        Ok(vectors)
    }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        let vectors = self.embed_chunks(&[text.to_string()]).await?;
        vectors
            .into_iter()
            .next()
            .ok_or_else(|| Error::ProviderUnavailable("empty embedding result".to_string()))
    }

    async fn commit(&self, data: &mut IndexData, next: IndexData) -> Result<()> {
        write_json_atomic(&self.data_path, &next)
            .await
            .map_err(|e| Error::IndexOperationFailed(format!("persisting index failed: {e}")))?;
        *data = next;
        Ok(())
    }
}

#[async_trait]
impl IndexEngine for LocalIndexEngine {
    fn dimension(&self) -> usize {
        self.dimension
    }

    fn document_id(&self, text: &str) -> String {
        compute_document_id(text)
    }

    async fn insert(&self, texts: &[String]) -> Result<Vec<InsertedDocument>> {
        let ids: Vec<String> = texts.iter().map(|t| compute_document_id(t)).collect();

        let already_indexed: HashSet<String> = {
            let data = self.data.read().await;
            ids.iter()
                .filter(|id| data.documents.contains_key(*id))
                .cloned()
                .collect()
        };

        let mut seen = HashSet::new();
        let mut planned: Vec<(String, Vec<TextChunk>)> = Vec::new();
        for (id, text) in ids.iter().zip(texts) {
            if already_indexed.contains(id) || !seen.insert(id.clone()) {
                debug!(doc_id = %id, "content already indexed, skipping");
                continue;
            }
            let chunks = chunk_by_tokens(
                text,
                self.config.chunk_token_size,
                self.config.chunk_overlap_token_size,
            );
            if chunks.is_empty() {
                return Err(Error::IndexOperationFailed(format!(
                    "document {id} has no indexable text"
                )));
            }
            planned.push((id.clone(), chunks));
        }

        let chunk_texts: Vec<String> = planned
            .iter()
            .flat_map(|(_, chunks)| chunks.iter().map(|c| c.text.clone()))
            .collect();
        let mut vectors = self.embed_chunks(&chunk_texts).await?.into_iter();

        let mut new_documents = Vec::with_capacity(planned.len());
        for (doc_id, chunks) in planned {
            let mut stored = Vec::with_capacity(chunks.len());
            for chunk in chunks {
                let vector = vectors.next().ok_or_else(|| {
                    Error::IndexOperationFailed("ran out of embedding vectors".to_string())
                })?;
                stored.push(StoredChunk {
                    id: compute_chunk_id(&doc_id, &chunk),
                    doc_id: doc_id.clone(),
                    order: chunk.order,
                    text: chunk.text,
                    tokens: chunk.tokens,
                    vector,
                });
            }
            new_documents.push((doc_id, stored));
        }

        let mut data = self.data.write().await;
        let mut next = data.clone();
        let mut added = 0;
        for (doc_id, chunks) in new_documents {
            if next.documents.contains_key(&doc_id) {
                continue;
            }
            let seq = next.next_seq;
            next.next_seq += 1;
            next.documents.insert(
                doc_id.clone(),
                StoredDocument {
                    id: doc_id,
                    seq,
                    chunks,
                },
            );
            added += 1;
        }
        if added > 0 {
            self.commit(&mut data, next).await?;
        }

        info!(inputs = texts.len(), added, chunks = chunk_texts.len(), "inserted documents");

        Ok(ids
            .into_iter()
            .map(|id| {
                let chunk_count = data.documents.get(&id).map_or(0, |d| d.chunks.len());
                InsertedDocument { id, chunk_count }
            })
            .collect())
    }

    async fn delete_by_id(&self, id: &str) -> Result<bool> {
        let mut data = self.data.write().await;
        if !data.documents.contains_key(id) {
            return Ok(false);
        }
        let mut next = data.clone();
        next.documents.remove(id);
        self.commit(&mut data, next).await?;
        info!(doc_id = %id, "deleted document from index");
        Ok(true)
    }

    async fn query(&self, text: &str, param: &QueryParam) -> Result<String> {
        if text.trim().is_empty() {
            return Err(Error::InvalidInput("query text is empty".to_string()));
        }
        let top_k = param.top_k.max(1);

        let query_vector = match param.mode {
            QueryMode::Local => None,
            _ => Some(self.embed_query(text).await?),
        };

        let (context, hits) = {
            let data = self.data.read().await;
            let hits = match (param.mode, query_vector.as_deref()) {
                (QueryMode::Local, _) => rank_keyword(&data, text, top_k),
                (QueryMode::Naive, Some(v)) => rank_dense(&data, v, top_k),
                (QueryMode::Global, Some(v)) => rank_global(&data, v, top_k),
                (QueryMode::Hybrid, Some(v)) => fuse_rankings(
                    &[rank_keyword(&data, text, top_k), rank_dense(&data, v, top_k)],
                    top_k,
                ),
                (_, None) => Vec::new(),
            };
            (build_context(&hits, self.config.max_context_tokens), hits.len())
        };

        debug!(mode = %param.mode, top_k, hits, "retrieved context");
        if hits == 0 {
            return Ok(FAIL_RESPONSE.to_string());
        }

        let system = system_prompt(&context, self.config.response_language.as_deref());
        self.completion.complete(text, Some(&system), &[]).await
    }

    async fn document_count(&self) -> Result<usize> {
        Ok(self.data.read().await.documents.len())
    }

    async fn chunk_count(&self) -> Result<usize> {
        Ok(self.data.read().await.chunk_count())
    }
}

/// Builds [`LocalIndexEngine`]s over one working directory.
pub struct LocalIndexFactory {
    config: IndexConfig,
}

impl LocalIndexFactory {
    pub fn new(config: IndexConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl IndexEngineFactory for LocalIndexFactory {
    async fn build(
        &self,
        dimension: usize,
        embedding: Arc<dyn EmbeddingGateway>,
        completion: Arc<dyn CompletionGateway>,
    ) -> Result<Arc<dyn IndexEngine>> {
        let engine = LocalIndexEngine::open(self.config.clone(), dimension, embedding, completion).await?;
        Ok(Arc::new(engine))
    }
}
