//! Index engine configuration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Configuration for [`crate::LocalIndexEngine`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexConfig {
    /// Directory holding the chunk data and index metadata.
    pub working_dir: PathBuf,
    pub chunk_token_size: usize,
    pub chunk_overlap_token_size: usize,
    /// Chunks sent to the embedding provider per request.
    pub embedding_batch_num: usize,
    /// Embedding requests allowed in flight at once.
    pub embedding_max_async: usize,
    /// Token budget for retrieved context handed to the LLM.
    pub max_context_tokens: usize,
    /// Language the answer should be written in, if any.
    pub response_language: Option<String>,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            working_dir: PathBuf::from("./working"),
            chunk_token_size: 1024,
            chunk_overlap_token_size: 100,
            embedding_batch_num: 32,
            embedding_max_async: 16,
            max_context_tokens: 4000,
            response_language: None,
        }
    }
}

impl IndexConfig {
    pub fn with_working_dir(mut self, working_dir: impl Into<PathBuf>) -> Self {
        self.working_dir = working_dir.into();
        self
    }
}
