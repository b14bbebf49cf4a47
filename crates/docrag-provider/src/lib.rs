//! Embedding and completion gateways for docrag
//!
//! Production clients talk to OpenAI-compatible HTTP endpoints; the stubs are
//! deterministic stand-ins with the same traits.

mod completion;
mod config;
mod embedding;
mod stub;


pub use completion::OpenAiCompletionClient;
pub use config::{EndpointConfig, ProviderConfig};
pub use embedding::OpenAiEmbeddingClient;
pub use stub::{StubCompletion, StubEmbedding};

// Re-export core types for convenience
pub use docrag_core::{CompletionGateway, EmbeddingGateway, Error, Result};

/// Build both production clients from one configuration.
pub fn build_clients(config: &ProviderConfig) -> Result<(OpenAiEmbeddingClient, OpenAiCompletionClient)> {
    let embedding = OpenAiEmbeddingClient::new(
        config.embedding.clone(),
        config.embedding_max_token_size,
        config.request_timeout(),
    )?;
    let completion = OpenAiCompletionClient::new(config.completion.clone(), config.request_timeout())?;
    Ok((embedding, completion))
}
