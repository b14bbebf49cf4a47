//! Embedding and completion provider traits

use async_trait::async_trait;

use crate::{ChatMessage, Error, Result};

/// Fixed sentence embedded to learn the provider's vector length.
pub const DIMENSION_PROBE_TEXT: &str = "This is a test sentence.";

/// Trait for embedding providers
///
/// Implementations call a remote model; tests substitute a deterministic stub.
#[async_trait]
pub trait EmbeddingGateway: Send + Sync {
    /// Model identifier, recorded next to the index.
    fn model_name(&self) -> &str;

    /// Embed a batch of texts, one vector per input, in input order.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Determine the output dimension by embedding [`DIMENSION_PROBE_TEXT`].
    ///
    /// This is a real provider call so a misconfigured model shows up at startup.
    async fn probe_dimension(&self) -> Result<usize> {
        let vectors = self.embed(&[DIMENSION_PROBE_TEXT.to_string()]).await?;
        match vectors.first() {
            Some(v) if !v.is_empty() => Ok(v.len()),
            Some(_) => Err(Error::ProviderUnavailable(
                "embedding provider returned an empty vector".to_string(),
            )),
            None => Err(Error::ProviderUnavailable(
                "embedding provider returned no vectors".to_string(),
            )),
        }
    }
}

/// Trait for LLM completion providers
#[async_trait]
pub trait CompletionGateway: Send + Sync {
    /// Model identifier being used
    fn model_name(&self) -> &str;

    /// Complete `prompt` given an optional system prompt and prior turns.
    async fn complete(
        &self,
        prompt: &str,
        system_prompt: Option<&str>,
        history: &[ChatMessage],
    ) -> Result<String>;
}
