//! OpenAI-compatible embedding client

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::timeout;
use tracing::debug;

use docrag_core::{EmbeddingGateway, Error, Result};

use crate::config::EndpointConfig;

/// Embedding gateway speaking the `/embeddings` protocol
pub struct OpenAiEmbeddingClient {
    config: EndpointConfig,
    client: Client,
    max_token_size: usize,
    request_timeout: Duration,
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: Vec<String>,
    encoding_format: &'static str,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    index: usize,
    embedding: Vec<f32>,
}

impl OpenAiEmbeddingClient {
    pub fn new(config: EndpointConfig, max_token_size: usize, request_timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| Error::ProviderUnavailable(e.to_string()))?;

        Ok(Self {
            config,
            client,
            max_token_size,
            request_timeout,
        })
    }

    fn truncate(text: &str, max_chars: usize) -> String {
        text.chars().take(max_chars).collect()
    }

    /// Put vectors back into input order and check one arrived per input.
    fn order_vectors(mut data: Vec<EmbeddingData>, expected: usize) -> Result<Vec<Vec<f32>>> {
        if data.len() != expected {
            return Err(Error::ProviderUnavailable(format!(
                "embedding provider returned {} vectors for {} inputs",
                data.len(),
                expected
            )));
        }
        data.sort_by_key(|d| d.index);
        Ok(data.into_iter().map(|d| d.embedding).collect())
    }

    async fn perform_embedding(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let request_body = EmbeddingRequest {
            model: &self.config.model,
            input: texts
                .iter()
                .map(|t| Self::truncate(t, self.max_token_size))
                .collect(),
            encoding_format: "float",
        };

        let url = format!("{}/embeddings", self.config.base_url.trim_end_matches('/'));

        let response = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .bearer_auth(&self.config.api_key)
            .json(&request_body)
            .send()
            .await
            .map_err(|e| Error::ProviderUnavailable(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(Error::ProviderUnavailable(format!(
                "embedding request failed with status {}: {}",
                status, error_text
            )));
        }

        let data: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| Error::ProviderUnavailable(format!("malformed embedding response: {e}")))?;

        Self::order_vectors(data.data, texts.len())
    }
}

#[async_trait]
impl EmbeddingGateway for OpenAiEmbeddingClient {
    fn model_name(&self) -> &str {
        &self.config.model
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        debug!(model = %self.config.model, inputs = texts.len(), "sending embedding request");

        match timeout(self.request_timeout, self.perform_embedding(texts)).await {
            Ok(result) => result,
            Err(_) => Err(Error::Timeout("embedding request timed out".to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_vectors_by_index() {
        let raw = r#"{"data":[
            {"object":"embedding","index":1,"embedding":[0.0,1.0]},
            {"object":"embedding","index":0,"embedding":[1.0,0.0]}
        ]}"#;
        let data: EmbeddingResponse = serde_json::from_str(raw).unwrap();
        let vectors = OpenAiEmbeddingClient::order_vectors(data.data, 2).unwrap();
        assert_eq!(vectors, vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
    }

    #[test]
    fn test_order_vectors_count_mismatch() {
        let data = vec![EmbeddingData { index: 0, embedding: vec![1.0] }];
        let result = OpenAiEmbeddingClient::order_vectors(data, 3);
        assert!(matches!(result, Err(Error::ProviderUnavailable(_))));
    }

    #[test]
    fn test_truncate_counts_chars() {
        assert_eq!(OpenAiEmbeddingClient::truncate("你好世界", 2), "你好");
        assert_eq!(OpenAiEmbeddingClient::truncate("abc", 10), "abc");
    }
}
