//! OpenAI-compatible chat completion client

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::timeout;
use tracing::debug;

use docrag_core::{ChatMessage, ChatRole, CompletionGateway, Error, Result};

use crate::config::EndpointConfig;

/// Completion gateway speaking the `/chat/completions` protocol
pub struct OpenAiCompletionClient {
    config: EndpointConfig,
    client: Client,
    request_timeout: Duration,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    stream: bool,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

impl OpenAiCompletionClient {
    /// Create a new completion client from endpoint configuration
    pub fn new(config: EndpointConfig, request_timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| Error::ProviderUnavailable(e.to_string()))?;

        Ok(Self {
            config,
            client,
            request_timeout,
        })
    }

    fn build_messages(
        prompt: &str,
        system_prompt: Option<&str>,
        history: &[ChatMessage],
    ) -> Vec<ChatMessage> {
        let mut messages = Vec::with_capacity(history.len() + 2);
        if let Some(system) = system_prompt {
            messages.push(ChatMessage {
                role: ChatRole::System,
                content: system.to_string(),
            });
        }
        messages.extend(history.iter().cloned());
        messages.push(ChatMessage::user(prompt));
        messages
    }

    /// Perform the actual completion request
    async fn perform_completion(&self, messages: Vec<ChatMessage>) -> Result<String> {
        let request_body = ChatRequest {
            model: &self.config.model,
            messages,
            stream: false,
        };

        let url = format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'));

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
                "completion request failed with status {}: {}",
                status, error_text
            )));
        }

        let data: ChatResponse = response
            .json()
            .await
            .map_err(|e| Error::ProviderUnavailable(format!("malformed completion response: {e}")))?;

        let answer = data
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .map(|content| content.trim().to_string())
            .unwrap_or_default();

        if answer.is_empty() {
            return Err(Error::ProviderUnavailable(
                "empty response from completion provider".to_string(),
            ));
        }

        Ok(answer)
    }
}

#[async_trait]
impl CompletionGateway for OpenAiCompletionClient {
    fn model_name(&self) -> &str {
        &self.config.model
    }

    async fn complete(
        &self,
        prompt: &str,
        system_prompt: Option<&str>,
        history: &[ChatMessage],
    ) -> Result<String> {
        let messages = Self::build_messages(prompt, system_prompt, history);
        debug!(model = %self.config.model, turns = messages.len(), "sending completion request");

        match timeout(self.request_timeout, self.perform_completion(messages)).await {
            Ok(result) => result,
            Err(_) => Err(Error::Timeout("completion request timed out".to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_messages_order() {
        let history = vec![ChatMessage::user("hi"), ChatMessage::assistant("hello")];
        let messages = OpenAiCompletionClient::build_messages("next?", Some("be brief"), &history);

        assert_eq!(messages.len(), 4);
        assert_eq!(messages[0].role, ChatRole::System);
        assert_eq!(messages[1].content, "hi");
        assert_eq!(messages[2].role, ChatRole::Assistant);
        assert_eq!(messages[3], ChatMessage::user("next?"));
    }

    #[test]
    fn test_build_messages_without_system_prompt() {
        let messages = OpenAiCompletionClient::build_messages("q", None, &[]);
        assert_eq!(messages, vec![ChatMessage::user("q")]);
    }

    #[test]
    fn test_parse_response_without_content() {
        let raw = r#"{"choices":[{"message":{"role":"assistant"}}]}"#;
        let data: ChatResponse = serde_json::from_str(raw).unwrap();
        assert!(data.choices[0].message.content.is_none());
    }
}
