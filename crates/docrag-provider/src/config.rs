//! Provider configuration

use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;
use docrag_core::{Error, Result};

/// Connection settings for one OpenAI-compatible endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EndpointConfig {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
}

/// Configuration for both provider clients
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub completion: EndpointConfig,
    pub embedding: EndpointConfig,
    /// Inputs longer than this many characters are truncated before embedding.
    pub embedding_max_token_size: usize,
    pub request_timeout_secs: u64,
}

impl ProviderConfig {
    pub const DEFAULT_COMPLETION_MODEL: &'static str = "deepseek-reasoner";
    pub const DEFAULT_COMPLETION_URL: &'static str = "https://api.deepseek.com/v1";
    pub const DEFAULT_EMBEDDING_MODEL: &'static str = "BAAI/bge-m3";
    pub const DEFAULT_EMBEDDING_URL: &'static str = "https://api.siliconflow.cn/v1";
    pub const DEFAULT_MAX_TOKEN_SIZE: usize = 8192;
    pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

    /// Create configuration from environment variables
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let completion_key = env::var("DEEPSEEK_API_KEY").map_err(|_| {
            Error::Configuration("DEEPSEEK_API_KEY environment variable not found".to_string())
        })?;

        let embedding_key = env::var("SILICONCLOUD_API_KEY").map_err(|_| {
            Error::Configuration("SILICONCLOUD_API_KEY environment variable not found".to_string())
        })?;

        let request_timeout_secs = match env::var("DOCRAG_REQUEST_TIMEOUT_SECS") {
            Ok(raw) => raw.parse().map_err(|_| {
                Error::Configuration(format!("DOCRAG_REQUEST_TIMEOUT_SECS is not a number: {raw}"))
            })?,
            Err(_) => Self::DEFAULT_TIMEOUT_SECS,
        };

        Ok(Self {
            completion: EndpointConfig {
                api_key: completion_key,
                model: env::var("DEEPSEEK_MODEL")
                    .unwrap_or_else(|_| Self::DEFAULT_COMPLETION_MODEL.to_string()),
                base_url: env::var("DEEPSEEK_BASE_URL")
                    .unwrap_or_else(|_| Self::DEFAULT_COMPLETION_URL.to_string()),
            },
            embedding: EndpointConfig {
                api_key: embedding_key,
                model: env::var("SILICONCLOUD_EMBEDDING_MODEL")
                    .unwrap_or_else(|_| Self::DEFAULT_EMBEDDING_MODEL.to_string()),
                base_url: env::var("SILICONCLOUD_BASE_URL")
                    .unwrap_or_else(|_| Self::DEFAULT_EMBEDDING_URL.to_string()),
            },
            embedding_max_token_size: Self::DEFAULT_MAX_TOKEN_SIZE,
            request_timeout_secs,
        })
    }

    /// Create configuration with explicit keys and default models/endpoints
    pub fn new(completion_key: String, embedding_key: String) -> Self {
        Self {
            completion: EndpointConfig {
                api_key: completion_key,
                model: Self::DEFAULT_COMPLETION_MODEL.to_string(),
                base_url: Self::DEFAULT_COMPLETION_URL.to_string(),
            },
            embedding: EndpointConfig {
                api_key: embedding_key,
                model: Self::DEFAULT_EMBEDDING_MODEL.to_string(),
                base_url: Self::DEFAULT_EMBEDDING_URL.to_string(),
            },
            embedding_max_token_size: Self::DEFAULT_MAX_TOKEN_SIZE,
            request_timeout_secs: Self::DEFAULT_TIMEOUT_SECS,
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
