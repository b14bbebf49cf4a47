//! Service configuration read from the environment

use std::env;
use std::path::PathBuf;

use docrag_core::{Error, Result};
use docrag_index::IndexConfig;
use docrag_orchestrator::OrchestratorConfig;

/// Where the service keeps its state, and how it batches work.
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceConfig {
    /// Document records and index data.
    pub working_dir: PathBuf,
    /// Uploaded files.
    pub storage_dir: PathBuf,
    pub response_language: Option<String>,
    pub orchestrator: OrchestratorConfig,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            working_dir: PathBuf::from("./working"),
            storage_dir: PathBuf::from("./file_storage"),
            response_language: None,
            orchestrator: OrchestratorConfig::default(),
        }
    }
}

impl ServiceConfig {
    /// Create configuration from environment variables
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        let mut config = Self::default();

        if let Ok(dir) = env::var("DOCRAG_WORKING_DIR") {
            config.working_dir = PathBuf::from(dir);
        }
        if let Ok(dir) = env::var("DOCRAG_STORAGE_DIR") {
            config.storage_dir = PathBuf::from(dir);
        }
        config.response_language = env::var("DOCRAG_RESPONSE_LANGUAGE").ok().filter(|l| !l.trim().is_empty());

        if let Ok(raw) = env::var("DOCRAG_BATCH_SIZE") {
            config.orchestrator.batch_size = parse_positive("DOCRAG_BATCH_SIZE", &raw)?;
        }
        if let Ok(raw) = env::var("DOCRAG_INSERT_TIMEOUT_SECS") {
            config.orchestrator.insert_timeout_secs = parse_positive("DOCRAG_INSERT_TIMEOUT_SECS", &raw)? as u64;
        }

        Ok(config)
    }

    pub fn index_config(&self) -> IndexConfig {
        IndexConfig {
            response_language: self.response_language.clone(),
            ..IndexConfig::default().with_working_dir(&self.working_dir)
        }
    }
}

fn parse_positive(name: &str, raw: &str) -> Result<usize> {
    match raw.trim().parse::<usize>() {
        Ok(value) if value > 0 => Ok(value),
        _ => Err(Error::Configuration(format!("{name} must be a positive integer, got '{raw}'"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_config_follows_service_config() {
        let config = ServiceConfig {
            working_dir: PathBuf::from("/tmp/docrag"),
            response_language: Some("English".to_string()),
            ..ServiceConfig::default()
        };
        let index = config.index_config();
        assert_eq!(index.working_dir, PathBuf::from("/tmp/docrag"));
        assert_eq!(index.response_language.as_deref(), Some("English"));
        assert_eq!(index.chunk_token_size, 1024);
    }

    #[test]
    fn test_parse_positive() {
        assert_eq!(parse_positive("X", " 12 ").unwrap(), 12);
        assert!(matches!(parse_positive("X", "0"), Err(Error::Configuration(_))));
        assert!(matches!(parse_positive("X", "ten"), Err(Error::Configuration(_))));
    }
}
