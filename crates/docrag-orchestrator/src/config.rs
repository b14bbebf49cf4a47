//! Orchestrator configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Files handed to the index in one insert call.
    pub batch_size: usize,
    /// `top_k` of the summarization query issued after each batch.
    pub summary_top_k: usize,
    /// Batches allowed to run at the same time.
    pub max_concurrent_batches: usize,
    /// Upper bound for one batch insert, in seconds.
    pub insert_timeout_secs: u64,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            batch_size: 10,
            summary_top_k: 60,
            max_concurrent_batches: 4,
            insert_timeout_secs: 600,
        }
    }
}

impl OrchestratorConfig {
    pub fn insert_timeout(&self) -> Duration {
        Duration::from_secs(self.insert_timeout_secs)
    }
}
