//! Text extraction trait

use async_trait::async_trait;

use crate::Result;

/// Converts stored file bytes into plain text.
///
/// Failures are reported as `Error::ExtractionFailed` for that file only.
#[async_trait]
pub trait TextExtractor: Send + Sync {
    async fn extract(&self, filename: &str, bytes: &[u8]) -> Result<String>;
}
