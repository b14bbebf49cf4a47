//! Plain text extraction

use async_trait::async_trait;

use docrag_core::{Error, Result, TextExtractor};

const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

/// Accepts UTF-8 text files; anything that looks binary is rejected.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainTextExtractor;

#[async_trait]
impl TextExtractor for PlainTextExtractor {
    async fn extract(&self, filename: &str, bytes: &[u8]) -> Result<String> {
        let failed = |reason: &str| Error::ExtractionFailed {
            filename: filename.to_string(),
            reason: reason.to_string(),
        };

        let bytes = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
        if bytes.contains(&0) {
            return Err(failed("binary content"));
        }
        let text = std::str::from_utf8(bytes).map_err(|e| failed(&format!("not valid UTF-8: {e}")))?;
        if text.trim().is_empty() {
            return Err(failed("no text content"));
        }
        Ok(text.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_extracts_utf8_and_strips_bom() {
        let mut bytes = UTF8_BOM.to_vec();
        bytes.extend_from_slice("总页数: 12".as_bytes());
        let text = PlainTextExtractor.extract("a.txt", &bytes).await.unwrap();
        assert_eq!(text, "总页数: 12");
    }

    #[tokio::test]
    async fn test_rejects_binary_and_blank() {
        for bytes in [&b"\x89PNG\x00\x01"[..], &b"   \n"[..], &[0xff, 0xfe, 0x41][..]] {
            let result = PlainTextExtractor.extract("x.bin", bytes).await;
            assert!(
                matches!(result, Err(Error::ExtractionFailed { ref filename, .. }) if filename == "x.bin"),
                "{bytes:?} should not extract"
            );
        }
    }
}
