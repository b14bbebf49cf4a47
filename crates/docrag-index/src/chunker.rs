//! Token-window chunking

use regex::Regex;
use std::sync::LazyLock;

/// One token: a run of letters/digits, a single CJK character, or a single
/// punctuation mark.
static TOKEN_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"[\p{Han}\p{Hiragana}\p{Katakana}\p{Hangul}]",
        r"|[[\p{L}\p{N}_]--[\p{Han}\p{Hiragana}\p{Katakana}\p{Hangul}]]+",
        r"|[^\s\p{L}\p{N}_]",
    ))
    .expect("token pattern is valid")
});

/// A window of document text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextChunk {
    pub order: usize,
    pub text: String,
    pub tokens: usize,
}

/// Byte spans of every token in `text`.
pub fn token_spans(text: &str) -> Vec<(usize, usize)> {
    TOKEN_PATTERN
        .find_iter(text)
        .map(|m| (m.start(), m.end()))
        .collect()
}

/// Lowercased word tokens used for keyword ranking; punctuation is dropped.
pub fn keywords(text: &str) -> Vec<String> {
    TOKEN_PATTERN
        .find_iter(text)
        .map(|m| m.as_str())
        .filter(|t| t.chars().any(char::is_alphanumeric))
        .map(str::to_lowercase)
        .collect()
}

/// Split `text` into windows of `chunk_size` tokens overlapping by `overlap`.
///
/// Each window keeps the original text between its first and last token, so
/// whitespace and line breaks inside a chunk survive.
pub fn chunk_by_tokens(text: &str, chunk_size: usize, overlap: usize) -> Vec<TextChunk> {
    let spans = token_spans(text);
    if spans.is_empty() {
        return Vec::new();
    }

    let chunk_size = chunk_size.max(1);
    let step = chunk_size.saturating_sub(overlap).max(1);
    let mut chunks = Vec::new();
    let mut start = 0;

    while start < spans.len() {
        let end = (start + chunk_size).min(spans.len());
        let byte_start = spans[start].0;
        let byte_end = spans[end - 1].1;
        chunks.push(TextChunk {
            order: chunks.len(),
            text: text[byte_start..byte_end].to_string(),
            tokens: end - start,
        });

        if end >= spans.len() {
            break;
        }
        start += step;
    }

    chunks
}
