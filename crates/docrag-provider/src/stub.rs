//! Deterministic in-process gateways for tests and offline runs

use async_trait::async_trait;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use docrag_core::{ChatMessage, CompletionGateway, EmbeddingGateway, Error, Result};

/// Hash-based embedding gateway.
///
/// The same text always maps to the same unit vector, and texts sharing words
/// land close together, which is enough for ranking tests. A dimension of
/// zero is raised to one.
pub struct StubEmbedding {
    dimension: AtomicUsize,
    failing: AtomicBool,
    calls: AtomicUsize,
}

impl StubEmbedding {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: AtomicUsize::new(dimension.max(1)),
            failing: AtomicBool::new(false),
            calls: AtomicUsize::new(0),
        }
    }

    /// Make every following call fail with `ProviderUnavailable`.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Simulate switching to a model with another output size.
    pub fn set_dimension(&self, dimension: usize) {
        self.dimension.store(dimension.max(1), Ordering::SeqCst);
    }

    /// Number of `embed` calls so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn vectorize(text: &str, dimension: usize) -> Vec<f32> {
        let normalized = text.to_lowercase();
        let words: Vec<&str> = normalized.split_whitespace().collect();
        let mut embedding = vec![0.0f32; dimension];

        for word in &words {
            let digest = md5::compute(word.as_bytes());
            let hash = u64::from_le_bytes([
                digest[0], digest[1], digest[2], digest[3], digest[4], digest[5], digest[6],
                digest[7],
            ]);
            let idx1 = (hash % dimension as u64) as usize;
            let idx2 = ((hash >> 32) % dimension as u64) as usize;
            embedding[idx1] += 1.0;
            embedding[idx2] += 0.5;
        }

        let magnitude: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
        if magnitude > 0.0 {
            for val in embedding.iter_mut() {
                *val /= magnitude;
            }
        } else {
            embedding[0] = 1.0;
        }
        embedding
    }
}

#[async_trait]
impl EmbeddingGateway for StubEmbedding {
    fn model_name(&self) -> &str {
        "stub-embedding"
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(Error::ProviderUnavailable("stub embedding is failing".to_string()));
        }
        let dimension = self.dimension.load(Ordering::SeqCst);
        Ok(texts.iter().map(|t| Self::vectorize(t, dimension)).collect())
    }
}

/// Completion gateway that answers from the prompt it receives.
///
/// The answer names the model and echoes the first line of the user prompt;
/// every system prompt is kept so tests can inspect retrieved context.
pub struct StubCompletion {
    failing: AtomicBool,
    system_prompts: Mutex<Vec<String>>,
}

impl StubCompletion {
    pub fn new() -> Self {
        Self {
            failing: AtomicBool::new(false),
            system_prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// System prompts received so far, oldest first.
    pub fn system_prompts(&self) -> Vec<String> {
        self.system_prompts
            .lock()
            .map(|prompts| prompts.clone())
            .unwrap_or_default()
    }
}

impl Default for StubCompletion {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CompletionGateway for StubCompletion {
    fn model_name(&self) -> &str {
        "stub-completion"
    }

    async fn complete(
        &self,
        prompt: &str,
        system_prompt: Option<&str>,
        _history: &[ChatMessage],
    ) -> Result<String> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(Error::ProviderUnavailable("stub completion is failing".to_string()));
        }
        if let (Some(system), Ok(mut prompts)) = (system_prompt, self.system_prompts.lock()) {
            prompts.push(system.to_string());
        }
        let first_line = prompt.lines().next().unwrap_or_default();
        Ok(format!("[stub-completion] {first_line}"))
    }
}
