//! Prompt text for retrieval-augmented answers

use crate::vector_store::ScoredChunk;

/// Answer returned when retrieval finds nothing to ground a response on.
pub const FAIL_RESPONSE: &str = "Sorry, I'm not able to provide an answer to that question.";

/// Build the sources block from ranked chunks, stopping at `max_tokens`.
///
/// The first chunk is always kept so a single oversized chunk still yields context.
pub fn build_context(hits: &[ScoredChunk<'_>], max_tokens: usize) -> String {
    let mut context = String::new();
    let mut used = 0;

    for (i, hit) in hits.iter().enumerate() {
        if i > 0 && used + hit.chunk.tokens > max_tokens {
            break;
        }
        used += hit.chunk.tokens;
        context.push_str(&format!(
            "[{}] document {} (chunk {})\n{}\n\n",
            i + 1,
            hit.chunk.doc_id,
            hit.chunk.order,
            hit.chunk.text
        ));
    }

    context
}

pub fn system_prompt(context: &str, language: Option<&str>) -> String {
    let mut prompt = String::from(
        "You are a helpful assistant answering questions about the documents in the knowledge base.\n\
         Use only the sources below. If they do not contain the answer, say that you do not know.\n\
         Do not make anything up.\n",
    );
    if let Some(language) = language {
        prompt.push_str(&format!("Respond in {language}.\n"));
    }
    prompt.push_str("\n-----Sources-----\n");
    prompt.push_str(context);
    prompt
}
