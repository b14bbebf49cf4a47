//! Persisted chunk vectors and the rankings run over them

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use crate::chunker::keywords;

/// A chunk together with its embedding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredChunk {
    pub id: String,
    pub doc_id: String,
    pub order: usize,
    pub text: String,
    pub tokens: usize,
    pub vector: Vec<f32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredDocument {
    pub id: String,
    /// Insertion sequence inside the index.
    pub seq: u64,
    pub chunks: Vec<StoredChunk>,
}

/// Everything written to `vdb_chunks.json`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IndexData {
    pub embedding_dim: usize,
    pub next_seq: u64,
    pub documents: BTreeMap<String, StoredDocument>,
}

impl IndexData {
    pub fn new(embedding_dim: usize) -> Self {
        Self {
            embedding_dim,
            next_seq: 1,
            documents: BTreeMap::new(),
        }
    }

    pub fn chunk_count(&self) -> usize {
        self.documents.values().map(|d| d.chunks.len()).sum()
    }

    fn all_chunks(&self) -> impl Iterator<Item = &StoredChunk> {
        self.documents.values().flat_map(|d| d.chunks.iter())
    }
}

/// A ranked chunk reference.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredChunk<'a> {
    pub chunk: &'a StoredChunk,
    pub score: f32,
}

/// Simple cosine similarity calculation
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}

fn sort_and_truncate(mut scored: Vec<ScoredChunk<'_>>, top_k: usize) -> Vec<ScoredChunk<'_>> {
    scored.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.chunk.id.cmp(&b.chunk.id))
    });
    scored.truncate(top_k);
    scored
}

/// Chunks ordered by cosine similarity to `query_vector`.
pub fn rank_dense<'a>(data: &'a IndexData, query_vector: &[f32], top_k: usize) -> Vec<ScoredChunk<'a>> {
    let scored = data
        .all_chunks()
        .map(|chunk| ScoredChunk {
            chunk,
            score: cosine_similarity(query_vector, &chunk.vector),
        })
        .collect();
    sort_and_truncate(scored, top_k)
}

/// Chunks ordered by BM25 over query keywords; chunks sharing no keyword are dropped.
pub fn rank_keyword<'a>(data: &'a IndexData, query: &str, top_k: usize) -> Vec<ScoredChunk<'a>> {
    const K1: f32 = 1.2;
    const B: f32 = 0.75;

    let mut terms = keywords(query);
    terms.sort();
    terms.dedup();
    if terms.is_empty() {
        return Vec::new();
    }

    let frequencies: Vec<(&StoredChunk, HashMap<String, usize>, usize)> = data
        .all_chunks()
        .map(|chunk| {
            let words = keywords(&chunk.text);
            let len = words.len();
            let mut tf = HashMap::new();
            for word in words {
                *tf.entry(word).or_insert(0) += 1;
            }
            (chunk, tf, len)
        })
        .collect();

    let n = frequencies.len() as f32;
    if n == 0.0 {
        return Vec::new();
    }
    let avg_len = frequencies.iter().map(|(_, _, len)| *len as f32).sum::<f32>() / n;

    let idf: HashMap<&str, f32> = terms
        .iter()
        .map(|term| {
            let df = frequencies.iter().filter(|(_, tf, _)| tf.contains_key(term)).count() as f32;
            (term.as_str(), ((n - df + 0.5) / (df + 0.5) + 1.0).ln())
        })
        .collect();

    let scored = frequencies
        .iter()
        .filter_map(|(chunk, tf, len)| {
            let mut score = 0.0;
            for term in &terms {
                if let Some(&count) = tf.get(term) {
                    let count = count as f32;
                    let norm = K1 * (1.0 - B + B * (*len as f32) / avg_len.max(1.0));
                    score += idf[term.as_str()] * count * (K1 + 1.0) / (count + norm);
                }
            }
            (score > 0.0).then_some(ScoredChunk { chunk: *chunk, score })
        })
        .collect();
    sort_and_truncate(scored, top_k)
}

/// Documents ranked by the similarity of their mean chunk vector, expanded
/// into their best chunks until `top_k` is filled.
pub fn rank_global<'a>(data: &'a IndexData, query_vector: &[f32], top_k: usize) -> Vec<ScoredChunk<'a>> {
    let mut documents: Vec<(&StoredDocument, f32)> = data
        .documents
        .values()
        .filter(|d| !d.chunks.is_empty())
        .map(|doc| {
            let mut centroid = vec![0.0f32; data.embedding_dim];
            for chunk in &doc.chunks {
                for (c, v) in centroid.iter_mut().zip(chunk.vector.iter()) {
                    *c += v;
                }
            }
            (doc, cosine_similarity(query_vector, &centroid))
        })
        .collect();
    documents.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

    let mut ranked = Vec::new();
    for (doc, _) in documents {
        let scored = doc
            .chunks
            .iter()
            .map(|chunk| ScoredChunk {
                chunk,
                score: cosine_similarity(query_vector, &chunk.vector),
            })
            .collect();
        for hit in sort_and_truncate(scored, top_k) {
            if ranked.len() >= top_k {
                return ranked;
            }
            ranked.push(hit);
        }
    }
    ranked
}

/// Reciprocal rank fusion of several rankings.
pub fn fuse_rankings<'a>(rankings: &[Vec<ScoredChunk<'a>>], top_k: usize) -> Vec<ScoredChunk<'a>> {
    const RRF_K: f32 = 60.0;

    let mut fused: HashMap<&str, ScoredChunk<'a>> = HashMap::new();
    for ranking in rankings {
        for (rank, hit) in ranking.iter().enumerate() {
            let contribution = 1.0 / (RRF_K + rank as f32 + 1.0);
            fused
                .entry(hit.chunk.id.as_str())
                .and_modify(|existing| existing.score += contribution)
                .or_insert(ScoredChunk {
                    chunk: hit.chunk,
                    score: contribution,
                });
        }
    }
    sort_and_truncate(fused.into_values().collect(), top_k)
}
