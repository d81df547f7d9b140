//! Fusion of vector similarity with lexical token overlap


use serde::Serialize;
use std::collections::HashSet;

/// A retrieved chunk with its scores
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResult {
    pub chunk_id: usize,
    pub raw_similarity: f32,
    /// Share of query tokens found in the chunk, in `[0, 1]`
    pub lexical_overlap: f32,
    pub combined_score: f32,
    pub text: String,
}

/// A neighbor ready for fusion
#[derive(Debug, Clone)]
pub struct Candidate {
    pub chunk_id: usize,
    pub similarity: f32,
    pub doc_tokens: HashSet<String>,
    pub text: String,
}

/// `|query ∩ doc| / |query|`, zero for an empty query
#[inline]
pub fn overlap_score(query_tokens: &HashSet<String>, doc_tokens: &HashSet<String>) -> f32 {
    if query_tokens.is_empty() {
        return 0.0;
    }
    let shared = query_tokens.intersection(doc_tokens).count();
    shared as f32 / query_tokens.len() as f32
}

/// Mean of the similarity and the lexical overlap
#[inline]
pub fn fuse(query_tokens: &HashSet<String>, similarity: f32, doc_tokens: &HashSet<String>) -> f32 {
    (similarity + overlap_score(query_tokens, doc_tokens)) / 2.0
}

/// Drop candidates under `threshold`, score the rest and order them by
/// combined score. Candidates must arrive best-similarity first; equal scores
/// keep that order.
#[inline]
pub fn rank(
    query_tokens: &HashSet<String>,
    candidates: Vec<Candidate>,
    threshold: f32,
) -> Vec<SearchResult> {
    let mut results: Vec<SearchResult> = candidates
        .into_iter()
        .filter(|candidate| candidate.similarity >= threshold)
        .map(|candidate| {
            let lexical_overlap = overlap_score(query_tokens, &candidate.doc_tokens);
            SearchResult {
                chunk_id: candidate.chunk_id,
                raw_similarity: candidate.similarity,
                lexical_overlap,
                combined_score: (candidate.similarity + lexical_overlap) / 2.0,
                text: candidate.text,
            }
        })
        .collect();

    sort_by_combined_score(&mut results);
    results
}

/// Stable descending sort on `combined_score`
#[inline]
pub fn sort_by_combined_score(results: &mut [SearchResult]) {
    results.sort_by(|a, b| b.combined_score.total_cmp(&a.combined_score));
}

/// Keep the best-scoring entry per chunk id, preserving first-seen order
#[inline]
pub fn dedup_best(results: Vec<SearchResult>) -> Vec<SearchResult> {
    let mut merged: Vec<SearchResult> = Vec::with_capacity(results.len());
    for result in results {
        match merged.iter_mut().find(|r| r.chunk_id == result.chunk_id) {
            Some(existing) if result.combined_score > existing.combined_score => {
                *existing = result;
            }
            Some(_) => {}
            None => merged.push(result),
        }
    }
    merged
}
