//! Hybrid scoring: keyword query building, rank normalisation and score fusion.
//!
//! Everything here is pure; the manager feeds it candidates from the store.

use std::collections::HashMap;

use serde::Serialize;

/// A ranked memory snippet returned to callers.
#[derive(Debug, Clone, Serialize)]
pub struct SearchResult {
    pub path: String,
    pub start_line: usize,
    pub end_line: usize,
    /// Fused score in `[0, 1]`.
    pub score: f32,
    pub vector_score: f32,
    pub text_score: f32,
    pub snippet: String,
    /// `path#Lstart-Lend`
    pub citation: String,
}

/// A candidate produced by one retrieval path.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub id: String,
    pub path: String,
    pub start_line: usize,
    pub end_line: usize,
    pub text: String,
    pub score: f32,
}

/// A candidate after fusion, before filtering and truncation.
#[derive(Debug, Clone)]
pub struct FusedCandidate {
    pub id: String,
    pub path: String,
    pub start_line: usize,
    pub end_line: usize,
    pub text: String,
    pub vector_score: f32,
    pub text_score: f32,
    pub score: f32,
}

/// Relative weights of the two retrieval paths.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FusionWeights {
    pub vector: f32,
    pub text: f32,
}

impl FusionWeights {
    pub fn new(vector: f32, text: f32) -> Self {
        Self { vector, text }
    }

    /// Only the keyword path can contribute.
    pub fn keyword_only() -> Self {
        Self::new(0.0, 1.0)
    }

    /// Only the vector path can contribute.
    pub fn vector_only() -> Self {
        Self::new(1.0, 0.0)
    }
}

impl Default for FusionWeights {
    fn default() -> Self {
        Self::new(0.7, 0.3)
    }
}

/// Build an FTS5 query requiring every word of `raw`: `"a" AND "b"`.
///
/// Returns `None` when the input has no word characters.
pub fn build_fts_query(raw: &str) -> Option<String> {
    let terms: Vec<String> = raw
        .split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .filter(|t| !t.is_empty())
        .map(|t| format!("\"{t}\""))
        .collect();
    if terms.is_empty() {
        return None;
    }
    Some(terms.join(" AND "))
}

/// Convert a full-text rank (lower is better) into a score in `(0, 1]`.
pub fn rank_to_score(rank: f64) -> f32 {
    let normalized = if rank.is_finite() {
        rank.max(0.0)
    } else {
        999.0
    };
    (1.0 / (1.0 + normalized)) as f32
}

/// Cosine similarity; `0.0` for mismatched lengths or zero vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}

/// Merge both candidate lists by chunk id and compute weighted scores.
///
/// A chunk missing from one side scores zero on that side. When both sides
/// carry it, the keyword text is kept since it contains the matched terms.
pub fn merge_hybrid(
    vector: Vec<Candidate>,
    keyword: Vec<Candidate>,
    weights: FusionWeights,
) -> Vec<FusedCandidate> {
    let mut by_id: HashMap<String, FusedCandidate> = HashMap::new();

    for c in vector {
        by_id.insert(c.id.clone(), FusedCandidate {
            id: c.id,
            path: c.path,
            start_line: c.start_line,
            end_line: c.end_line,
            text: c.text,
            vector_score: c.score,
            text_score: 0.0,
            score: 0.0,
        });
    }

    for c in keyword {
        match by_id.get_mut(&c.id) {
            Some(entry) => {
                entry.text_score = c.score;
                if !c.text.is_empty() {
                    entry.text = c.text;
                }
            },
            None => {
                by_id.insert(c.id.clone(), FusedCandidate {
                    id: c.id,
                    path: c.path,
                    start_line: c.start_line,
                    end_line: c.end_line,
                    text: c.text,
                    vector_score: 0.0,
                    text_score: c.score,
                    score: 0.0,
                });
            },
        }
    }

    let mut merged: Vec<FusedCandidate> = by_id
        .into_values()
        .map(|mut c| {
            c.score = weights.vector * c.vector_score + weights.text * c.text_score;
            c
        })
        .collect();
    sort_by_score(&mut merged);
    merged
}

/// Descending score, then path and line for a stable order among ties.
pub fn sort_by_score(items: &mut [FusedCandidate]) {
    items.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| a.path.cmp(&b.path))
            .then_with(|| a.start_line.cmp(&b.start_line))
    });
}

/// Cut `text` to at most `max_chars` characters.
pub fn truncate_snippet(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => text[..byte_idx].to_string(),
        None => text.to_string(),
    }
}

pub fn citation(path: &str, start_line: usize, end_line: usize) -> String {
    format!("{path}#L{start_line}-L{end_line}")
}

/// Filter by `min_score`, keep the top `max_results`, and shape the output.
pub fn finalize(
    fused: Vec<FusedCandidate>,
    min_score: f32,
    max_results: usize,
    snippet_max_chars: usize,
) -> Vec<SearchResult> {
    fused
        .into_iter()
        .filter(|c| c.score >= min_score)
        .take(max_results)
        .map(|c| SearchResult {
            citation: citation(&c.path, c.start_line, c.end_line),
            snippet: truncate_snippet(&c.text, snippet_max_chars),
            path: c.path,
            start_line: c.start_line,
            end_line: c.end_line,
            score: c.score.clamp(0.0, 1.0),
            vector_score: c.vector_score,
            text_score: c.text_score,
        })
        .collect()
}
