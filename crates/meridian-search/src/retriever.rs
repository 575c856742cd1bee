//! Hybrid retrieval: vector + full-text + tag filter, merged into one
//! explainable ranking (section 4.5 / C6 "Retriever").
//!
//! `HybridSearcher` (in `hybrid.rs`) already fuses the semantic and code
//! Qdrant collections into one vector candidate source; this module adds
//! the lexical (`fts.rs`) and tag (`tagging.rs`) sources on top and does
//! the final weighted merge the same way `hybrid.rs` fuses its two
//! embedding spaces — collect candidates, normalize each source's score
//! within the candidate set, combine with fixed weights.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::warn;

use crate::error::{Result, SearchError};
use crate::fts::FtsIndex;
use crate::hybrid::HybridSearcher;
use crate::tagging::TagStore;

const K_VECTOR: usize = 30;
const K_FTS: usize = 30;

const WEIGHT_VECTOR: f64 = 0.55;
const WEIGHT_FTS: f64 = 0.35;
const WEIGHT_TAG: f64 = 0.10;

/// `{path_glob?, languages?, tags_all?, tags_any?}` from the request shape.
#[derive(Debug, Clone, Default)]
pub struct RetrievalFilters {
    pub path_glob: Option<String>,
    pub languages: Option<Vec<String>>,
    pub tags_all: Option<Vec<String>>,
    pub tags_any: Option<Vec<String>>,
}

/// One ranked, explainable result.
#[derive(Debug, Clone)]
pub struct RetrievedChunk {
    pub chunk_id: String,
    pub file_path: String,
    pub start_line: u32,
    pub end_line: u32,
    pub content: String,
    pub final_score: f64,
    pub vec_rank: Option<usize>,
    pub vec_score: Option<f64>,
    pub fts_rank: Option<usize>,
    pub fts_score: Option<f64>,
    pub matched_tags: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct RetrievalResponse {
    pub results: Vec<RetrievedChunk>,
    /// Set when the vector candidate source failed and the response was
    /// served FTS-only (section 4.5 failure semantics).
    pub degraded: bool,
}

struct Candidate {
    file_path: String,
    start_line: u32,
    end_line: u32,
    content: String,
    vec_rank: Option<usize>,
    vec_score: Option<f64>,
    fts_rank: Option<usize>,
    fts_score: Option<f64>,
}

/// Combines a vector candidate source, a lexical candidate source, and
/// entity tags into one ranked, explainable result set.
///
/// `searcher` is shared (`Arc`) rather than owned so a caller that also
/// exposes the plain vector-only search path (e.g. `search_graph_nodes`)
/// can reuse the same connected `HybridSearcher` instead of paying for a
/// second Qdrant connection.
pub struct HybridRetriever {
    searcher: Arc<HybridSearcher>,
    fts: FtsIndex,
    tags: TagStore,
}

impl HybridRetriever {
    pub fn new(searcher: Arc<HybridSearcher>, fts: FtsIndex, tags: TagStore) -> Self {
        Self { searcher, fts, tags }
    }

    pub async fn retrieve(
        &self,
        query: &str,
        top_k: usize,
        filters: &RetrievalFilters,
        require_text_match: bool,
    ) -> Result<RetrievalResponse> {
        let vector_result = self.searcher.search(query, K_VECTOR).await;
        let fts_result = self.fts.search(query, K_FTS);

        let (vector_hits, vector_err) = match vector_result {
            Ok(hits) => (Some(hits), None),
            Err(e) => (None, Some(e.to_string())),
        };
        let (fts_hits, fts_err) = match fts_result {
            Ok(hits) => (Some(hits), None),
            Err(e) => (None, Some(e.to_string())),
        };

        if vector_hits.is_none() && fts_hits.is_none() {
            return Err(SearchError::RetrievalUnavailable {
                vector_error: vector_err.unwrap_or_else(|| "unavailable".into()),
                fts_error: fts_err.unwrap_or_else(|| "unavailable".into()),
            });
        }
        let degraded = vector_hits.is_none();
        if degraded {
            warn!(error = ?vector_err, "vector candidate source unavailable, serving FTS-only");
        }

        let mut candidates: HashMap<String, Candidate> = HashMap::new();

        for (rank, hit) in vector_hits.into_iter().flatten().enumerate() {
            candidates.insert(
                hit.entity_id.clone(),
                Candidate {
                    file_path: hit.file_path.clone(),
                    start_line: hit.line_range.0,
                    end_line: hit.line_range.1,
                    content: hit.code_snippet.clone(),
                    vec_rank: Some(rank + 1),
                    vec_score: Some(hit.combined_score as f64),
                    fts_rank: None,
                    fts_score: None,
                },
            );
        }

        for (rank, hit) in fts_hits.into_iter().flatten().enumerate() {
            // bm25() is lower-is-better; flip sign so "higher is better"
            // holds for every source going into the merge.
            let fts_score = -hit.bm25;
            candidates
                .entry(hit.entity_id.clone())
                .and_modify(|c| {
                    c.fts_rank = Some(rank + 1);
                    c.fts_score = Some(fts_score);
                })
                .or_insert(Candidate {
                    file_path: hit.file_path.clone(),
                    start_line: 0,
                    end_line: 0,
                    content: String::new(),
                    vec_rank: None,
                    vec_score: None,
                    fts_rank: Some(rank + 1),
                    fts_score: Some(fts_score),
                });
        }

        if require_text_match {
            candidates.retain(|_, c| c.fts_rank.is_some());
        }

        if let Some(glob) = &filters.path_glob {
            if let Ok(pattern) = glob_to_regex(glob) {
                candidates.retain(|_, c| pattern.is_match(&c.file_path));
            }
        }

        let ids: Vec<String> = candidates.keys().cloned().collect();
        let tag_map = self.tags.tags_for_entities(&ids).unwrap_or_default();

        let requested_tags: Vec<&str> = filters
            .tags_all
            .iter()
            .flatten()
            .chain(filters.tags_any.iter().flatten())
            .map(|s| s.as_str())
            .collect();

        let mut scored: Vec<(String, Candidate, Vec<String>, f64)> = Vec::new();
        for (id, candidate) in candidates {
            let entity_tags = tag_map.get(&id).cloned().unwrap_or_default();

            if let Some(tags_all) = &filters.tags_all {
                if !tags_all.iter().all(|t| entity_tags.contains(t)) {
                    continue;
                }
            }
            if let Some(tags_any) = &filters.tags_any {
                if !tags_any.is_empty() && !tags_any.iter().any(|t| entity_tags.contains(t)) {
                    continue;
                }
            }

            let matched_tags: Vec<String> = entity_tags
                .iter()
                .filter(|t| requested_tags.contains(&t.as_str()))
                .cloned()
                .collect();
            let tag_boost = if requested_tags.is_empty() {
                0.0
            } else {
                matched_tags.len() as f64 / requested_tags.len() as f64
            };

            scored.push((id, candidate, matched_tags, tag_boost));
        }

        let vec_bounds = min_max(scored.iter().filter_map(|(_, c, _, _)| c.vec_score));
        let fts_bounds = min_max(scored.iter().filter_map(|(_, c, _, _)| c.fts_score));

        let mut results: Vec<RetrievedChunk> = scored
            .into_iter()
            .map(|(id, c, matched_tags, tag_boost)| {
                let vec_norm = c.vec_score.map(|s| normalize(s, vec_bounds)).unwrap_or(0.0);
                let fts_norm = c.fts_score.map(|s| normalize(s, fts_bounds)).unwrap_or(0.0);
                let final_score = WEIGHT_VECTOR * vec_norm + WEIGHT_FTS * fts_norm + WEIGHT_TAG * tag_boost;
                RetrievedChunk {
                    chunk_id: id,
                    file_path: c.file_path,
                    start_line: c.start_line,
                    end_line: c.end_line,
                    content: c.content,
                    final_score,
                    vec_rank: c.vec_rank,
                    vec_score: c.vec_score,
                    fts_rank: c.fts_rank,
                    fts_score: c.fts_score,
                    matched_tags,
                }
            })
            .collect();

        results.sort_by(|a, b| b.final_score.partial_cmp(&a.final_score).unwrap_or(std::cmp::Ordering::Equal));
        results.truncate(top_k);

        Ok(RetrievalResponse { results, degraded })
    }
}

fn min_max(values: impl Iterator<Item = f64>) -> Option<(f64, f64)> {
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    let mut any = false;
    for v in values {
        any = true;
        min = min.min(v);
        max = max.max(v);
    }
    any.then_some((min, max))
}

/// `norm(x) = (x - min) / (max - min)`; undefined spread (no candidates,
/// or `max == min`) maps to 0, matching section 8's testable property.
fn normalize(x: f64, bounds: Option<(f64, f64)>) -> f64 {
    match bounds {
        Some((min, max)) if (max - min).abs() > f64::EPSILON => (x - min) / (max - min),
        _ => 0.0,
    }
}

fn glob_to_regex(glob: &str) -> std::result::Result<regex::Regex, regex::Error> {
    let mut pattern = String::from("^");
    for c in glob.chars() {
        match c {
            '*' => pattern.push_str(".*"),
            '?' => pattern.push('.'),
            '.' | '+' | '(' | ')' | '[' | ']' | '{' | '}' | '^' | '$' | '|' | '\\' => {
                pattern.push('\\');
                pattern.push(c);
            }
            other => pattern.push(other),
        }
    }
    pattern.push('$');
    regex::Regex::new(&pattern)
}
