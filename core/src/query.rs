use crate::error::{StorageError, StorageResult};
use crate::store::Store;
use crate::tokenizer::distinct_terms;
use crate::DocId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct Page {
    /// 1-based.
    pub number: usize,
    pub size: usize,
}

impl Default for Page {
    fn default() -> Self { Self { number: 1, size: 10 } }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
    pub doc_id: DocId,
    pub url: String,
    pub title: String,
    pub score: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SearchResults {
    pub keywords: Vec<String>,
    pub total_hits: usize,
    pub hits: Vec<SearchHit>,
}

/// Ranks documents for `query` by link authority.
///
/// Keywords are the distinct terms of the query. For each keyword found in
/// the lexicon, every document containing it adds its PageRank score to its
/// aggregate; unknown keywords contribute nothing and a document without a
/// score row counts as 0.0. Results are ordered by aggregate score
/// descending, then doc id ascending, and cut to `page`.
pub fn search(store: &Store, query: &str, page: Page) -> StorageResult<SearchResults> {
    let keywords: Vec<String> = distinct_terms(query).into_iter().collect();
    let mut aggregate: HashMap<DocId, f64> = HashMap::new();
    let mut ranks: HashMap<DocId, f64> = HashMap::new();

    for keyword in &keywords {
        let Some(word_id) = store.word_id(keyword)? else { continue };
        for doc_id in store.documents_for_word(word_id)? {
            let score = match ranks.get(&doc_id) {
                Some(&s) => s,
                None => {
                    let s = store.page_rank(doc_id)?.unwrap_or(0.0);
                    ranks.insert(doc_id, s);
                    s
                }
            };
            *aggregate.entry(doc_id).or_insert(0.0) += score;
        }
    }

    let mut scored: Vec<(DocId, f64)> = aggregate.into_iter().collect();
    scored.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
    let total_hits = scored.len();

    let size = page.size.max(1);
    let skip = page.number.max(1).saturating_sub(1).saturating_mul(size);
    let mut hits = Vec::new();
    for (doc_id, score) in scored.into_iter().skip(skip).take(size) {
        let meta = store
            .document(doc_id)?
            .ok_or_else(|| StorageError::GraphInconsistency(format!("inverted entry for unknown document {doc_id}")))?;
        hits.push(SearchHit { doc_id, url: meta.url, title: meta.title, score });
    }
    Ok(SearchResults { keywords, total_hits, hits })
}
