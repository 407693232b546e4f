//! Search execution across segments.

mod searcher;

pub use self::searcher::IndexSearcher;

use serde::{Deserialize, Serialize};

/// A ranked hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    /// Index-global document id.
    pub doc_id: u64,
    /// Relevance score.
    pub score: f32,
}

/// Results of a search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResults {
    /// The requested page of hits, best first.
    pub hits: Vec<SearchHit>,
    /// Number of documents that matched.
    pub total_hits: u64,
    /// Highest score among matching documents (0 when none matched).
    pub max_score: f32,
    /// Whether a document budget or deadline stopped collection early.
    pub truncated: bool,
}

impl SearchResults {
    /// Whether no hit was returned.
    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }

    /// Number of hits returned.
    pub fn len(&self) -> usize {
        self.hits.len()
    }
}
