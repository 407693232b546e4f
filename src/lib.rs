//! # Lance
//!
//! The query compilation, matching and scoring core of a full-text search
//! engine.
//!
//! ## Features
//!
//! - Immutable query trees with structural equality, `Display` and JSON
//! - Two-pass query compilation with query-wide weight normalization
//! - Leap-frog conjunctions, heap-merged disjunctions, exclusions and phrases
//! - Pluggable similarities (classic TF-IDF and BM25)
//! - Bounded top-K collection with multi-field sorting
//! - Parallel multi-segment search
//!
//! ## Example
//!
//! ```
//! use lance::prelude::*;
//!
//! let schema = Schema::new()
//!     .with_field("body", FieldDefinition::new(FieldType::Text))
//!     .unwrap();
//! let index = MemoryIndex::new(schema);
//! index
//!     .add_documents(vec![
//!         Document::builder().add_text("body", "the quick brown fox").build(),
//!         Document::builder().add_text("body", "the lazy dog").build(),
//!     ])
//!     .unwrap();
//!
//! let searcher = index.searcher(SearchConfig::default()).unwrap();
//! let query = Query::and(vec![Query::term("body", "quick"), Query::term("body", "fox")]);
//! let results = searcher.search(&query, None, 0, 10).unwrap();
//!
//! assert_eq!(results.total_hits, 1);
//! assert_eq!(results.hits[0].doc_id, 0);
//! ```

pub mod config;
pub mod document;
pub mod error;
pub mod index;
pub mod query;
pub mod registry;
pub mod schema;
pub mod search;
pub mod similarity;

pub mod prelude {
    pub use crate::config::SearchConfig;
    pub use crate::document::{Document, FieldValue};
    pub use crate::error::{LanceError, Result};
    pub use crate::index::memory::MemoryIndex;
    pub use crate::index::{NO_MORE_DOCS, Searcher, SegmentReader};
    pub use crate::query::{Matcher, Query, SortRule, SortSpec};
    pub use crate::schema::{FieldDefinition, FieldType, Schema};
    pub use crate::search::{IndexSearcher, SearchHit, SearchResults};
    pub use crate::similarity::{Bm25Similarity, LuceneSimilarity, Similarity};
}

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
