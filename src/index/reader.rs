//! Interfaces to the storage layer.
//!
//! The matching engine never owns index data. It reads statistics through
//! [`Searcher`], per-segment postings through [`SegmentReader`], and walks
//! each posting list with a [`PostingListCursor`]. Segments are immutable
//! once committed, so readers need no locking.

use std::fmt::Debug;
use std::sync::Arc;

use crate::document::FieldValue;
use crate::error::Result;
use crate::schema::Schema;

/// Document id reported by cursors and matchers once they are exhausted.
pub const NO_MORE_DOCS: u64 = u64::MAX;

/// Index-wide statistics consulted while compiling a query.
pub trait Searcher: Send + Sync {
    /// The schema of the index.
    fn schema(&self) -> &Schema;

    /// Number of documents containing `term` in `field` (0 if absent).
    fn doc_freq(&self, field: &str, term: &str) -> u64;

    /// One more than the largest document id in the index.
    fn max_doc(&self) -> u64;

    /// Decoded length norm of `field` for a document (1.0 if not stored).
    fn field_length_norm(&self, doc_id: u64, field: &str) -> f32;
}

/// Read access to one immutable segment.
pub trait SegmentReader: Send + Sync + Debug {
    /// Segment name.
    fn name(&self) -> &str;

    /// One more than the largest document id in this segment.
    fn max_doc(&self) -> u64;

    /// Number of documents in this segment containing the term.
    fn doc_freq(&self, field: &str, term: &str) -> u64;

    /// Open a cursor over a term's postings.
    ///
    /// An absent term yields a cursor that is exhausted on the first call.
    fn posting_list(&self, field: &str, term: &str) -> Result<Box<dyn PostingListCursor>>;

    /// One encoded length-norm byte per document, if the field keeps norms.
    fn field_norms(&self, field: &str) -> Option<Arc<[u8]>>;

    /// One value per document, if the field keeps doc values.
    fn doc_values(&self, field: &str) -> Option<Arc<[Option<FieldValue>]>>;
}

/// Forward-only cursor over one posting list.
///
/// A fresh cursor is unpositioned; the first `next` or `skip_to` moves it
/// onto the first entry. `skip_to` targets must never decrease.
pub trait PostingListCursor: Send + Debug {
    /// Current document id, [`NO_MORE_DOCS`] once exhausted.
    fn doc_id(&self) -> u64;

    /// Term frequency in the current document.
    fn freq(&self) -> u32;

    /// Ascending term positions in the current document.
    fn positions(&self) -> &[u32];

    /// Move to the next document.
    fn next(&mut self) -> Result<bool>;

    /// Move to the first document >= target.
    ///
    /// Stays put when already positioned at or past `target`.
    fn skip_to(&mut self, target: u64) -> Result<bool>;

    /// Number of documents in the posting list.
    fn cost(&self) -> u64;
}

/// Cursor over an absent term.
#[derive(Debug, Default)]
pub struct EmptyPostingCursor;

impl PostingListCursor for EmptyPostingCursor {
    fn doc_id(&self) -> u64 {
        NO_MORE_DOCS
    }

    fn freq(&self) -> u32 {
        0
    }

    fn positions(&self) -> &[u32] {
        &[]
    }

    fn next(&mut self) -> Result<bool> {
        Ok(false)
    }

    fn skip_to(&mut self, _target: u64) -> Result<bool> {
        Ok(false)
    }

    fn cost(&self) -> u64 {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_cursor() {
        let mut cursor = EmptyPostingCursor;
        assert_eq!(cursor.doc_id(), NO_MORE_DOCS);
        assert!(!cursor.next().unwrap());
        assert!(!cursor.skip_to(10).unwrap());
        assert!(cursor.positions().is_empty());
        assert_eq!(cursor.cost(), 0);
    }
}
