//! Matcher trait and leaf matchers.
//!
//! A matcher is a forward-only cursor over the ascending ids of the
//! documents a query matches within one segment, able to score the document
//! it is positioned on. Matchers start unpositioned; the first `next` or
//! `advance` moves onto the first match. Once exhausted, `doc_id` reports
//! [`NO_MORE_DOCS`].
//!
//! `advance` targets must never decrease between calls. Breaking that rule
//! is a bug in the caller and panics.

use std::fmt::Debug;
use std::sync::Arc;

use crate::error::Result;
use crate::index::{NO_MORE_DOCS, PostingListCursor};
use crate::similarity::Similarity;

/// Trait for document matchers.
pub trait Matcher: Send + Debug {
    /// Current document id; [`NO_MORE_DOCS`] once exhausted.
    ///
    /// Unspecified before the first `next` or `advance` (matchers here report 0).
    fn doc_id(&self) -> u64;

    /// Move to the next matching document after the current one.
    fn next(&mut self) -> Result<bool>;

    /// Move to the first matching document >= target.
    ///
    /// Does not move if already positioned at or past `target`.
    fn advance(&mut self, target: u64) -> Result<bool>;

    /// Score of the current document. Only meaningful while positioned.
    fn score(&self) -> f32;

    /// Upper bound on the number of documents this matcher can yield.
    fn cost(&self) -> u64;

    /// Check if this matcher is exhausted.
    fn is_exhausted(&self) -> bool {
        self.doc_id() == NO_MORE_DOCS
    }
}

/// Enforce the non-decreasing `advance` target contract.
#[inline]
pub(crate) fn check_target(last_target: &mut u64, target: u64) {
    assert!(
        target >= *last_target,
        "matcher advance target regressed from {} to {}",
        *last_target,
        target
    );
    *last_target = target;
}

/// Decode the length norm of `doc_id`, or 1.0 if the field keeps none.
#[inline]
pub(crate) fn length_norm(norms: &Option<Arc<[u8]>>, similarity: &dyn Similarity, doc_id: u64) -> f32 {
    match norms {
        Some(norms) => norms
            .get(doc_id as usize)
            .map(|&byte| similarity.decode_norm(byte))
            .unwrap_or(1.0),
        None => 1.0,
    }
}

/// A matcher that matches no documents.
#[derive(Debug, Default)]
pub struct NoMatchMatcher;

impl NoMatchMatcher {
    /// Create a new no-match matcher.
    pub fn new() -> Self {
        NoMatchMatcher
    }
}

impl Matcher for NoMatchMatcher {
    fn doc_id(&self) -> u64 {
        NO_MORE_DOCS
    }

    fn next(&mut self) -> Result<bool> {
        Ok(false)
    }

    fn advance(&mut self, _target: u64) -> Result<bool> {
        Ok(false)
    }

    fn score(&self) -> f32 {
        0.0
    }

    fn cost(&self) -> u64 {
        0
    }
}

/// A matcher that matches every document below `max_doc` with a fixed score.
#[derive(Debug)]
pub struct MatchAllMatcher {
    max_doc: u64,
    doc: u64,
    started: bool,
    score: f32,
    last_target: u64,
}

impl MatchAllMatcher {
    /// Create a matcher over `0..max_doc` scoring `score` everywhere.
    pub fn new(max_doc: u64, score: f32) -> Self {
        MatchAllMatcher {
            max_doc,
            doc: 0,
            started: false,
            score,
            last_target: 0,
        }
    }

    fn position(&mut self, doc: u64) -> bool {
        self.started = true;
        if doc >= self.max_doc {
            self.doc = NO_MORE_DOCS;
            false
        } else {
            self.doc = doc;
            true
        }
    }
}

impl Matcher for MatchAllMatcher {
    fn doc_id(&self) -> u64 {
        self.doc
    }

    fn next(&mut self) -> Result<bool> {
        if self.doc == NO_MORE_DOCS {
            return Ok(false);
        }
        let target = if self.started { self.doc + 1 } else { 0 };
        Ok(self.position(target))
    }

    fn advance(&mut self, target: u64) -> Result<bool> {
        check_target(&mut self.last_target, target);
        if self.doc == NO_MORE_DOCS {
            return Ok(false);
        }
        if self.started && self.doc >= target {
            return Ok(true);
        }
        Ok(self.position(target))
    }

    fn score(&self) -> f32 {
        self.score
    }

    fn cost(&self) -> u64 {
        self.max_doc
    }
}

/// A matcher over one term's posting list.
#[derive(Debug)]
pub struct TermMatcher {
    cursor: Box<dyn PostingListCursor>,
    weight: f32,
    similarity: Arc<dyn Similarity>,
    norms: Option<Arc<[u8]>>,
    last_target: u64,
}

impl TermMatcher {
    /// Create a term matcher.
    ///
    /// `weight` is the normalized term weight from the compiler; `norms`
    /// holds the field's encoded length norms, if any.
    pub fn new(
        cursor: Box<dyn PostingListCursor>,
        weight: f32,
        similarity: Arc<dyn Similarity>,
        norms: Option<Arc<[u8]>>,
    ) -> Self {
        TermMatcher {
            cursor,
            weight,
            similarity,
            norms,
            last_target: 0,
        }
    }

    /// Term frequency in the current document.
    pub fn freq(&self) -> u32 {
        self.cursor.freq()
    }
}

impl Matcher for TermMatcher {
    fn doc_id(&self) -> u64 {
        self.cursor.doc_id()
    }

    fn next(&mut self) -> Result<bool> {
        if self.cursor.doc_id() == NO_MORE_DOCS {
            return Ok(false);
        }
        self.cursor.next()
    }

    fn advance(&mut self, target: u64) -> Result<bool> {
        check_target(&mut self.last_target, target);
        self.cursor.skip_to(target)
    }

    fn score(&self) -> f32 {
        let doc_id = self.cursor.doc_id();
        self.weight
            * self.similarity.tf(self.cursor.freq() as f32)
            * length_norm(&self.norms, self.similarity.as_ref(), doc_id)
    }

    fn cost(&self) -> u64 {
        self.cursor.cost()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::index::memory::{Posting, PostingList};
    use crate::similarity::LuceneSimilarity;

    /// Unit-weight term matcher over the given doc ids.
    pub(crate) fn term(doc_ids: &[u64]) -> Box<dyn Matcher> {
        let list = Arc::new(PostingList::from_doc_ids(doc_ids).unwrap());
        Box::new(TermMatcher::new(
            Box::new(list.cursor()),
            1.0,
            Arc::new(LuceneSimilarity),
            None,
        ))
    }

    /// Drain a matcher with `next`.
    pub(crate) fn collect_ids(matcher: &mut dyn Matcher) -> Vec<u64> {
        let mut ids = Vec::new();
        while matcher.next().unwrap() {
            ids.push(matcher.doc_id());
        }
        ids
    }

    #[test]
    fn test_no_match_matcher() {
        let mut matcher = NoMatchMatcher::new();

        assert_eq!(matcher.doc_id(), NO_MORE_DOCS);
        assert!(matcher.is_exhausted());
        assert_eq!(matcher.cost(), 0);
        assert!(!matcher.next().unwrap());
        assert!(!matcher.advance(5).unwrap());
    }

    #[test]
    fn test_match_all_matcher() {
        let mut matcher = MatchAllMatcher::new(5, 2.0);

        assert!(!matcher.is_exhausted());
        assert_eq!(matcher.cost(), 5);

        assert!(matcher.next().unwrap());
        assert_eq!(matcher.doc_id(), 0);
        assert_eq!(matcher.score(), 2.0);

        assert!(matcher.next().unwrap());
        assert_eq!(matcher.doc_id(), 1);

        assert!(matcher.advance(4).unwrap());
        assert_eq!(matcher.doc_id(), 4);
        assert!(matcher.advance(4).unwrap());
        assert_eq!(matcher.doc_id(), 4);

        assert!(!matcher.next().unwrap());
        assert_eq!(matcher.doc_id(), NO_MORE_DOCS);
        assert!(matcher.is_exhausted());
    }

    #[test]
    fn test_match_all_enumerates_every_doc() {
        let mut matcher = MatchAllMatcher::new(100, 1.0);
        assert_eq!(collect_ids(&mut matcher), (0..100).collect::<Vec<_>>());
    }

    #[test]
    fn test_match_all_empty() {
        let mut matcher = MatchAllMatcher::new(0, 1.0);
        assert!(!matcher.next().unwrap());
        assert!(matcher.is_exhausted());
    }

    #[test]
    fn test_term_matcher_iteration() {
        let mut matcher = term(&[0, 1, 2, 3, 4]);
        assert_eq!(matcher.cost(), 5);
        assert_eq!(collect_ids(matcher.as_mut()), vec![0, 1, 2, 3, 4]);
        assert!(matcher.is_exhausted());
        assert!(!matcher.next().unwrap());
    }

    #[test]
    fn test_term_matcher_advance_idempotent() {
        let mut matcher = term(&[2, 6, 9]);
        assert!(matcher.advance(3).unwrap());
        assert_eq!(matcher.doc_id(), 6);
        assert!(matcher.advance(3).unwrap());
        assert_eq!(matcher.doc_id(), 6);
        assert!(!matcher.advance(10).unwrap());
        assert_eq!(matcher.doc_id(), NO_MORE_DOCS);
    }

    #[test]
    #[should_panic(expected = "regressed")]
    fn test_term_matcher_target_regression_panics() {
        let mut matcher = term(&[2, 6, 9]);
        matcher.advance(6).unwrap();
        matcher.advance(2).unwrap();
    }

    #[test]
    fn test_term_matcher_score() {
        let similarity: Arc<dyn Similarity> = Arc::new(LuceneSimilarity);
        let list = Arc::new(
            PostingList::new(vec![Posting::new(0, vec![0]), Posting::new(1, vec![0, 3, 7, 9])])
                .unwrap(),
        );
        let norms: Arc<[u8]> = Arc::from(vec![
            similarity.encode_norm(1.0),
            similarity.encode_norm(0.5),
        ]);
        let mut matcher =
            TermMatcher::new(Box::new(list.cursor()), 2.0, Arc::clone(&similarity), Some(norms));

        assert!(matcher.next().unwrap());
        assert_eq!(matcher.freq(), 1);
        assert!((matcher.score() - 2.0).abs() < 1e-6);

        assert!(matcher.next().unwrap());
        assert_eq!(matcher.freq(), 4);
        // 2.0 * sqrt(4) * 0.5
        assert!((matcher.score() - 2.0).abs() < 1e-6);
    }
}
