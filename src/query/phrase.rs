//! Phrase matcher.

use std::sync::Arc;

use crate::error::Result;
use crate::index::{NO_MORE_DOCS, PostingListCursor};
use crate::query::matcher::{Matcher, check_target, length_norm};
use crate::query::series::SeriesMatcher;
use crate::similarity::Similarity;

/// Matches documents where the terms occur in sequence within a slop.
///
/// Candidates are found by intersecting the term cursors; each candidate is
/// then checked with a [`SeriesMatcher`], whose alignment count serves as
/// the phrase frequency when scoring.
#[derive(Debug)]
pub struct PhraseMatcher {
    cursors: Vec<Box<dyn PostingListCursor>>,
    series: SeriesMatcher,
    weight: f32,
    similarity: Arc<dyn Similarity>,
    norms: Option<Arc<[u8]>>,
    doc: u64,
    freq: u32,
    started: bool,
    last_target: u64,
}

impl PhraseMatcher {
    /// Create a phrase matcher over one cursor per phrase term, in order.
    pub fn new(
        cursors: Vec<Box<dyn PostingListCursor>>,
        slop: u32,
        weight: f32,
        similarity: Arc<dyn Similarity>,
        norms: Option<Arc<[u8]>>,
    ) -> Self {
        let doc = if cursors.is_empty() { NO_MORE_DOCS } else { 0 };
        PhraseMatcher {
            cursors,
            series: SeriesMatcher::new(slop),
            weight,
            similarity,
            norms,
            doc,
            freq: 0,
            started: false,
            last_target: 0,
        }
    }

    /// Number of phrase occurrences in the current document.
    pub fn freq(&self) -> u32 {
        self.freq
    }

    fn align(&mut self, target: u64) -> Result<bool> {
        self.started = true;
        let mut candidate = target;
        'search: loop {
            for cursor in self.cursors.iter_mut() {
                if !cursor.skip_to(candidate)? {
                    self.doc = NO_MORE_DOCS;
                    self.freq = 0;
                    return Ok(false);
                }
                let doc = cursor.doc_id();
                if doc > candidate {
                    candidate = doc;
                    continue 'search;
                }
            }

            let positions: Vec<&[u32]> = self.cursors.iter().map(|c| c.positions()).collect();
            let found = self.series.match_series(&positions);
            if found.is_match() {
                self.doc = candidate;
                self.freq = found.count;
                return Ok(true);
            }
            candidate += 1;
        }
    }
}

impl Matcher for PhraseMatcher {
    fn doc_id(&self) -> u64 {
        self.doc
    }

    fn next(&mut self) -> Result<bool> {
        if self.doc == NO_MORE_DOCS {
            return Ok(false);
        }
        let target = if self.started { self.doc + 1 } else { 0 };
        self.align(target)
    }

    fn advance(&mut self, target: u64) -> Result<bool> {
        check_target(&mut self.last_target, target);
        if self.doc == NO_MORE_DOCS {
            return Ok(false);
        }
        if self.started && self.doc >= target {
            return Ok(true);
        }
        self.align(target)
    }

    fn score(&self) -> f32 {
        self.weight
            * self.similarity.tf(self.freq as f32)
            * length_norm(&self.norms, self.similarity.as_ref(), self.doc)
    }

    fn cost(&self) -> u64 {
        self.cursors.iter().map(|c| c.cost()).min().unwrap_or(0)
    }
}
