//! Boolean matchers: conjunction, disjunction, exclusion and required-optional.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use crate::error::Result;
use crate::index::NO_MORE_DOCS;
use crate::query::matcher::{Matcher, check_target};
use crate::similarity::Similarity;

/// Matches documents present in every child (leap-frog intersection).
#[derive(Debug)]
pub struct AndMatcher {
    children: Vec<Box<dyn Matcher>>,
    doc: u64,
    started: bool,
    last_target: u64,
}

impl AndMatcher {
    /// Create a conjunction. Children are driven cheapest first.
    pub fn new(mut children: Vec<Box<dyn Matcher>>) -> Self {
        children.sort_by_key(|child| child.cost());
        let doc = if children.is_empty() { NO_MORE_DOCS } else { 0 };
        AndMatcher {
            children,
            doc,
            started: false,
            last_target: 0,
        }
    }

    /// Position every child on the first common document >= target.
    fn align(&mut self, target: u64) -> Result<bool> {
        self.started = true;
        let mut candidate = target;
        'search: loop {
            for child in self.children.iter_mut() {
                if !child.advance(candidate)? {
                    self.doc = NO_MORE_DOCS;
                    return Ok(false);
                }
                let doc = child.doc_id();
                if doc > candidate {
                    candidate = doc;
                    continue 'search;
                }
            }
            self.doc = candidate;
            return Ok(true);
        }
    }
}

impl Matcher for AndMatcher {
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
        self.children.iter().map(|child| child.score()).sum()
    }

    fn cost(&self) -> u64 {
        self.children.iter().map(|child| child.cost()).min().unwrap_or(0)
    }
}

/// Matches documents present in any child (heap-merged union).
///
/// The score is the sum of the scores of the children positioned on the
/// current document, scaled by the coordination factor for that overlap.
#[derive(Debug)]
pub struct OrMatcher {
    children: Vec<Box<dyn Matcher>>,
    /// Positioned children not on the current document, keyed by doc id.
    queue: BinaryHeap<Reverse<(u64, usize)>>,
    /// Children positioned on the current document.
    current: Vec<usize>,
    /// Score multiplier indexed by overlap.
    coord_factors: Vec<f32>,
    doc: u64,
    started: bool,
    last_target: u64,
}

impl OrMatcher {
    /// Create a disjunction with no coordination factor.
    pub fn new(children: Vec<Box<dyn Matcher>>) -> Self {
        let coord_factors = vec![1.0; children.len() + 1];
        Self::with_factors(children, coord_factors)
    }

    /// Create a disjunction scaled by `similarity.coord(overlap, max_overlap)`.
    ///
    /// `max_overlap` may exceed the number of children when some clauses of
    /// the query had no matcher in this segment.
    pub fn with_coord(
        children: Vec<Box<dyn Matcher>>,
        similarity: &dyn Similarity,
        max_overlap: u32,
    ) -> Self {
        let coord_factors = (0..=children.len())
            .map(|overlap| similarity.coord(overlap as u32, max_overlap))
            .collect();
        Self::with_factors(children, coord_factors)
    }

    fn with_factors(children: Vec<Box<dyn Matcher>>, coord_factors: Vec<f32>) -> Self {
        let doc = if children.is_empty() { NO_MORE_DOCS } else { 0 };
        OrMatcher {
            queue: BinaryHeap::with_capacity(children.len()),
            current: Vec::with_capacity(children.len()),
            children,
            coord_factors,
            doc,
            started: false,
            last_target: 0,
        }
    }

    /// Number of children positioned on the current document.
    pub fn overlap(&self) -> u32 {
        self.current.len() as u32
    }

    /// Pop every child sitting on the smallest queued doc id.
    fn gather(&mut self) -> bool {
        let Some(&Reverse((doc, _))) = self.queue.peek() else {
            self.doc = NO_MORE_DOCS;
            return false;
        };
        while let Some(&Reverse((child_doc, idx))) = self.queue.peek() {
            if child_doc != doc {
                break;
            }
            self.queue.pop();
            self.current.push(idx);
        }
        self.doc = doc;
        true
    }
}

impl Matcher for OrMatcher {
    fn doc_id(&self) -> u64 {
        self.doc
    }

    fn next(&mut self) -> Result<bool> {
        if self.doc == NO_MORE_DOCS {
            return Ok(false);
        }
        if !self.started {
            self.started = true;
            for (idx, child) in self.children.iter_mut().enumerate() {
                if child.next()? {
                    self.queue.push(Reverse((child.doc_id(), idx)));
                }
            }
        } else {
            for idx in self.current.drain(..) {
                let child = &mut self.children[idx];
                if child.next()? {
                    self.queue.push(Reverse((child.doc_id(), idx)));
                }
            }
        }
        Ok(self.gather())
    }

    fn advance(&mut self, target: u64) -> Result<bool> {
        check_target(&mut self.last_target, target);
        if self.doc == NO_MORE_DOCS {
            return Ok(false);
        }
        if self.started && self.doc >= target {
            return Ok(true);
        }
        if !self.started {
            self.started = true;
            for (idx, child) in self.children.iter_mut().enumerate() {
                if child.advance(target)? {
                    self.queue.push(Reverse((child.doc_id(), idx)));
                }
            }
        } else {
            for idx in self.current.drain(..) {
                let child = &mut self.children[idx];
                if child.advance(target)? {
                    self.queue.push(Reverse((child.doc_id(), idx)));
                }
            }
            while let Some(&Reverse((doc, idx))) = self.queue.peek() {
                if doc >= target {
                    break;
                }
                self.queue.pop();
                let child = &mut self.children[idx];
                if child.advance(target)? {
                    self.queue.push(Reverse((child.doc_id(), idx)));
                }
            }
        }
        Ok(self.gather())
    }

    fn score(&self) -> f32 {
        let sum: f32 = self.current.iter().map(|&idx| self.children[idx].score()).sum();
        sum * self.coord_factors[self.current.len()]
    }

    fn cost(&self) -> u64 {
        self.children.iter().map(|child| child.cost()).sum()
    }
}

/// Matches documents of `positive` that `negated` does not match.
#[derive(Debug)]
pub struct NotMatcher {
    positive: Box<dyn Matcher>,
    negated: Box<dyn Matcher>,
    started: bool,
    last_target: u64,
}

impl NotMatcher {
    /// Create an exclusion matcher.
    pub fn new(positive: Box<dyn Matcher>, negated: Box<dyn Matcher>) -> Self {
        NotMatcher {
            positive,
            negated,
            started: false,
            last_target: 0,
        }
    }

    fn excluded(&mut self, doc: u64) -> Result<bool> {
        if self.negated.is_exhausted() {
            return Ok(false);
        }
        self.negated.advance(doc)?;
        Ok(self.negated.doc_id() == doc)
    }

    /// Skip forward from the current positive document past any exclusions.
    fn settle(&mut self, mut found: bool) -> Result<bool> {
        while found {
            let doc = self.positive.doc_id();
            if !self.excluded(doc)? {
                return Ok(true);
            }
            found = self.positive.next()?;
        }
        Ok(false)
    }
}

impl Matcher for NotMatcher {
    fn doc_id(&self) -> u64 {
        self.positive.doc_id()
    }

    fn next(&mut self) -> Result<bool> {
        self.started = true;
        let found = self.positive.next()?;
        self.settle(found)
    }

    fn advance(&mut self, target: u64) -> Result<bool> {
        check_target(&mut self.last_target, target);
        if self.positive.is_exhausted() {
            return Ok(false);
        }
        if self.started && self.positive.doc_id() >= target {
            return Ok(true);
        }
        self.started = true;
        let found = self.positive.advance(target)?;
        self.settle(found)
    }

    fn score(&self) -> f32 {
        self.positive.score()
    }

    fn cost(&self) -> u64 {
        self.positive.cost()
    }
}

/// Matches the documents of `required`; `optional` only adds to the score.
#[derive(Debug)]
pub struct ReqOptMatcher {
    required: Box<dyn Matcher>,
    optional: Box<dyn Matcher>,
    started: bool,
    last_target: u64,
}

impl ReqOptMatcher {
    /// Create a required-optional matcher.
    pub fn new(required: Box<dyn Matcher>, optional: Box<dyn Matcher>) -> Self {
        ReqOptMatcher {
            required,
            optional,
            started: false,
            last_target: 0,
        }
    }

    fn sync_optional(&mut self, found: bool) -> Result<bool> {
        if found && !self.optional.is_exhausted() {
            self.optional.advance(self.required.doc_id())?;
        }
        Ok(found)
    }
}

impl Matcher for ReqOptMatcher {
    fn doc_id(&self) -> u64 {
        self.required.doc_id()
    }

    fn next(&mut self) -> Result<bool> {
        self.started = true;
        let found = self.required.next()?;
        self.sync_optional(found)
    }

    fn advance(&mut self, target: u64) -> Result<bool> {
        check_target(&mut self.last_target, target);
        if self.required.is_exhausted() {
            return Ok(false);
        }
        if self.started && self.required.doc_id() >= target {
            return Ok(true);
        }
        self.started = true;
        let found = self.required.advance(target)?;
        self.sync_optional(found)
    }

    fn score(&self) -> f32 {
        let doc = self.required.doc_id();
        if self.optional.doc_id() == doc {
            self.required.score() + self.optional.score()
        } else {
            self.required.score()
        }
    }

    fn cost(&self) -> u64 {
        self.required.cost()
    }
}
