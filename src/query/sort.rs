//! Hit ordering and the bounded top-K queue.
//!
//! A [`SortSpec`] orders hits by a list of rules, always falling back to
//! ascending document id so that equal hits rank deterministically. The
//! [`HitQueue`] keeps the best `capacity` hits seen so far under that order.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::document::FieldValue;
use crate::error::Result;
use crate::schema::Schema;

/// What a sort rule compares.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "by", content = "field", rename_all = "snake_case")]
pub enum SortKind {
    /// Relevance score, highest first.
    Score,
    /// Document id, lowest first.
    DocId,
    /// A field's doc value, lowest first; documents without one sort last.
    Field(String),
}

/// A single sort criterion.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SortRule {
    pub kind: SortKind,
    /// Invert the natural direction.
    #[serde(default)]
    pub reverse: bool,
}

impl SortRule {
    /// Sort by score, highest first.
    pub fn score() -> Self {
        SortRule {
            kind: SortKind::Score,
            reverse: false,
        }
    }

    /// Sort by document id, lowest first.
    pub fn doc_id() -> Self {
        SortRule {
            kind: SortKind::DocId,
            reverse: false,
        }
    }

    /// Sort by a field value, lowest first.
    pub fn field<S: Into<String>>(name: S) -> Self {
        SortRule {
            kind: SortKind::Field(name.into()),
            reverse: false,
        }
    }

    /// Invert the direction of this rule.
    pub fn reversed(mut self) -> Self {
        self.reverse = !self.reverse;
        self
    }
}

/// A multi-criterion sort order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SortSpec {
    rules: Vec<SortRule>,
}

impl Default for SortSpec {
    fn default() -> Self {
        Self::relevance()
    }
}

impl SortSpec {
    /// Create a sort specification from rules.
    pub fn new(rules: Vec<SortRule>) -> Self {
        SortSpec { rules }
    }

    /// Score descending, then document id ascending.
    pub fn relevance() -> Self {
        SortSpec {
            rules: vec![SortRule::score()],
        }
    }

    /// Append a rule.
    pub fn then(mut self, rule: SortRule) -> Self {
        self.rules.push(rule);
        self
    }

    /// The rules in priority order.
    pub fn rules(&self) -> &[SortRule] {
        &self.rules
    }

    /// Names of the fields whose values a hit must carry, in rule order.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.rules.iter().filter_map(|rule| match &rule.kind {
            SortKind::Field(name) => Some(name.as_str()),
            _ => None,
        })
    }

    /// Check that every sort field exists in the schema.
    pub fn validate(&self, schema: &Schema) -> Result<()> {
        for name in self.field_names() {
            schema.field(name)?;
        }
        Ok(())
    }

    /// Compare two hits; `Less` means `a` ranks ahead of `b`.
    pub fn compare(&self, a: &MatchDoc, b: &MatchDoc) -> Ordering {
        let mut column = 0;
        for rule in &self.rules {
            let ordering = match &rule.kind {
                SortKind::Score => b.score.total_cmp(&a.score),
                SortKind::DocId => a.doc_id.cmp(&b.doc_id),
                SortKind::Field(_) => {
                    let idx = column;
                    column += 1;
                    match (a.value(idx), b.value(idx)) {
                        (Some(x), Some(y)) => {
                            let ordering = x.compare(y);
                            if rule.reverse { ordering.reverse() } else { ordering }
                        }
                        (Some(_), None) => Ordering::Less,
                        (None, Some(_)) => Ordering::Greater,
                        (None, None) => Ordering::Equal,
                    }
                }
            };
            let ordering = match (&rule.kind, rule.reverse) {
                (SortKind::Field(_), _) | (_, false) => ordering,
                (_, true) => ordering.reverse(),
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        a.doc_id.cmp(&b.doc_id)
    }
}

/// A collected hit.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchDoc {
    pub doc_id: u64,
    pub score: f32,
    /// Values of the sort fields, in [`SortSpec::field_names`] order.
    pub values: Vec<Option<FieldValue>>,
}

impl MatchDoc {
    /// Create a hit without sort values.
    pub fn new(doc_id: u64, score: f32) -> Self {
        MatchDoc {
            doc_id,
            score,
            values: Vec::new(),
        }
    }

    fn value(&self, idx: usize) -> Option<&FieldValue> {
        self.values.get(idx).and_then(Option::as_ref)
    }
}

/// A retained hit, ordered so that the worst hit is the heap maximum.
#[derive(Debug, Clone)]
struct RankedDoc {
    doc: MatchDoc,
    spec: Arc<SortSpec>,
}

impl PartialEq for RankedDoc {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for RankedDoc {}

impl PartialOrd for RankedDoc {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for RankedDoc {
    fn cmp(&self, other: &Self) -> Ordering {
        // Greater ranks later, so the max-heap root is the worst hit.
        self.spec.compare(&self.doc, &other.doc)
    }
}

/// Bounded queue of the best hits under a [`SortSpec`].
///
/// The heap root is the worst retained hit, so a full queue rejects a
/// candidate that does not beat the root without touching the heap.
#[derive(Debug, Clone)]
pub struct HitQueue {
    heap: BinaryHeap<RankedDoc>,
    capacity: usize,
    spec: Arc<SortSpec>,
}

impl HitQueue {
    /// Create a queue holding at most `capacity` hits.
    pub fn new(capacity: usize, spec: Arc<SortSpec>) -> Self {
        HitQueue {
            heap: BinaryHeap::with_capacity(capacity.min(1024)),
            capacity,
            spec,
        }
    }

    /// Maximum number of hits retained.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of hits retained.
    pub fn len(&self) -> usize {
        self.heap.len()
    }

    /// Whether the queue holds no hits.
    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// The sort order of this queue.
    pub fn spec(&self) -> &Arc<SortSpec> {
        &self.spec
    }

    /// The worst retained hit.
    pub fn peek_worst(&self) -> Option<&MatchDoc> {
        self.heap.peek().map(|ranked| &ranked.doc)
    }

    /// Offer a hit; returns whether it was retained.
    ///
    /// When full, the hit replaces the worst one only if it strictly
    /// outranks it.
    pub fn insert(&mut self, doc: MatchDoc) -> bool {
        if self.capacity == 0 {
            return false;
        }
        if self.heap.len() < self.capacity {
            self.heap.push(RankedDoc {
                doc,
                spec: Arc::clone(&self.spec),
            });
            return true;
        }
        match self.heap.peek_mut() {
            Some(mut worst) if self.spec.compare(&doc, &worst.doc) == Ordering::Less => {
                worst.doc = doc;
                true
            }
            _ => false,
        }
    }

    /// Remove every hit, best first.
    pub fn drain(&mut self) -> Vec<MatchDoc> {
        std::mem::take(&mut self.heap)
            .into_sorted_vec()
            .into_iter()
            .map(|ranked| ranked.doc)
            .collect()
    }
}
