//! Collector implementations for gathering search results.

use std::fmt::Debug;
use std::sync::Arc;

use crate::document::FieldValue;
use crate::error::Result;
use crate::index::SegmentReader;
use crate::query::sort::{HitQueue, MatchDoc, SortSpec};

/// Trait for collecting search results.
pub trait Collector: Send + Debug {
    /// Prepare for hits from a segment whose ids start at `doc_base`.
    fn set_segment(&mut self, segment: &dyn SegmentReader, doc_base: u64) -> Result<()>;

    /// Collect a segment-local document hit.
    fn collect(&mut self, doc_id: u64, score: f32) -> Result<()>;

    /// Get the total number of hits collected.
    fn total_hits(&self) -> u64;
}

/// A collector that keeps the top N documents under a sort order.
#[derive(Debug)]
pub struct TopDocsCollector {
    queue: HitQueue,
    doc_base: u64,
    /// Doc-value columns of the sort fields for the current segment.
    columns: Vec<Option<Arc<[Option<FieldValue>]>>>,
    total_hits: u64,
}

impl TopDocsCollector {
    /// Create a collector ranking by relevance.
    pub fn new(capacity: usize) -> Self {
        Self::with_sort(capacity, Arc::new(SortSpec::relevance()))
    }

    /// Create a collector ranking by `spec`.
    pub fn with_sort(capacity: usize, spec: Arc<SortSpec>) -> Self {
        TopDocsCollector {
            queue: HitQueue::new(capacity, spec),
            doc_base: 0,
            columns: Vec::new(),
            total_hits: 0,
        }
    }

    /// Number of hits currently retained.
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// Whether no hit is retained.
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Consume the collector, returning its queue.
    pub fn into_queue(self) -> HitQueue {
        self.queue
    }

    /// Consume the collector, returning the retained hits best first.
    pub fn top_docs(self) -> Vec<MatchDoc> {
        let mut queue = self.queue;
        queue.drain()
    }
}

impl Collector for TopDocsCollector {
    fn set_segment(&mut self, segment: &dyn SegmentReader, doc_base: u64) -> Result<()> {
        self.doc_base = doc_base;
        self.columns = self
            .queue
            .spec()
            .field_names()
            .map(|field| segment.doc_values(field))
            .collect();
        Ok(())
    }

    fn collect(&mut self, doc_id: u64, score: f32) -> Result<()> {
        self.total_hits += 1;
        if self.queue.capacity() == 0 {
            return Ok(());
        }
        let values = self
            .columns
            .iter()
            .map(|column| {
                column
                    .as_ref()
                    .and_then(|values| values.get(doc_id as usize).cloned().flatten())
            })
            .collect();
        self.queue.insert(MatchDoc {
            doc_id: self.doc_base + doc_id,
            score,
            values,
        });
        Ok(())
    }

    fn total_hits(&self) -> u64 {
        self.total_hits
    }
}

/// A collector that only counts hits.
#[derive(Debug, Default)]
pub struct CountCollector {
    count: u64,
}

impl CountCollector {
    /// Create a new count collector.
    pub fn new() -> Self {
        CountCollector::default()
    }
}

impl Collector for CountCollector {
    fn set_segment(&mut self, _segment: &dyn SegmentReader, _doc_base: u64) -> Result<()> {
        Ok(())
    }

    fn collect(&mut self, _doc_id: u64, _score: f32) -> Result<()> {
        self.count += 1;
        Ok(())
    }

    fn total_hits(&self) -> u64 {
        self.count
    }
}
