//! Multi-segment searcher.

use std::sync::Arc;
use std::time::Instant;

use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};

use crate::config::SearchConfig;
use crate::error::{LanceError, Result};
use crate::index::{Searcher, SegmentReader};
use crate::query::{
    Collector, Compiler, CountCollector, HitQueue, Query, SortSpec, TopDocsCollector,
};
use crate::schema::Schema;
use crate::search::{SearchHit, SearchResults};
use crate::similarity::{self, Similarity};

/// Documents checked between deadline checks.
const DEADLINE_CHECK_INTERVAL: u64 = 256;

/// Outcome of collecting one segment.
#[derive(Debug, Clone, Copy)]
struct SegmentStats {
    collected: u64,
    max_score: f32,
    truncated: bool,
}

impl Default for SegmentStats {
    fn default() -> Self {
        SegmentStats {
            collected: 0,
            max_score: f32::NEG_INFINITY,
            truncated: false,
        }
    }
}

/// Searches a snapshot of segments as one index.
///
/// Global document ids are the segment's doc base plus its local id, with
/// segments laid out in the order given.
#[derive(Debug)]
pub struct IndexSearcher {
    schema: Arc<Schema>,
    segments: Vec<Arc<dyn SegmentReader>>,
    doc_bases: Vec<u64>,
    max_doc: u64,
    similarity: Arc<dyn Similarity>,
    config: SearchConfig,
    thread_pool: Option<Arc<ThreadPool>>,
}

impl IndexSearcher {
    /// Create a searcher over `segments`.
    pub fn new(
        schema: Arc<Schema>,
        segments: Vec<Arc<dyn SegmentReader>>,
        config: SearchConfig,
    ) -> Result<Self> {
        config.validate()?;
        let similarity = similarity::by_name(&config.similarity).ok_or_else(|| {
            LanceError::config(format!("unknown similarity '{}'", config.similarity))
        })?;

        let mut doc_bases = Vec::with_capacity(segments.len());
        let mut max_doc = 0u64;
        for segment in &segments {
            doc_bases.push(max_doc);
            max_doc += segment.max_doc();
        }

        let threads = config.threads();
        let thread_pool = if threads > 1 {
            let pool = ThreadPoolBuilder::new()
                .num_threads(threads)
                .thread_name(|i| format!("lance-search-{i}"))
                .build()
                .map_err(|e| LanceError::ThreadPool(format!("Failed to create thread pool: {e}")))?;
            Some(Arc::new(pool))
        } else {
            None
        };

        Ok(IndexSearcher {
            schema,
            segments,
            doc_bases,
            max_doc,
            similarity,
            config,
            thread_pool,
        })
    }

    /// Replace the similarity resolved from the configuration.
    pub fn with_similarity(mut self, similarity: Arc<dyn Similarity>) -> Self {
        self.similarity = similarity;
        self
    }

    /// The similarity used for scoring.
    pub fn similarity(&self) -> &Arc<dyn Similarity> {
        &self.similarity
    }

    /// The search configuration.
    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    /// The segments searched, in doc-base order.
    pub fn segments(&self) -> &[Arc<dyn SegmentReader>] {
        &self.segments
    }

    /// Run `query`, returning hits `offset..offset + num_wanted` of the
    /// ranking under `sort` (relevance when `None`).
    pub fn search(
        &self,
        query: &Query,
        sort: Option<&SortSpec>,
        offset: usize,
        num_wanted: usize,
    ) -> Result<SearchResults> {
        let start = Instant::now();
        let spec = Arc::new(sort.cloned().unwrap_or_default());
        spec.validate(&self.schema)?;
        let compiler = query.compile(self, Arc::clone(&self.similarity), 1.0)?;
        let deadline = self.config.timeout().map(|timeout| start + timeout);
        let capacity = offset.saturating_add(num_wanted);

        let per_segment = self.map_segments(|segment, doc_base| {
            let mut collector = TopDocsCollector::with_sort(capacity, Arc::clone(&spec));
            let stats = self.collect_segment(&compiler, segment, doc_base, &mut collector, deadline)?;
            Ok((stats, collector.into_queue()))
        })?;

        let mut merged = HitQueue::new(capacity, spec);
        let mut total = SegmentStats::default();
        for (stats, mut queue) in per_segment {
            total.collected += stats.collected;
            total.max_score = total.max_score.max(stats.max_score);
            total.truncated |= stats.truncated;
            for hit in queue.drain() {
                merged.insert(hit);
            }
        }

        let hits = merged
            .drain()
            .into_iter()
            .skip(offset)
            .map(|hit| SearchHit {
                doc_id: hit.doc_id,
                score: hit.score,
            })
            .collect();

        tracing::debug!(
            target: "lance::search",
            query = %query,
            total_hits = total.collected,
            segments = self.segments.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "search finished"
        );

        Ok(SearchResults {
            hits,
            total_hits: total.collected,
            max_score: if total.collected > 0 { total.max_score } else { 0.0 },
            truncated: total.truncated,
        })
    }

    /// Count the documents matching `query`.
    pub fn count(&self, query: &Query) -> Result<u64> {
        let compiler = query.compile(self, Arc::clone(&self.similarity), 1.0)?;
        let deadline = self.config.timeout().map(|timeout| Instant::now() + timeout);
        let counts = self.map_segments(|segment, doc_base| {
            let mut collector = CountCollector::new();
            self.collect_segment(&compiler, segment, doc_base, &mut collector, deadline)?;
            Ok(collector.total_hits())
        })?;
        Ok(counts.into_iter().sum())
    }

    /// Apply `f` to every segment, on the thread pool when there is one.
    ///
    /// The first error fails the whole search.
    fn map_segments<T, F>(&self, f: F) -> Result<Vec<T>>
    where
        T: Send,
        F: Fn(&dyn SegmentReader, u64) -> Result<T> + Sync,
    {
        match &self.thread_pool {
            Some(pool) if self.segments.len() > 1 => pool.install(|| {
                self.segments
                    .par_iter()
                    .zip(self.doc_bases.par_iter())
                    .map(|(segment, &doc_base)| f(segment.as_ref(), doc_base))
                    .collect()
            }),
            _ => self
                .segments
                .iter()
                .zip(&self.doc_bases)
                .map(|(segment, &doc_base)| f(segment.as_ref(), doc_base))
                .collect(),
        }
    }

    /// Drive one segment's matcher into `collector`.
    fn collect_segment<C: Collector>(
        &self,
        compiler: &Compiler,
        segment: &dyn SegmentReader,
        doc_base: u64,
        collector: &mut C,
        deadline: Option<Instant>,
    ) -> Result<SegmentStats> {
        let start = Instant::now();
        let mut stats = SegmentStats::default();
        collector.set_segment(segment, doc_base)?;

        let Some(mut matcher) = compiler.make_matcher(segment)? else {
            tracing::trace!(target: "lance::search", segment = segment.name(), "no possible match");
            return Ok(stats);
        };

        loop {
            if let Some(deadline) = deadline {
                if stats.collected % DEADLINE_CHECK_INTERVAL == 0 && Instant::now() >= deadline {
                    tracing::warn!(
                        target: "lance::search",
                        segment = segment.name(),
                        collected = stats.collected,
                        "search deadline reached, results truncated"
                    );
                    stats.truncated = true;
                    break;
                }
            }
            if !matcher.next()? {
                break;
            }
            if self
                .config
                .max_docs_scanned
                .is_some_and(|max| stats.collected >= max)
            {
                tracing::warn!(
                    target: "lance::search",
                    segment = segment.name(),
                    collected = stats.collected,
                    "document budget exhausted, results truncated"
                );
                stats.truncated = true;
                break;
            }
            let score = matcher.score();
            collector.collect(matcher.doc_id(), score)?;
            stats.max_score = stats.max_score.max(score);
            stats.collected += 1;
        }

        tracing::debug!(
            target: "lance::search",
            segment = segment.name(),
            hits = stats.collected,
            elapsed_us = start.elapsed().as_micros() as u64,
            "searched segment"
        );
        Ok(stats)
    }
}

impl Searcher for IndexSearcher {
    fn schema(&self) -> &Schema {
        &self.schema
    }

    fn doc_freq(&self, field: &str, term: &str) -> u64 {
        self.segments.iter().map(|s| s.doc_freq(field, term)).sum()
    }

    fn max_doc(&self) -> u64 {
        self.max_doc
    }

    fn field_length_norm(&self, doc_id: u64, field: &str) -> f32 {
        if doc_id >= self.max_doc {
            return 1.0;
        }
        let idx = self.doc_bases.partition_point(|&base| base <= doc_id) - 1;
        let segment = &self.segments[idx];
        let local = (doc_id - self.doc_bases[idx]) as usize;
        segment
            .field_norms(field)
            .and_then(|norms| norms.get(local).map(|&byte| self.similarity.decode_norm(byte)))
            .unwrap_or(1.0)
    }
}
