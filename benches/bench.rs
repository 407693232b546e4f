//! Criterion benchmarks for Lance.
//!
//! Covers posting-list matching, query compilation, top-K collection and
//! parallel multi-segment search over a randomly generated corpus.

use std::hint::black_box;
use std::sync::Arc;

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use lance::index::memory::PostingList;
use lance::prelude::*;
use lance::query::{AndMatcher, HitQueue, MatchDoc, OrMatcher, SeriesMatcher, TermMatcher};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const WORDS: &[&str] = &[
    "search", "engine", "full", "text", "index", "query", "document", "field", "term", "phrase",
    "boolean", "similarity", "relevance", "score", "segment", "posting", "ranking", "filter",
    "memory", "storage", "retrieval", "matcher", "collector", "compiler",
];

/// Generate random documents with variable length and a year column.
fn generate_documents(count: usize, seed: u64) -> Vec<Document> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..count)
        .map(|_| {
            let len = rng.random_range(20..120);
            let body: Vec<&str> = (0..len)
                .map(|_| WORDS[rng.random_range(0..WORDS.len())])
                .collect();
            Document::builder()
                .add_text("body", body.join(" "))
                .add_integer("year", rng.random_range(1990..2025))
                .build()
        })
        .collect()
}

fn build_index(doc_count: usize, segments: usize) -> MemoryIndex {
    let schema = Schema::new()
        .with_field("body", FieldDefinition::new(FieldType::Text))
        .and_then(|s| s.with_field("year", FieldDefinition::new(FieldType::Integer)))
        .unwrap();
    let index = MemoryIndex::new(schema);
    let documents = generate_documents(doc_count, 42);
    let per_segment = doc_count.div_ceil(segments);
    for chunk in documents.chunks(per_segment) {
        index.add_documents(chunk.to_vec()).unwrap();
    }
    index
}

/// Random sorted doc id lists with the given density.
fn generate_posting_lists(count: usize, max_doc: u64, density: f64) -> Vec<Arc<PostingList>> {
    let mut rng = StdRng::seed_from_u64(7);
    (0..count)
        .map(|_| {
            let ids: Vec<u64> = (0..max_doc).filter(|_| rng.random_bool(density)).collect();
            Arc::new(PostingList::from_doc_ids(&ids).unwrap())
        })
        .collect()
}

fn term_matcher(list: &Arc<PostingList>) -> Box<dyn Matcher> {
    Box::new(TermMatcher::new(
        Box::new(list.cursor()),
        1.0,
        Arc::new(LuceneSimilarity),
        None,
    ))
}

/// Benchmark raw matcher iteration.
fn bench_matchers(c: &mut Criterion) {
    let mut group = c.benchmark_group("matchers");
    let max_doc = 100_000;
    let lists = generate_posting_lists(4, max_doc, 0.1);
    group.throughput(Throughput::Elements(max_doc));

    group.bench_function("and_4_terms", |b| {
        b.iter(|| {
            let mut matcher = AndMatcher::new(lists.iter().map(term_matcher).collect());
            let mut hits = 0u64;
            while matcher.next().unwrap() {
                hits += 1;
            }
            black_box(hits)
        })
    });

    group.bench_function("or_4_terms", |b| {
        b.iter(|| {
            let mut matcher = OrMatcher::new(lists.iter().map(term_matcher).collect());
            let mut total = 0.0f32;
            while matcher.next().unwrap() {
                total += matcher.score();
            }
            black_box(total)
        })
    });

    group.finish();
}

/// Benchmark the positional window check used by phrases.
fn bench_series(c: &mut Criterion) {
    let mut group = c.benchmark_group("series");
    let mut rng = StdRng::seed_from_u64(11);
    let mut positions = || {
        let mut list: Vec<u32> = (0..64).map(|_| rng.random_range(0..2_000)).collect();
        list.sort_unstable();
        list.dedup();
        list
    };
    let lists = vec![positions(), positions(), positions()];
    let slices: Vec<&[u32]> = lists.iter().map(Vec::as_slice).collect();

    for slop in [0, 4, 16] {
        let matcher = SeriesMatcher::new(slop);
        group.bench_with_input(BenchmarkId::new("match_series", slop), &slices, |b, slices| {
            b.iter(|| black_box(matcher.match_series(black_box(slices))))
        });
    }

    group.finish();
}

/// Benchmark bounded top-K collection.
fn bench_hit_queue(c: &mut Criterion) {
    let mut group = c.benchmark_group("hit_queue");
    let mut rng = StdRng::seed_from_u64(3);
    let scores: Vec<f32> = (0..50_000).map(|_| rng.random_range(0.0..10.0)).collect();
    let spec = Arc::new(SortSpec::relevance());
    group.throughput(Throughput::Elements(scores.len() as u64));

    for capacity in [10, 100, 1_000] {
        group.bench_with_input(BenchmarkId::new("insert", capacity), &capacity, |b, &capacity| {
            b.iter(|| {
                let mut queue = HitQueue::new(capacity, Arc::clone(&spec));
                for (doc, &score) in scores.iter().enumerate() {
                    queue.insert(MatchDoc::new(doc as u64, score));
                }
                black_box(queue.drain())
            })
        });
    }

    group.finish();
}

/// Benchmark end-to-end searches.
fn bench_search(c: &mut Criterion) {
    let mut group = c.benchmark_group("search");
    group.sample_size(30);

    let index = build_index(20_000, 8);
    let queries = vec![
        ("term", Query::term("body", "search")),
        (
            "and",
            Query::and(vec![Query::term("body", "search"), Query::term("body", "engine")]),
        ),
        (
            "or",
            Query::or(vec![
                Query::term("body", "posting"),
                Query::term("body", "segment"),
                Query::term("body", "ranking"),
            ]),
        ),
        ("phrase", Query::sloppy_phrase("body", ["full", "text"], 2)),
        (
            "filtered",
            Query::and(vec![
                Query::term("body", "query"),
                Query::range("year", Some("2000"), Some("2010"), true, false).with_boost(0.0),
                Query::not(Query::term("body", "storage")),
            ]),
        ),
    ];

    for threads in [1, 4] {
        let searcher = index
            .searcher(SearchConfig::default().with_num_threads(threads))
            .unwrap();
        for (name, query) in &queries {
            group.bench_with_input(
                BenchmarkId::new(format!("{name}_threads"), threads),
                query,
                |b, query| b.iter(|| black_box(searcher.search(black_box(query), None, 0, 10).unwrap())),
            );
        }
    }

    let searcher = index
        .searcher(SearchConfig::default().with_num_threads(1))
        .unwrap();
    let sort = SortSpec::new(vec![SortRule::field("year").reversed()]);
    group.bench_function("sorted_by_year", |b| {
        let query = Query::term("body", "index");
        b.iter(|| black_box(searcher.search(&query, Some(&sort), 0, 20).unwrap()))
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_matchers,
    bench_series,
    bench_hit_queue,
    bench_search
);

criterion_main!(benches);
