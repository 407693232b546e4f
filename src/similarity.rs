//! Relevance scoring policies.
//!
//! A [`Similarity`] supplies the numeric pieces of the scoring model. Only the
//! coordination factor is fixed ([`Similarity::coord`]); term weighting and
//! normalization are policy, constrained by monotonicity:
//!
//! - `idf` strictly decreases as `doc_freq` grows (for `total_docs > doc_freq`)
//! - `tf` never decreases as the term frequency grows
//! - `length_norm` never increases as the field grows
//!
//! A leaf term scores `tf(freq) × idf × field_boost × length_norm`, and a
//! document scores `query_norm × coord × Σ leaf scores × boost`.
//!
//! Similarities are shared across threads as `Arc<dyn Similarity>` and can be
//! looked up by name through a process-wide lock-free registry.

use std::fmt::Debug;
use std::sync::Arc;

use lazy_static::lazy_static;

use crate::registry::Registry;

/// Registry name of [`LuceneSimilarity`].
pub const LUCENE: &str = "lucene";

/// Registry name of [`Bm25Similarity`].
pub const BM25: &str = "bm25";

/// Trait for relevance scoring policies.
pub trait Similarity: Send + Sync + Debug {
    /// Name of this similarity.
    fn name(&self) -> &str;

    /// Inverse document frequency of a term.
    fn idf(&self, doc_freq: u64, total_docs: u64) -> f32;

    /// Weight of a term occurring `term_freq` times in a document.
    fn tf(&self, term_freq: f32) -> f32;

    /// Normalization for a field of `field_length` tokens.
    fn length_norm(&self, field_length: u32) -> f32;

    /// Query-wide normalization from the sum of squared leaf weights.
    fn query_norm(&self, sum_of_squared_weights: f32) -> f32;

    /// Fraction of a boolean combination's clauses that matched.
    fn coord(&self, overlap: u32, max_overlap: u32) -> f32 {
        if max_overlap == 0 {
            1.0
        } else {
            overlap as f32 / max_overlap as f32
        }
    }

    /// Quantize a length norm into one byte.
    ///
    /// Small float with a 3-bit mantissa and 5-bit exponent; monotone and
    /// never rounds up.
    fn encode_norm(&self, norm: f32) -> u8 {
        let bits = norm.to_bits() as i32;
        let small = bits >> (24 - 3);
        let zero_exp = (63 - 15) << 3;
        if small <= zero_exp {
            if bits <= 0 { 0 } else { 1 }
        } else if small >= zero_exp + 0x100 {
            u8::MAX
        } else {
            (small - zero_exp) as u8
        }
    }

    /// Inverse of [`Similarity::encode_norm`].
    fn decode_norm(&self, byte: u8) -> f32 {
        if byte == 0 {
            return 0.0;
        }
        let bits = ((byte as u32) << (24 - 3)) + ((63 - 15) << 24);
        f32::from_bits(bits)
    }
}

/// Classic TF-IDF similarity with Lucene's formulas.
#[derive(Debug, Clone, Default)]
pub struct LuceneSimilarity;

impl LuceneSimilarity {
    /// Create a new Lucene similarity.
    pub fn new() -> Self {
        LuceneSimilarity
    }
}

impl Similarity for LuceneSimilarity {
    fn name(&self) -> &str {
        LUCENE
    }

    fn idf(&self, doc_freq: u64, total_docs: u64) -> f32 {
        // IDF = 1 + ln((N + 1) / (df + 1))
        1.0 + ((total_docs as f64 + 1.0) / (doc_freq as f64 + 1.0)).ln() as f32
    }

    fn tf(&self, term_freq: f32) -> f32 {
        term_freq.max(0.0).sqrt()
    }

    fn length_norm(&self, field_length: u32) -> f32 {
        if field_length == 0 {
            1.0
        } else {
            1.0 / (field_length as f32).sqrt()
        }
    }

    fn query_norm(&self, sum_of_squared_weights: f32) -> f32 {
        if sum_of_squared_weights <= 0.0 || !sum_of_squared_weights.is_finite() {
            1.0
        } else {
            1.0 / sum_of_squared_weights.sqrt()
        }
    }
}

/// BM25 similarity.
///
/// BM25 normally folds length normalization into the saturating tf term;
/// here the two are separated so they fit the per-leaf product. There is no
/// query normalization.
#[derive(Debug, Clone)]
pub struct Bm25Similarity {
    k1: f32,
    b: f32,
    avg_field_length: f32,
}

impl Bm25Similarity {
    /// Create a BM25 similarity with k1 = 1.2, b = 0.75.
    pub fn new() -> Self {
        Self::with_params(1.2, 0.75, 10.0)
    }

    /// Create a BM25 similarity with custom parameters.
    pub fn with_params(k1: f32, b: f32, avg_field_length: f32) -> Self {
        Bm25Similarity {
            k1: k1.max(f32::EPSILON),
            b: b.clamp(0.0, 1.0),
            avg_field_length: if avg_field_length > 0.0 {
                avg_field_length
            } else {
                1.0
            },
        }
    }

    /// Get the k1 parameter.
    pub fn k1(&self) -> f32 {
        self.k1
    }

    /// Get the b parameter.
    pub fn b(&self) -> f32 {
        self.b
    }
}

impl Default for Bm25Similarity {
    fn default() -> Self {
        Self::new()
    }
}

impl Similarity for Bm25Similarity {
    fn name(&self) -> &str {
        BM25
    }

    fn idf(&self, doc_freq: u64, total_docs: u64) -> f32 {
        let n = total_docs.max(doc_freq) as f64;
        let df = doc_freq as f64;
        // IDF = ln(1 + (N - df + 0.5) / (df + 0.5))
        (1.0 + (n - df + 0.5) / (df + 0.5)).ln() as f32
    }

    fn tf(&self, term_freq: f32) -> f32 {
        if term_freq <= 0.0 {
            return 0.0;
        }
        // TF = (tf * (k1 + 1)) / (tf + k1)
        (term_freq * (self.k1 + 1.0)) / (term_freq + self.k1)
    }

    fn length_norm(&self, field_length: u32) -> f32 {
        1.0 / (1.0 - self.b + self.b * (field_length as f32 / self.avg_field_length))
    }

    fn query_norm(&self, _sum_of_squared_weights: f32) -> f32 {
        1.0
    }
}

lazy_static! {
    static ref SIMILARITIES: Registry<dyn Similarity> = Registry::new();
}

/// The process-wide similarity registry.
pub fn registry() -> &'static Registry<dyn Similarity> {
    &SIMILARITIES
}

/// Look up a similarity by name.
///
/// The built-in names [`LUCENE`] and [`BM25`] are registered on first use;
/// other names must have been added with [`register`].
pub fn by_name(name: &str) -> Option<Arc<dyn Similarity>> {
    match name {
        LUCENE => Some(SIMILARITIES.get_or_register_with(LUCENE, || Arc::new(LuceneSimilarity))),
        BM25 => Some(SIMILARITIES.get_or_register_with(BM25, || Arc::new(Bm25Similarity::new()))),
        other => SIMILARITIES.fetch(other),
    }
}

/// Register a similarity under a name, returning the live instance.
///
/// If the name is taken, the existing instance is returned and `similarity`
/// is dropped.
pub fn register<S: Into<String>>(name: S, similarity: Arc<dyn Similarity>) -> Arc<dyn Similarity> {
    SIMILARITIES.register(name, similarity)
}

/// The default similarity ([`LuceneSimilarity`]).
pub fn default_similarity() -> Arc<dyn Similarity> {
    SIMILARITIES.get_or_register_with(LUCENE, || Arc::new(LuceneSimilarity))
}
