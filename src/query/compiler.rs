//! Query compilation.
//!
//! A [`Compiler`] tree mirrors its [`Query`] with weights bound to one
//! search. Compilation runs in two passes: the first resolves term
//! statistics and computes raw leaf weights (`idf × field_boost × boost`),
//! the second scales every leaf by a single query norm derived from the sum
//! of squared raw weights of the whole tree. The compiled tree holds no
//! segment state and is shared read-only by every segment of the search.

use std::sync::Arc;

use crate::document::FieldValue;
use crate::error::{LanceError, Result};
use crate::index::{Searcher, SegmentReader};
use crate::query::boolean::{AndMatcher, NotMatcher, OrMatcher, ReqOptMatcher};
use crate::query::matcher::{MatchAllMatcher, Matcher, NoMatchMatcher, TermMatcher};
use crate::query::phrase::PhraseMatcher;
use crate::query::query::{Query, QueryKind};
use crate::query::range::{RangeBounds, RangeMatcher};
use crate::schema::FieldType;
use crate::similarity::Similarity;

/// Compiled term leaf.
#[derive(Debug)]
pub struct TermCompiler {
    field: String,
    text: String,
    idf: f32,
    raw_weight: f32,
    weight: f32,
    similarity: Arc<dyn Similarity>,
}

impl TermCompiler {
    /// Inverse document frequency of the term.
    pub fn idf(&self) -> f32 {
        self.idf
    }

    /// Normalized weight.
    pub fn weight(&self) -> f32 {
        self.weight
    }
}

/// Compiled phrase leaf.
#[derive(Debug)]
pub struct PhraseCompiler {
    field: String,
    terms: Vec<String>,
    slop: u32,
    idf: f32,
    raw_weight: f32,
    weight: f32,
    similarity: Arc<dyn Similarity>,
}

impl PhraseCompiler {
    /// Sum of the term idfs.
    pub fn idf(&self) -> f32 {
        self.idf
    }

    /// Normalized weight.
    pub fn weight(&self) -> f32 {
        self.weight
    }
}

/// Compiled range leaf.
#[derive(Debug)]
pub struct RangeCompiler {
    field: String,
    bounds: RangeBounds,
    score: f32,
}

/// A compiled query node.
#[derive(Debug)]
pub enum Compiler {
    Term(TermCompiler),
    Phrase(PhraseCompiler),
    Range(RangeCompiler),
    MatchAll {
        score: f32,
    },
    NoMatch,
    /// Conjunction of `required`, minus anything matching `excluded`.
    And {
        required: Vec<Compiler>,
        excluded: Vec<Compiler>,
    },
    Or {
        children: Vec<Compiler>,
        similarity: Arc<dyn Similarity>,
    },
    Not {
        negated: Box<Compiler>,
    },
    ReqOpt {
        required: Box<Compiler>,
        optional: Box<Compiler>,
    },
}

fn parse_bound(field: &str, field_type: FieldType, bound: &Option<String>) -> Result<Option<FieldValue>> {
    let Some(text) = bound else {
        return Ok(None);
    };
    let value = match field_type {
        FieldType::Integer => text.trim().parse::<i64>().map(FieldValue::Integer).map_err(|e| {
            LanceError::query(format!("invalid integer bound '{text}' for field '{field}': {e}"))
        })?,
        FieldType::Float => text.trim().parse::<f64>().map(FieldValue::Float).map_err(|e| {
            LanceError::query(format!("invalid float bound '{text}' for field '{field}': {e}"))
        })?,
        FieldType::Text | FieldType::String => FieldValue::Text(text.clone()),
    };
    Ok(Some(value))
}

impl Compiler {
    /// Compile a top-level query: subordinate compilation followed by
    /// query normalization.
    pub fn compile(
        query: &Query,
        searcher: &dyn Searcher,
        similarity: Arc<dyn Similarity>,
        boost: f32,
    ) -> Result<Compiler> {
        let mut compiler = Self::compile_subordinate(query, searcher, &similarity, boost)?;
        let sum_of_squared_weights = compiler.sum_of_squared_weights();
        let query_norm = similarity.query_norm(sum_of_squared_weights);
        compiler.normalize(query_norm);

        tracing::debug!(
            target: "lance::query",
            query = %query,
            sum_of_squared_weights,
            query_norm,
            "compiled query"
        );
        Ok(compiler)
    }

    /// Compile without normalization; leaf weights stay raw.
    pub fn compile_subordinate(
        query: &Query,
        searcher: &dyn Searcher,
        similarity: &Arc<dyn Similarity>,
        boost: f32,
    ) -> Result<Compiler> {
        let boost = boost * query.boost();
        let schema = searcher.schema();
        let compiler = match query.kind() {
            QueryKind::Term { field, text } => {
                let field_boost = schema.field_boost(field)?;
                let idf = similarity.idf(searcher.doc_freq(field, text), searcher.max_doc());
                let raw_weight = idf * field_boost * boost;
                Compiler::Term(TermCompiler {
                    field: field.clone(),
                    text: text.clone(),
                    idf,
                    raw_weight,
                    weight: raw_weight,
                    similarity: Arc::clone(similarity),
                })
            }
            QueryKind::Phrase { field, terms, slop } => {
                let field_boost = schema.field_boost(field)?;
                if terms.is_empty() {
                    return Err(LanceError::query(format!("phrase on '{field}' has no terms")));
                }
                let max_doc = searcher.max_doc();
                let idf: f32 = terms
                    .iter()
                    .map(|term| similarity.idf(searcher.doc_freq(field, term), max_doc))
                    .sum();
                let raw_weight = idf * field_boost * boost;
                Compiler::Phrase(PhraseCompiler {
                    field: field.clone(),
                    terms: terms.clone(),
                    slop: *slop,
                    idf,
                    raw_weight,
                    weight: raw_weight,
                    similarity: Arc::clone(similarity),
                })
            }
            QueryKind::Range {
                field,
                lower,
                upper,
                include_lower,
                include_upper,
            } => {
                let field_type = schema.field_type(field)?;
                let bounds = RangeBounds::new(
                    parse_bound(field, field_type, lower)?,
                    parse_bound(field, field_type, upper)?,
                    *include_lower,
                    *include_upper,
                );
                Compiler::Range(RangeCompiler {
                    field: field.clone(),
                    bounds,
                    score: boost,
                })
            }
            QueryKind::MatchAll => Compiler::MatchAll { score: boost },
            QueryKind::NoMatch => Compiler::NoMatch,
            QueryKind::Leaf { text, .. } => {
                return Err(LanceError::query(format!(
                    "cannot compile unparsed query text '{text}'"
                )));
            }
            QueryKind::And { children } => {
                let mut required = Vec::with_capacity(children.len());
                let mut excluded = Vec::new();
                for child in children {
                    match child.kind() {
                        QueryKind::Not { negated } => excluded.push(Self::compile_subordinate(
                            negated,
                            searcher,
                            similarity,
                            boost * child.boost(),
                        )?),
                        _ => required.push(Self::compile_subordinate(child, searcher, similarity, boost)?),
                    }
                }
                if required.is_empty() && excluded.is_empty() {
                    Compiler::NoMatch
                } else {
                    Compiler::And { required, excluded }
                }
            }
            QueryKind::Or { children } => {
                let children = children
                    .iter()
                    .map(|child| Self::compile_subordinate(child, searcher, similarity, boost))
                    .collect::<Result<Vec<_>>>()?;
                Compiler::Or {
                    children,
                    similarity: Arc::clone(similarity),
                }
            }
            QueryKind::Not { negated } => Compiler::Not {
                negated: Box::new(Self::compile_subordinate(negated, searcher, similarity, boost)?),
            },
            QueryKind::ReqOpt { required, optional } => Compiler::ReqOpt {
                required: Box::new(Self::compile_subordinate(required, searcher, similarity, boost)?),
                optional: Box::new(Self::compile_subordinate(optional, searcher, similarity, boost)?),
            },
        };
        Ok(compiler)
    }

    /// Sum of squared raw weights of the scoring leaves under this node.
    pub fn sum_of_squared_weights(&self) -> f32 {
        match self {
            Compiler::Term(term) => term.raw_weight * term.raw_weight,
            Compiler::Phrase(phrase) => phrase.raw_weight * phrase.raw_weight,
            Compiler::Range(_) | Compiler::MatchAll { .. } | Compiler::NoMatch => 0.0,
            Compiler::And { required, .. } => required.iter().map(Compiler::sum_of_squared_weights).sum(),
            Compiler::Or { children, .. } => children.iter().map(Compiler::sum_of_squared_weights).sum(),
            Compiler::Not { .. } => 0.0,
            Compiler::ReqOpt { required, optional } => {
                required.sum_of_squared_weights() + optional.sum_of_squared_weights()
            }
        }
    }

    /// Scale every scoring leaf by `query_norm`.
    pub fn normalize(&mut self, query_norm: f32) {
        match self {
            Compiler::Term(term) => term.weight = term.raw_weight * query_norm,
            Compiler::Phrase(phrase) => phrase.weight = phrase.raw_weight * query_norm,
            Compiler::Range(_) | Compiler::MatchAll { .. } | Compiler::NoMatch => {}
            Compiler::And { required, excluded } => {
                required.iter_mut().for_each(|c| c.normalize(query_norm));
                excluded.iter_mut().for_each(|c| c.normalize(query_norm));
            }
            Compiler::Or { children, .. } => children.iter_mut().for_each(|c| c.normalize(query_norm)),
            Compiler::Not { negated } => negated.normalize(query_norm),
            Compiler::ReqOpt { required, optional } => {
                required.normalize(query_norm);
                optional.normalize(query_norm);
            }
        }
    }

    /// Build a matcher over one segment.
    ///
    /// Returns `None` when the segment cannot contain a match, without
    /// opening the remaining posting lists.
    pub fn make_matcher(&self, segment: &dyn SegmentReader) -> Result<Option<Box<dyn Matcher>>> {
        match self {
            Compiler::Term(term) => {
                if segment.doc_freq(&term.field, &term.text) == 0 {
                    return Ok(None);
                }
                let cursor = segment.posting_list(&term.field, &term.text)?;
                Ok(Some(Box::new(TermMatcher::new(
                    cursor,
                    term.weight,
                    Arc::clone(&term.similarity),
                    segment.field_norms(&term.field),
                ))))
            }
            Compiler::Phrase(phrase) => {
                if phrase
                    .terms
                    .iter()
                    .any(|term| segment.doc_freq(&phrase.field, term) == 0)
                {
                    return Ok(None);
                }
                let cursors = phrase
                    .terms
                    .iter()
                    .map(|term| segment.posting_list(&phrase.field, term))
                    .collect::<Result<Vec<_>>>()?;
                Ok(Some(Box::new(PhraseMatcher::new(
                    cursors,
                    phrase.slop,
                    phrase.weight,
                    Arc::clone(&phrase.similarity),
                    segment.field_norms(&phrase.field),
                ))))
            }
            Compiler::Range(range) => Ok(segment.doc_values(&range.field).map(|values| {
                Box::new(RangeMatcher::new(values, range.bounds.clone(), range.score)) as Box<dyn Matcher>
            })),
            Compiler::MatchAll { score } => Ok(match_all(segment, *score)),
            Compiler::NoMatch => Ok(Some(Box::new(NoMatchMatcher::new()))),
            Compiler::And { required, excluded } => {
                let mut positives = Vec::with_capacity(required.len());
                for child in required {
                    match child.make_matcher(segment)? {
                        Some(matcher) if !matcher.is_exhausted() => positives.push(matcher),
                        _ => return Ok(None),
                    }
                }
                let positive = match positives.len() {
                    0 => match match_all(segment, 0.0) {
                        Some(all) => all,
                        None => return Ok(None),
                    },
                    1 => positives.remove(0),
                    _ => Box::new(AndMatcher::new(positives)),
                };

                let mut negatives = Vec::with_capacity(excluded.len());
                for child in excluded {
                    if let Some(matcher) = child.make_matcher(segment)? {
                        negatives.push(matcher);
                    }
                }
                Ok(Some(match negatives.len() {
                    0 => positive,
                    1 => Box::new(NotMatcher::new(positive, negatives.remove(0))),
                    _ => Box::new(NotMatcher::new(positive, Box::new(OrMatcher::new(negatives)))),
                }))
            }
            Compiler::Or { children, similarity } => {
                let mut matchers = Vec::with_capacity(children.len());
                for child in children {
                    if let Some(matcher) = child.make_matcher(segment)? {
                        matchers.push(matcher);
                    }
                }
                if matchers.is_empty() {
                    return Ok(None);
                }
                if matchers.len() == 1 && children.len() == 1 {
                    return Ok(matchers.pop());
                }
                Ok(Some(Box::new(OrMatcher::with_coord(
                    matchers,
                    similarity.as_ref(),
                    children.len() as u32,
                ))))
            }
            Compiler::Not { negated } => {
                let Some(all) = match_all(segment, 0.0) else {
                    return Ok(None);
                };
                Ok(Some(match negated.make_matcher(segment)? {
                    Some(negated) => Box::new(NotMatcher::new(all, negated)),
                    None => all,
                }))
            }
            Compiler::ReqOpt { required, optional } => {
                let Some(required) = required.make_matcher(segment)? else {
                    return Ok(None);
                };
                Ok(Some(match optional.make_matcher(segment)? {
                    Some(optional) => Box::new(ReqOptMatcher::new(required, optional)),
                    None => required,
                }))
            }
        }
    }
}

fn match_all(segment: &dyn SegmentReader, score: f32) -> Option<Box<dyn Matcher>> {
    match segment.max_doc() {
        0 => None,
        max_doc => Some(Box::new(MatchAllMatcher::new(max_doc, score))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Document;
    use crate::index::memory::MemoryIndex;
    use crate::query::matcher::tests::collect_ids;
    use crate::schema::{FieldDefinition, Schema};
    use crate::config::SearchConfig;
    use crate::search::IndexSearcher;
    use crate::similarity::LuceneSimilarity;

    fn searcher() -> (IndexSearcher, Arc<dyn SegmentReader>) {
        let schema = Schema::new()
            .with_field("body", FieldDefinition::new(FieldType::Text))
            .unwrap()
            .with_field("title", FieldDefinition::new(FieldType::Text).with_boost(2.0))
            .unwrap()
            .with_field("year", FieldDefinition::new(FieldType::Integer))
            .unwrap();
        let index = MemoryIndex::new(schema);
        index
            .add_documents(vec![
                Document::builder().add_text("body", "a b").add_integer("year", 2001).build(),
                Document::builder().add_text("body", "b c").add_integer("year", 2005).build(),
                Document::builder().add_text("body", "c d").add_text("title", "a").build(),
            ])
            .unwrap();
        let segment = index.segments().remove(0);
        (index.searcher(SearchConfig::default().with_num_threads(1)).unwrap(), segment)
    }

    fn similarity() -> Arc<dyn Similarity> {
        Arc::new(LuceneSimilarity)
    }

    fn ids(compiler: &Compiler, segment: &dyn SegmentReader) -> Vec<u64> {
        match compiler.make_matcher(segment).unwrap() {
            Some(mut matcher) => collect_ids(matcher.as_mut()),
            None => Vec::new(),
        }
    }

    #[test]
    fn test_unknown_field_fails_at_compile_time() {
        let (searcher, _) = searcher();
        let query = Query::and(vec![Query::term("body", "a"), Query::term("nope", "x")]);
        let err = query.compile(&searcher, similarity(), 1.0).unwrap_err();
        assert!(matches!(err, LanceError::NoSuchField(ref f) if f == "nope"));
        assert!(err.is_compile_time());
    }

    #[test]
    fn test_leaf_query_is_not_compilable() {
        let (searcher, _) = searcher();
        let result = Query::leaf(Some("body"), "a b").compile(&searcher, similarity(), 1.0);
        assert!(matches!(result, Err(LanceError::Query(_))));
    }

    #[test]
    fn test_invalid_range_bound() {
        let (searcher, _) = searcher();
        let result = Query::range("year", Some("twenty"), None, true, true)
            .compile(&searcher, similarity(), 1.0);
        assert!(matches!(result, Err(LanceError::Query(_))));
    }

    fn term_weights(compiler: &Compiler) -> Vec<f32> {
        match compiler {
            Compiler::Or { children, .. } => children.iter().flat_map(term_weights).collect(),
            Compiler::Term(term) => vec![term.weight()],
            _ => Vec::new(),
        }
    }

    #[test]
    fn test_normalization() {
        let (searcher, _) = searcher();
        let query = Query::or(vec![Query::term("body", "a"), Query::term("title", "a")]);

        let raw = query.compile_subordinate(&searcher, similarity(), 1.0).unwrap();
        let compiled = query.compile(&searcher, similarity(), 1.0).unwrap();
        let raw_weights = term_weights(&raw);
        let weights = term_weights(&compiled);

        // title carries twice the field boost
        assert!((raw_weights[1] - 2.0 * raw_weights[0]).abs() < 1e-5);

        let query_norm = 1.0 / raw.sum_of_squared_weights().sqrt();
        for (weight, raw_weight) in weights.iter().zip(&raw_weights) {
            assert!((weight - raw_weight * query_norm).abs() < 1e-5);
        }
        let normalized_sum: f32 = weights.iter().map(|w| w * w).sum();
        assert!((normalized_sum - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_constant_score_leaves_are_not_normalized() {
        let (searcher, _) = searcher();
        let compiled = Query::range("year", Some("2000"), None, true, true)
            .with_boost(3.0)
            .compile(&searcher, similarity(), 1.0)
            .unwrap();
        assert_eq!(compiled.sum_of_squared_weights(), 0.0);
        assert!(matches!(compiled, Compiler::Range(RangeCompiler { score, .. }) if score == 3.0));
    }

    #[test]
    fn test_absent_term_short_circuits() {
        let (searcher, segment) = searcher();
        let compiled = Query::and(vec![Query::term("body", "b"), Query::term("body", "zzz")])
            .compile(&searcher, similarity(), 1.0)
            .unwrap();
        assert!(compiled.make_matcher(segment.as_ref()).unwrap().is_none());

        let compiled = Query::term("body", "zzz").compile(&searcher, similarity(), 1.0).unwrap();
        assert!(compiled.make_matcher(segment.as_ref()).unwrap().is_none());
    }

    #[test]
    fn test_boolean_matching() {
        let (searcher, segment) = searcher();
        let segment = segment.as_ref();
        let matching = |query: Query| {
            let compiled = query.compile(&searcher, similarity(), 1.0).unwrap();
            ids(&compiled, segment)
        };
        let term = |text: &str| Query::term("body", text);

        assert_eq!(matching(Query::or(vec![term("a"), term("d")])), vec![0, 2]);
        assert_eq!(matching(Query::and(vec![term("b"), Query::not(term("a"))])), vec![1]);
        assert_eq!(matching(Query::not(term("b"))), vec![2]);
        assert_eq!(matching(Query::and(vec![Query::not(term("c"))])), vec![0]);
        assert_eq!(matching(Query::req_opt(term("c"), term("zzz"))), vec![1, 2]);
        assert_eq!(matching(Query::phrase("body", ["b", "c"])), vec![1]);
        assert_eq!(matching(Query::range("year", Some("2002"), None, true, true)), vec![1]);
        assert!(matching(Query::no_match()).is_empty());
        assert!(matching(Query::and(Vec::new())).is_empty());
    }

    #[test]
    fn test_or_coord_counts_absent_clauses() {
        let (searcher, segment) = searcher();
        let compiled = Query::or(vec![Query::term("body", "a"), Query::term("body", "zzz")])
            .compile(&searcher, similarity(), 1.0)
            .unwrap();
        let mut matcher = compiled.make_matcher(segment.as_ref()).unwrap().unwrap();
        assert!(matcher.next().unwrap());
        assert_eq!(matcher.doc_id(), 0);

        let sim = similarity();
        let weight = term_weights(&compiled)[0];
        let norm = sim.decode_norm(sim.encode_norm(sim.length_norm(2)));
        // one of two clauses matched
        let expected = weight * sim.tf(1.0) * norm * 0.5;
        assert!((matcher.score() - expected).abs() < 1e-5);
    }
}
