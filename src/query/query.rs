//! Query trees.
//!
//! A [`Query`] is an immutable description of what to search for. It is
//! turned into scoring weights by [`Query::compile`], and the resulting
//! [`Compiler`] builds a matcher per segment.
//!
//! # Examples
//!
//! ```
//! use lance::query::Query;
//!
//! let query = Query::and(vec![
//!     Query::term("body", "rust"),
//!     Query::not(Query::term("body", "java")),
//! ])
//! .with_boost(2.0);
//!
//! assert_eq!(query.to_string(), "(body:rust AND -body:java)^2");
//! let parsed = Query::from_json(&query.to_json().unwrap()).unwrap();
//! assert_eq!(parsed, query);
//! ```

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{LanceError, Result};
use crate::index::Searcher;
use crate::query::compiler::Compiler;
use crate::similarity::Similarity;

/// The variants of a query node.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum QueryKind {
    /// A single term in a field.
    Term { field: String, text: String },
    /// Terms in sequence, within `slop` of their expected positions.
    Phrase {
        field: String,
        terms: Vec<String>,
        #[serde(default)]
        slop: u32,
    },
    /// Field values between two bounds; a missing bound is open.
    Range {
        field: String,
        lower: Option<String>,
        upper: Option<String>,
        include_lower: bool,
        include_upper: bool,
    },
    /// Every document.
    MatchAll,
    /// No document.
    NoMatch,
    /// Unparsed query text; must be expanded before it can be compiled.
    Leaf { field: Option<String>, text: String },
    /// Documents matching every child.
    And { children: Vec<Query> },
    /// Documents matching any child.
    Or { children: Vec<Query> },
    /// Documents not matching the child.
    Not { negated: Box<Query> },
    /// Documents matching `required`, boosted by `optional`.
    ReqOpt {
        required: Box<Query>,
        optional: Box<Query>,
    },
}

fn default_boost() -> f32 {
    1.0
}

/// An immutable query node with a boost.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Query {
    #[serde(flatten)]
    kind: QueryKind,
    #[serde(default = "default_boost")]
    boost: f32,
}

impl PartialEq for Query {
    fn eq(&self, other: &Self) -> bool {
        self.boost.to_bits() == other.boost.to_bits() && self.kind == other.kind
    }
}

impl Eq for Query {}

impl Hash for Query {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.kind.hash(state);
        self.boost.to_bits().hash(state);
    }
}

impl Query {
    /// Create a query node with boost 1.0.
    pub fn new(kind: QueryKind) -> Self {
        Query { kind, boost: 1.0 }
    }

    /// Term query.
    pub fn term<F: Into<String>, T: Into<String>>(field: F, text: T) -> Self {
        Self::new(QueryKind::Term {
            field: field.into(),
            text: text.into(),
        })
    }

    /// Exact phrase query.
    pub fn phrase<F, I, T>(field: F, terms: I) -> Self
    where
        F: Into<String>,
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        Self::sloppy_phrase(field, terms, 0)
    }

    /// Phrase query tolerating `slop` positions of displacement.
    pub fn sloppy_phrase<F, I, T>(field: F, terms: I, slop: u32) -> Self
    where
        F: Into<String>,
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        Self::new(QueryKind::Phrase {
            field: field.into(),
            terms: terms.into_iter().map(Into::into).collect(),
            slop,
        })
    }

    /// Range query. Bounds are parsed against the field type at compile time.
    pub fn range<F: Into<String>>(
        field: F,
        lower: Option<&str>,
        upper: Option<&str>,
        include_lower: bool,
        include_upper: bool,
    ) -> Self {
        Self::new(QueryKind::Range {
            field: field.into(),
            lower: lower.map(str::to_string),
            upper: upper.map(str::to_string),
            include_lower,
            include_upper,
        })
    }

    /// Query matching every document.
    pub fn match_all() -> Self {
        Self::new(QueryKind::MatchAll)
    }

    /// Query matching no document.
    pub fn no_match() -> Self {
        Self::new(QueryKind::NoMatch)
    }

    /// Unparsed query text.
    pub fn leaf<T: Into<String>>(field: Option<&str>, text: T) -> Self {
        Self::new(QueryKind::Leaf {
            field: field.map(str::to_string),
            text: text.into(),
        })
    }

    /// Conjunction.
    pub fn and(children: Vec<Query>) -> Self {
        Self::new(QueryKind::And { children })
    }

    /// Disjunction.
    pub fn or(children: Vec<Query>) -> Self {
        Self::new(QueryKind::Or { children })
    }

    /// Negation.
    pub fn not(negated: Query) -> Self {
        Self::new(QueryKind::Not {
            negated: Box::new(negated),
        })
    }

    /// Required clause with an optional score-only clause.
    pub fn req_opt(required: Query, optional: Query) -> Self {
        Self::new(QueryKind::ReqOpt {
            required: Box::new(required),
            optional: Box::new(optional),
        })
    }

    /// Set the boost of this node.
    pub fn with_boost(mut self, boost: f32) -> Self {
        self.boost = boost;
        self
    }

    /// Boost of this node.
    pub fn boost(&self) -> f32 {
        self.boost
    }

    /// Variant of this node.
    pub fn kind(&self) -> &QueryKind {
        &self.kind
    }

    /// Compile this query for one search.
    ///
    /// Resolves term statistics through `searcher`, checks every field
    /// against its schema, and normalizes the leaf weights of the whole tree.
    /// `boost` multiplies the boost of every node.
    pub fn compile(
        &self,
        searcher: &dyn Searcher,
        similarity: Arc<dyn Similarity>,
        boost: f32,
    ) -> Result<Compiler> {
        Compiler::compile(self, searcher, similarity, boost)
    }

    /// Compile without query normalization, for use inside a larger tree.
    pub fn compile_subordinate(
        &self,
        searcher: &dyn Searcher,
        similarity: Arc<dyn Similarity>,
        boost: f32,
    ) -> Result<Compiler> {
        Compiler::compile_subordinate(self, searcher, &similarity, boost)
    }

    /// Serialize to JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Deserialize from JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        let query: Query = serde_json::from_str(json)?;
        query.check_boosts()?;
        Ok(query)
    }

    fn check_boosts(&self) -> Result<()> {
        if !self.boost.is_finite() {
            return Err(LanceError::query(format!("invalid boost {}", self.boost)));
        }
        match &self.kind {
            QueryKind::And { children } | QueryKind::Or { children } => {
                children.iter().try_for_each(Query::check_boosts)
            }
            QueryKind::Not { negated } => negated.check_boosts(),
            QueryKind::ReqOpt { required, optional } => {
                required.check_boosts()?;
                optional.check_boosts()
            }
            _ => Ok(()),
        }
    }
}

fn join(f: &mut fmt::Formatter<'_>, children: &[Query], separator: &str) -> fmt::Result {
    write!(f, "(")?;
    for (i, child) in children.iter().enumerate() {
        if i > 0 {
            write!(f, "{separator}")?;
        }
        write!(f, "{child}")?;
    }
    write!(f, ")")
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            QueryKind::Term { field, text } => write!(f, "{field}:{text}")?,
            QueryKind::Phrase { field, terms, slop } => {
                write!(f, "{field}:\"{}\"", terms.join(" "))?;
                if *slop > 0 {
                    write!(f, "~{slop}")?;
                }
            }
            QueryKind::Range {
                field,
                lower,
                upper,
                include_lower,
                include_upper,
            } => {
                let open = if *include_lower { '[' } else { '{' };
                let close = if *include_upper { ']' } else { '}' };
                write!(
                    f,
                    "{field}:{open}{} TO {}{close}",
                    lower.as_deref().unwrap_or("*"),
                    upper.as_deref().unwrap_or("*")
                )?;
            }
            QueryKind::MatchAll => write!(f, "*:*")?,
            QueryKind::NoMatch => write!(f, "[NOMATCH]")?,
            QueryKind::Leaf { field, text } => match field {
                Some(field) => write!(f, "{field}:{text}")?,
                None => write!(f, "{text}")?,
            },
            QueryKind::And { children } => join(f, children, " AND ")?,
            QueryKind::Or { children } => join(f, children, " OR ")?,
            QueryKind::Not { negated } => write!(f, "-{negated}")?,
            QueryKind::ReqOpt { required, optional } => write!(f, "(+{required} {optional})")?,
        }
        if self.boost != 1.0 {
            write!(f, "^{}", self.boost)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::hash_map::DefaultHasher;

    fn hash_of(query: &Query) -> u64 {
        let mut hasher = DefaultHasher::new();
        query.hash(&mut hasher);
        hasher.finish()
    }

    #[test]
    fn test_structural_equality() {
        let a = Query::and(vec![Query::term("body", "a"), Query::term("body", "b")]);
        let b = Query::and(vec![Query::term("body", "a"), Query::term("body", "b")]);
        assert_eq!(a, b);
        assert_eq!(hash_of(&a), hash_of(&b));

        assert_ne!(a, a.clone().with_boost(2.0));
        assert_ne!(a, Query::or(vec![Query::term("body", "a"), Query::term("body", "b")]));
        assert_ne!(
            a,
            Query::and(vec![Query::term("body", "a"), Query::term("body", "b").with_boost(0.5)])
        );
    }

    #[test]
    fn test_display() {
        assert_eq!(Query::term("title", "rust").to_string(), "title:rust");
        assert_eq!(Query::phrase("body", ["quick", "fox"]).to_string(), "body:\"quick fox\"");
        assert_eq!(
            Query::sloppy_phrase("body", ["quick", "fox"], 2).to_string(),
            "body:\"quick fox\"~2"
        );
        assert_eq!(
            Query::range("year", Some("2000"), None, true, false).to_string(),
            "year:[2000 TO *}"
        );
        assert_eq!(Query::match_all().with_boost(0.5).to_string(), "*:*^0.5");
        assert_eq!(Query::no_match().to_string(), "[NOMATCH]");
        assert_eq!(Query::leaf(None, "foo bar").to_string(), "foo bar");
        assert_eq!(
            Query::req_opt(Query::term("a", "x"), Query::term("b", "y")).to_string(),
            "(+a:x b:y)"
        );
        assert_eq!(
            Query::or(vec![Query::term("a", "x"), Query::not(Query::term("a", "y"))]).to_string(),
            "(a:x OR -a:y)"
        );
    }

    #[test]
    fn test_json_round_trip() {
        let query = Query::req_opt(
            Query::and(vec![
                Query::phrase("body", ["a", "b"]),
                Query::range("year", Some("1"), Some("9"), true, true),
            ]),
            Query::or(vec![Query::match_all(), Query::not(Query::no_match())]),
        )
        .with_boost(3.0);
        let json = query.to_json().unwrap();
        assert_eq!(Query::from_json(&json).unwrap(), query);
    }

    #[test]
    fn test_json_defaults() {
        let query = Query::from_json(r#"{"type": "term", "field": "body", "text": "rust"}"#).unwrap();
        assert_eq!(query, Query::term("body", "rust"));

        let query =
            Query::from_json(r#"{"type": "phrase", "field": "body", "terms": ["a", "b"], "boost": 2.0}"#)
                .unwrap();
        assert_eq!(query, Query::phrase("body", ["a", "b"]).with_boost(2.0));

        assert!(Query::from_json(r#"{"type": "bogus"}"#).is_err());
    }
}
