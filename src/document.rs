//! Documents and field values.
//!
//! Documents are flat collections of field-value pairs. They are only needed
//! by the in-memory reference index ([`crate::index::memory`]); the matching
//! engine itself reads segments through the
//! [`SegmentReader`](crate::index::SegmentReader) trait.
//!
//! # Examples
//!
//! ```
//! use lance::document::{Document, FieldValue};
//!
//! let doc = Document::builder()
//!     .add_text("title", "Rust Programming Guide")
//!     .add_integer("year", 2024)
//!     .add_float("price", 39.99)
//!     .build();
//!
//! assert_eq!(doc.len(), 3);
//! assert_eq!(doc.get_field("year"), Some(&FieldValue::Integer(2024)));
//! ```

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A value stored in a document field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FieldValue {
    /// Text data; analyzed for `Text` fields, verbatim for `String` fields.
    Text(String),
    /// 64-bit signed integer.
    Integer(i64),
    /// 64-bit floating-point number.
    Float(f64),
}

impl FieldValue {
    /// Get the value as text, if it is text.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Get the value as a float, converting integers.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Integer(i) => Some(*i as f64),
            FieldValue::Float(f) => Some(*f),
            FieldValue::Text(_) => None,
        }
    }

    /// Canonical term text used when the value is indexed as a single term.
    pub fn to_term(&self) -> String {
        self.to_string()
    }

    /// Total order used for sorting and range filtering.
    ///
    /// Numbers compare numerically (integers and floats are comparable with
    /// each other, NaN sorts last), text compares lexicographically, and
    /// numbers sort before text.
    pub fn compare(&self, other: &FieldValue) -> Ordering {
        match (self, other) {
            (FieldValue::Text(a), FieldValue::Text(b)) => a.cmp(b),
            (FieldValue::Text(_), _) => Ordering::Greater,
            (_, FieldValue::Text(_)) => Ordering::Less,
            (FieldValue::Integer(a), FieldValue::Integer(b)) => a.cmp(b),
            (a, b) => {
                // Both numeric, at least one float.
                let (x, y) = (a.as_f64().unwrap_or(f64::NAN), b.as_f64().unwrap_or(f64::NAN));
                x.total_cmp(&y)
            }
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Text(s) => write!(f, "{s}"),
            FieldValue::Integer(i) => write!(f, "{i}"),
            FieldValue::Float(x) => write!(f, "{x}"),
        }
    }
}

/// A document: named field values.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Document {
    fields: BTreeMap<String, FieldValue>,
}

impl Document {
    /// Create an empty document.
    pub fn new() -> Self {
        Document::default()
    }

    /// Start building a document.
    pub fn builder() -> DocumentBuilder {
        DocumentBuilder::default()
    }

    /// Set a field value, replacing any previous value.
    pub fn add_field<S: Into<String>>(&mut self, name: S, value: FieldValue) {
        self.fields.insert(name.into(), value);
    }

    /// Get a field value.
    pub fn get_field(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    /// Check whether the document has a field.
    pub fn has_field(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    /// Iterate over fields in name order.
    pub fn fields(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether the document has no fields.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Builder for [`Document`].
#[derive(Debug, Default)]
pub struct DocumentBuilder {
    document: Document,
}

impl DocumentBuilder {
    /// Add a text value.
    pub fn add_text<S: Into<String>, T: Into<String>>(mut self, name: S, text: T) -> Self {
        self.document.add_field(name, FieldValue::Text(text.into()));
        self
    }

    /// Add an integer value.
    pub fn add_integer<S: Into<String>>(mut self, name: S, value: i64) -> Self {
        self.document.add_field(name, FieldValue::Integer(value));
        self
    }

    /// Add a float value.
    pub fn add_float<S: Into<String>>(mut self, name: S, value: f64) -> Self {
        self.document.add_field(name, FieldValue::Float(value));
        self
    }

    /// Finish building.
    pub fn build(self) -> Document {
        self.document
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_builder() {
        let doc = Document::builder()
            .add_text("title", "hello")
            .add_integer("year", 2020)
            .build();

        assert_eq!(doc.len(), 2);
        assert!(doc.has_field("title"));
        assert!(!doc.has_field("body"));
        assert_eq!(doc.get_field("title").and_then(|v| v.as_text()), Some("hello"));
    }

    #[test]
    fn test_field_value_compare() {
        let one = FieldValue::Integer(1);
        let two_and_half = FieldValue::Float(2.5);
        let text = FieldValue::Text("a".to_string());

        assert_eq!(one.compare(&two_and_half), Ordering::Less);
        assert_eq!(two_and_half.compare(&one), Ordering::Greater);
        assert_eq!(one.compare(&text), Ordering::Less);
        assert_eq!(
            FieldValue::Text("apple".into()).compare(&FieldValue::Text("banana".into())),
            Ordering::Less
        );
    }

    #[test]
    fn test_field_value_term() {
        assert_eq!(FieldValue::Integer(42).to_term(), "42");
        assert_eq!(FieldValue::Text("Rust".into()).to_term(), "Rust");
    }
}
