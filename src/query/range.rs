//! Range matcher over per-document field values.

use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use crate::document::FieldValue;
use crate::error::Result;
use crate::index::NO_MORE_DOCS;
use crate::query::matcher::{Matcher, check_target};

/// Compiled bounds of a range. A missing bound is unbounded.
#[derive(Debug, Clone, PartialEq)]
pub struct RangeBounds {
    pub lower: Option<FieldValue>,
    pub upper: Option<FieldValue>,
    pub include_lower: bool,
    pub include_upper: bool,
}

impl RangeBounds {
    /// Create range bounds.
    pub fn new(
        lower: Option<FieldValue>,
        upper: Option<FieldValue>,
        include_lower: bool,
        include_upper: bool,
    ) -> Self {
        RangeBounds {
            lower,
            upper,
            include_lower,
            include_upper,
        }
    }

    /// Whether `value` lies within the bounds.
    pub fn contains(&self, value: &FieldValue) -> bool {
        if let Some(lower) = &self.lower {
            match value.compare(lower) {
                Ordering::Less => return false,
                Ordering::Equal if !self.include_lower => return false,
                _ => {}
            }
        }
        if let Some(upper) = &self.upper {
            match value.compare(upper) {
                Ordering::Greater => return false,
                Ordering::Equal if !self.include_upper => return false,
                _ => {}
            }
        }
        true
    }
}

impl fmt::Display for RangeBounds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let open = if self.include_lower { '[' } else { '{' };
        let close = if self.include_upper { ']' } else { '}' };
        let bound = |value: &Option<FieldValue>| match value {
            Some(value) => value.to_string(),
            None => "*".to_string(),
        };
        write!(f, "{open}{} TO {}{close}", bound(&self.lower), bound(&self.upper))
    }
}

/// Matches documents whose field value lies within a range.
///
/// Scans the segment's doc-value column; documents without a value never
/// match. Every match scores the same constant.
#[derive(Debug)]
pub struct RangeMatcher {
    values: Arc<[Option<FieldValue>]>,
    bounds: RangeBounds,
    score: f32,
    doc: u64,
    started: bool,
    last_target: u64,
}

impl RangeMatcher {
    /// Create a range matcher over one field's values.
    pub fn new(values: Arc<[Option<FieldValue>]>, bounds: RangeBounds, score: f32) -> Self {
        let doc = if values.is_empty() { NO_MORE_DOCS } else { 0 };
        RangeMatcher {
            values,
            bounds,
            score,
            doc,
            started: false,
            last_target: 0,
        }
    }

    fn scan_from(&mut self, start: u64) -> bool {
        self.started = true;
        let start = start.min(self.values.len() as u64) as usize;
        let found = self.values[start..]
            .iter()
            .position(|value| value.as_ref().is_some_and(|v| self.bounds.contains(v)));
        match found {
            Some(offset) => {
                self.doc = (start + offset) as u64;
                true
            }
            None => {
                self.doc = NO_MORE_DOCS;
                false
            }
        }
    }
}

impl Matcher for RangeMatcher {
    fn doc_id(&self) -> u64 {
        self.doc
    }

    fn next(&mut self) -> Result<bool> {
        if self.doc == NO_MORE_DOCS {
            return Ok(false);
        }
        let start = if self.started { self.doc + 1 } else { 0 };
        Ok(self.scan_from(start))
    }

    fn advance(&mut self, target: u64) -> Result<bool> {
        check_target(&mut self.last_target, target);
        if self.doc == NO_MORE_DOCS {
            return Ok(false);
        }
        if self.started && self.doc >= target {
            return Ok(true);
        }
        Ok(self.scan_from(target))
    }

    fn score(&self) -> f32 {
        self.score
    }

    fn cost(&self) -> u64 {
        self.values.len() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::matcher::tests::collect_ids;

    fn years() -> Arc<[Option<FieldValue>]> {
        Arc::from(vec![
            Some(FieldValue::Integer(1999)),
            None,
            Some(FieldValue::Integer(2005)),
            Some(FieldValue::Integer(2010)),
            Some(FieldValue::Integer(2020)),
        ])
    }

    fn int(v: i64) -> Option<FieldValue> {
        Some(FieldValue::Integer(v))
    }

    #[test]
    fn test_bounds_contains() {
        let bounds = RangeBounds::new(int(10), int(20), true, false);
        assert!(bounds.contains(&FieldValue::Integer(10)));
        assert!(bounds.contains(&FieldValue::Integer(19)));
        assert!(!bounds.contains(&FieldValue::Integer(20)));
        assert!(!bounds.contains(&FieldValue::Integer(9)));
        assert!(bounds.contains(&FieldValue::Float(15.5)));

        let open = RangeBounds::new(None, Some(FieldValue::Text("m".into())), false, true);
        assert!(open.contains(&FieldValue::Text("apple".into())));
        assert!(open.contains(&FieldValue::Text("m".into())));
        assert!(!open.contains(&FieldValue::Text("zebra".into())));
    }

    #[test]
    fn test_bounds_display() {
        assert_eq!(RangeBounds::new(int(1), None, true, false).to_string(), "[1 TO *}");
    }

    #[test]
    fn test_range_matcher_inclusive() {
        let mut matcher = RangeMatcher::new(years(), RangeBounds::new(int(2005), int(2010), true, true), 1.5);
        assert_eq!(collect_ids(&mut matcher), vec![2, 3]);
    }

    #[test]
    fn test_range_matcher_exclusive() {
        let mut matcher = RangeMatcher::new(years(), RangeBounds::new(int(2005), int(2020), false, false), 1.0);
        assert!(matcher.next().unwrap());
        assert_eq!(matcher.doc_id(), 3);
        assert!(!matcher.next().unwrap());
    }

    #[test]
    fn test_range_matcher_skips_missing_values() {
        let mut matcher = RangeMatcher::new(years(), RangeBounds::new(None, None, true, true), 2.0);
        assert!(matcher.advance(1).unwrap());
        assert_eq!(matcher.doc_id(), 2);
        assert_eq!(matcher.score(), 2.0);
        assert!(matcher.advance(1).unwrap());
        assert_eq!(matcher.doc_id(), 2);
        assert_eq!(collect_ids(&mut matcher), vec![3, 4]);
    }
}
