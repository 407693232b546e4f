//! Query system: query trees, compilation, matchers and collectors.

pub mod boolean;
pub mod collector;
pub mod compiler;
pub mod matcher;
pub mod phrase;
#[allow(clippy::module_inception)]
pub mod query;
pub mod range;
pub mod series;
pub mod sort;

pub use self::boolean::{AndMatcher, NotMatcher, OrMatcher, ReqOptMatcher};
pub use self::collector::{Collector, CountCollector, TopDocsCollector};
pub use self::compiler::Compiler;
pub use self::matcher::{MatchAllMatcher, Matcher, NoMatchMatcher, TermMatcher};
pub use self::phrase::PhraseMatcher;
pub use self::query::{Query, QueryKind};
pub use self::range::{RangeBounds, RangeMatcher};
pub use self::series::{SeriesMatch, SeriesMatcher};
pub use self::sort::{HitQueue, MatchDoc, SortKind, SortRule, SortSpec};
