//! Storage-layer interfaces and an in-memory reference index.

pub mod memory;
mod reader;

pub use self::reader::{
    EmptyPostingCursor, NO_MORE_DOCS, PostingListCursor, Searcher, SegmentReader,
};
