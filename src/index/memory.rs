//! In-memory reference index.
//!
//! Implements the storage-layer traits over plain vectors so the engine can
//! run end-to-end without a real storage layer. Text fields are split on
//! Unicode word boundaries and lowercased; every other field indexes its
//! value as a single term. Each call to [`MemoryIndex::add_documents`]
//! commits one immutable segment.

use std::collections::BTreeMap;
use std::sync::Arc;

use ahash::AHashMap;
use parking_lot::RwLock;
use unicode_segmentation::UnicodeSegmentation;

use crate::config::SearchConfig;
use crate::document::{Document, FieldValue};
use crate::error::{LanceError, Result};
use crate::index::reader::{EmptyPostingCursor, NO_MORE_DOCS, PostingListCursor, SegmentReader};
use crate::schema::{FieldDefinition, FieldType, Schema};
use crate::search::IndexSearcher;
use crate::similarity::{self, Similarity};

/// One document's entry in a posting list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Posting {
    /// Segment-local document id.
    pub doc_id: u64,
    /// Ascending positions of the term in the document.
    pub positions: Vec<u32>,
}

impl Posting {
    /// Create a posting.
    pub fn new(doc_id: u64, positions: Vec<u32>) -> Self {
        Posting { doc_id, positions }
    }
}

/// An immutable, doc-id-ordered posting list.
#[derive(Debug, Clone, Default)]
pub struct PostingList {
    postings: Vec<Posting>,
}

impl PostingList {
    /// Create a posting list; doc ids must be strictly ascending.
    pub fn new(postings: Vec<Posting>) -> Result<Self> {
        if let Some(pair) = postings.windows(2).find(|w| w[0].doc_id >= w[1].doc_id) {
            return Err(LanceError::index(format!(
                "posting doc ids not strictly ascending: {} then {}",
                pair[0].doc_id, pair[1].doc_id
            )));
        }
        if postings.iter().any(|p| p.doc_id == NO_MORE_DOCS) {
            return Err(LanceError::index("posting uses the reserved doc id"));
        }
        Ok(PostingList { postings })
    }

    /// Posting list with a single position per document.
    pub fn from_doc_ids(doc_ids: &[u64]) -> Result<Self> {
        Self::new(doc_ids.iter().map(|&d| Posting::new(d, vec![0])).collect())
    }

    /// Number of documents.
    pub fn len(&self) -> usize {
        self.postings.len()
    }

    /// Whether the list is empty.
    pub fn is_empty(&self) -> bool {
        self.postings.is_empty()
    }

    /// Open a cursor over a shared list.
    pub fn cursor(self: &Arc<Self>) -> MemoryPostingCursor {
        MemoryPostingCursor::new(Arc::clone(self))
    }
}

/// Cursor over a [`PostingList`].
#[derive(Debug)]
pub struct MemoryPostingCursor {
    list: Arc<PostingList>,
    position: usize,
    started: bool,
    last_target: u64,
}

impl MemoryPostingCursor {
    /// Create an unpositioned cursor.
    pub fn new(list: Arc<PostingList>) -> Self {
        MemoryPostingCursor {
            list,
            position: 0,
            started: false,
            last_target: 0,
        }
    }

    fn current(&self) -> Option<&Posting> {
        if self.started {
            self.list.postings.get(self.position)
        } else {
            None
        }
    }
}

impl PostingListCursor for MemoryPostingCursor {
    fn doc_id(&self) -> u64 {
        if !self.started {
            return 0;
        }
        self.current().map(|p| p.doc_id).unwrap_or(NO_MORE_DOCS)
    }

    fn freq(&self) -> u32 {
        self.current().map(|p| p.positions.len() as u32).unwrap_or(0)
    }

    fn positions(&self) -> &[u32] {
        self.current().map(|p| p.positions.as_slice()).unwrap_or(&[])
    }

    fn next(&mut self) -> Result<bool> {
        if !self.started {
            self.started = true;
        } else if self.position < self.list.postings.len() {
            self.position += 1;
        }
        Ok(self.position < self.list.postings.len())
    }

    fn skip_to(&mut self, target: u64) -> Result<bool> {
        assert!(
            target >= self.last_target,
            "posting cursor skip_to target regressed from {} to {}",
            self.last_target,
            target
        );
        self.last_target = target;
        self.started = true;

        let postings = &self.list.postings;
        if self.position >= postings.len() {
            return Ok(false);
        }
        if postings[self.position].doc_id < target {
            self.position += postings[self.position..].partition_point(|p| p.doc_id < target);
        }
        Ok(self.position < postings.len())
    }

    fn cost(&self) -> u64 {
        self.list.postings.len() as u64
    }
}

/// An immutable in-memory segment.
#[derive(Debug)]
pub struct MemorySegment {
    name: String,
    max_doc: u64,
    postings: AHashMap<String, BTreeMap<String, Arc<PostingList>>>,
    norms: AHashMap<String, Arc<[u8]>>,
    doc_values: AHashMap<String, Arc<[Option<FieldValue>]>>,
}

impl MemorySegment {
    /// Sorted term dictionary of a field.
    pub fn terms(&self, field: &str) -> Vec<&str> {
        self.postings
            .get(field)
            .map(|terms| terms.keys().map(|t| t.as_str()).collect())
            .unwrap_or_default()
    }
}

impl SegmentReader for MemorySegment {
    fn name(&self) -> &str {
        &self.name
    }

    fn max_doc(&self) -> u64 {
        self.max_doc
    }

    fn doc_freq(&self, field: &str, term: &str) -> u64 {
        self.postings
            .get(field)
            .and_then(|terms| terms.get(term))
            .map(|list| list.len() as u64)
            .unwrap_or(0)
    }

    fn posting_list(&self, field: &str, term: &str) -> Result<Box<dyn PostingListCursor>> {
        match self.postings.get(field).and_then(|terms| terms.get(term)) {
            Some(list) => Ok(Box::new(list.cursor())),
            None => Ok(Box::new(EmptyPostingCursor)),
        }
    }

    fn field_norms(&self, field: &str) -> Option<Arc<[u8]>> {
        self.norms.get(field).cloned()
    }

    fn doc_values(&self, field: &str) -> Option<Arc<[Option<FieldValue>]>> {
        self.doc_values.get(field).cloned()
    }
}

/// Accumulates documents into a [`MemorySegment`].
#[derive(Debug)]
pub struct SegmentBuilder {
    schema: Arc<Schema>,
    similarity: Arc<dyn Similarity>,
    postings: AHashMap<String, BTreeMap<String, Vec<Posting>>>,
    norms: AHashMap<String, Vec<u8>>,
    doc_values: AHashMap<String, Vec<Option<FieldValue>>>,
    max_doc: u64,
}

impl SegmentBuilder {
    /// Create an empty builder. Norms are encoded with `similarity`.
    pub fn new(schema: Arc<Schema>, similarity: Arc<dyn Similarity>) -> Self {
        SegmentBuilder {
            schema,
            similarity,
            postings: AHashMap::new(),
            norms: AHashMap::new(),
            doc_values: AHashMap::new(),
            max_doc: 0,
        }
    }

    fn check_value(name: &str, definition: &FieldDefinition, value: &FieldValue) -> Result<()> {
        let ok = match definition.field_type {
            FieldType::Text | FieldType::String => matches!(value, FieldValue::Text(_)),
            FieldType::Integer => matches!(value, FieldValue::Integer(_)),
            FieldType::Float => matches!(value, FieldValue::Integer(_) | FieldValue::Float(_)),
        };
        if ok {
            Ok(())
        } else {
            Err(LanceError::schema(format!(
                "field '{name}' of type {:?} cannot hold {value:?}",
                definition.field_type
            )))
        }
    }

    /// Add a document, returning its segment-local id.
    ///
    /// The whole document is validated before anything is indexed.
    pub fn add_document(&mut self, document: &Document) -> Result<u64> {
        for (name, value) in document.fields() {
            let definition = self.schema.field(name)?;
            Self::check_value(name, definition, value)?;
        }

        let doc_id = self.max_doc;
        for (name, value) in document.fields() {
            let field_type = self.schema.field_type(name)?;
            let (terms, stored) = match (field_type, value) {
                (FieldType::Text, FieldValue::Text(text)) => {
                    let mut terms: BTreeMap<String, Vec<u32>> = BTreeMap::new();
                    let mut length = 0u32;
                    for (position, word) in text.unicode_words().enumerate() {
                        terms.entry(word.to_lowercase()).or_default().push(position as u32);
                        length += 1;
                    }
                    let norm = self.similarity.encode_norm(self.similarity.length_norm(length));
                    let norms = self.norms.entry(name.to_string()).or_default();
                    norms.resize(doc_id as usize, 0);
                    norms.push(norm);
                    (terms, value.clone())
                }
                (FieldType::Float, FieldValue::Integer(i)) => {
                    let stored = FieldValue::Float(*i as f64);
                    (BTreeMap::from([(stored.to_term(), vec![0])]), stored)
                }
                _ => (BTreeMap::from([(value.to_term(), vec![0])]), value.clone()),
            };

            let field_postings = self.postings.entry(name.to_string()).or_default();
            for (term, positions) in terms {
                field_postings
                    .entry(term)
                    .or_default()
                    .push(Posting::new(doc_id, positions));
            }

            let values = self.doc_values.entry(name.to_string()).or_default();
            values.resize(doc_id as usize, None);
            values.push(Some(stored));
        }

        self.max_doc += 1;
        Ok(doc_id)
    }

    /// Number of documents added so far.
    pub fn max_doc(&self) -> u64 {
        self.max_doc
    }

    /// Freeze the accumulated documents into a segment.
    pub fn build(self) -> Result<MemorySegment> {
        let max_doc = self.max_doc as usize;

        let mut postings = AHashMap::with_capacity(self.postings.len());
        for (field, terms) in self.postings {
            let mut lists = BTreeMap::new();
            for (term, entries) in terms {
                lists.insert(term, Arc::new(PostingList::new(entries)?));
            }
            postings.insert(field, lists);
        }

        let norms: AHashMap<String, Arc<[u8]>> = self
            .norms
            .into_iter()
            .map(|(field, mut bytes)| {
                bytes.resize(max_doc, 0);
                (field, Arc::from(bytes))
            })
            .collect();

        let doc_values: AHashMap<String, Arc<[Option<FieldValue>]>> = self
            .doc_values
            .into_iter()
            .map(|(field, mut values)| {
                values.resize(max_doc, None);
                (field, Arc::from(values))
            })
            .collect();

        Ok(MemorySegment {
            name: format!("seg_{}", uuid::Uuid::new_v4().simple()),
            max_doc: self.max_doc,
            postings,
            norms,
            doc_values,
        })
    }
}

/// An index made of in-memory segments.
#[derive(Debug)]
pub struct MemoryIndex {
    schema: Arc<Schema>,
    similarity: Arc<dyn Similarity>,
    segments: RwLock<Vec<Arc<MemorySegment>>>,
}

impl MemoryIndex {
    /// Create an empty index using the default similarity for norms.
    pub fn new(schema: Schema) -> Self {
        Self::with_similarity(schema, similarity::default_similarity())
    }

    /// Create an empty index that encodes norms with `similarity`.
    pub fn with_similarity(schema: Schema, similarity: Arc<dyn Similarity>) -> Self {
        MemoryIndex {
            schema: Arc::new(schema),
            similarity,
            segments: RwLock::new(Vec::new()),
        }
    }

    /// The index schema.
    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    /// Index a batch of documents as one new segment.
    pub fn add_documents<I>(&self, documents: I) -> Result<Arc<MemorySegment>>
    where
        I: IntoIterator<Item = Document>,
    {
        let mut builder = SegmentBuilder::new(Arc::clone(&self.schema), Arc::clone(&self.similarity));
        for document in documents {
            builder.add_document(&document)?;
        }
        let segment = Arc::new(builder.build()?);

        tracing::debug!(
            target: "lance::index",
            segment = segment.name(),
            docs = segment.max_doc(),
            "committed segment"
        );
        self.segments.write().push(Arc::clone(&segment));
        Ok(segment)
    }

    /// Snapshot of the committed segments.
    pub fn segments(&self) -> Vec<Arc<dyn SegmentReader>> {
        self.segments
            .read()
            .iter()
            .map(|s| Arc::clone(s) as Arc<dyn SegmentReader>)
            .collect()
    }

    /// Number of committed segments.
    pub fn segment_count(&self) -> usize {
        self.segments.read().len()
    }

    /// Total documents across segments.
    pub fn max_doc(&self) -> u64 {
        self.segments.read().iter().map(|s| s.max_doc).sum()
    }

    /// Open a searcher over the current segments.
    pub fn searcher(&self, config: SearchConfig) -> Result<IndexSearcher> {
        IndexSearcher::new(Arc::clone(&self.schema), self.segments(), config)
    }
}
