//! Vector document store: embedding-backed similarity and MMR search with
//! metadata filtering, persisted to a single file.

pub mod file;
pub mod format;
pub mod mmr;
pub mod summary;

pub use file::FileStore;

use crate::error::Result;
use crate::model::document::{DocumentMetadata, IndexedDocument, MetadataKey};

/// Opaque identifier assigned on insertion.
pub type DocumentId = u64;

/// Equality filter on one metadata field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataFilter {
    pub key: MetadataKey,
    pub value: String,
}

impl MetadataFilter {
    pub fn new(key: MetadataKey, value: impl Into<String>) -> Self {
        Self {
            key,
            value: value.into(),
        }
    }

    /// Restrict to one thread label.
    pub fn thread(value: impl Into<String>) -> Self {
        Self::new(MetadataKey::Thread, value)
    }

    /// Whether `metadata` carries exactly the filter value. Missing fields never match.
    pub fn matches(&self, metadata: &DocumentMetadata) -> bool {
        metadata.get(self.key) == Some(self.value.as_str())
    }
}

/// A store of embedded documents.
///
/// Searches take `&mut self` because implementations may cache query embeddings.
pub trait DocumentStore {
    /// Embed and insert a document. No deduplication: inserting the same
    /// document twice yields two entries.
    fn upsert(&mut self, document: IndexedDocument) -> Result<DocumentId>;

    /// The `k` documents most similar to `query`, best first.
    fn similarity_search(
        &mut self,
        query: &str,
        k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<IndexedDocument>>;

    /// Up to `k` documents chosen by maximal marginal relevance among the
    /// `fetch_k` most similar ones.
    fn mmr_search(
        &mut self,
        query: &str,
        k: usize,
        fetch_k: usize,
        lambda: f32,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<IndexedDocument>>;

    /// All stored documents in insertion order.
    fn documents(&self) -> Vec<&IndexedDocument>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Persist pending changes.
    fn flush(&mut self) -> Result<()>;
}
