//! File-backed vector store.

use std::fs::File;
use std::io::Write;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};

use lru::LruCache;
use tracing::{debug, info};

use crate::backend::Embedder;
use crate::error::{Result, TrailError};
use crate::model::document::IndexedDocument;
use crate::store::format::{
    model_fingerprint, sha256, StoreHeader, StoredEntry, HEADER_SIZE, MAGIC, STORE_FILE_NAME,
    VERSION,
};
use crate::store::mmr::{cosine_similarity, mmr_select};
use crate::store::{DocumentId, DocumentStore, MetadataFilter};

/// Default number of query embeddings kept in the LRU cache.
pub const DEFAULT_QUERY_CACHE_SIZE: usize = 64;

/// Documents and their embeddings held in memory, written to
/// `<dir>/documents.mtstore` on [`flush`](DocumentStore::flush).
///
/// A store is bound to one embedding model: opening it with an embedder
/// whose model name or vector length differs is an error.
pub struct FileStore {
    path: Option<PathBuf>,
    embedder: Box<dyn Embedder>,
    entries: Vec<StoredEntry>,
    dimension: Option<usize>,
    next_id: u64,
    dirty: bool,
    query_cache: LruCache<String, Vec<f32>>,
}

impl FileStore {
    /// Open the store in `dir`, or start an empty one if it has no store file yet.
    pub fn open(
        dir: impl AsRef<Path>,
        embedder: Box<dyn Embedder>,
        query_cache_size: usize,
    ) -> Result<Self> {
        let path = store_file_path(dir.as_ref());
        let mut store = Self::new(Some(path.clone()), embedder, query_cache_size);

        if !path.exists() {
            debug!(path = %path.display(), "No store file yet, starting empty");
            return Ok(store);
        }

        let data = std::fs::read(&path).map_err(|e| TrailError::io(&path, e))?;
        let (header, entries) = decode(&path, &data)?;

        if header.model_fingerprint != model_fingerprint(store.embedder.model_name()) {
            return Err(TrailError::InvalidStore {
                path,
                reason: format!(
                    "built with a different embedding model than '{}'",
                    store.embedder.model_name()
                ),
            });
        }

        let dimension = header.dimension as usize;
        if dimension > 0 {
            if let Some(found) = store.embedder.dimension() {
                if found != dimension {
                    return Err(TrailError::DimensionMismatch {
                        expected: dimension,
                        found,
                    });
                }
            }
            store.dimension = Some(dimension);
        }

        store.next_id = entries.iter().map(|e| e.id + 1).max().unwrap_or(0);
        store.entries = entries;
        info!(
            path = %path.display(),
            documents = store.entries.len(),
            "Opened document store"
        );
        Ok(store)
    }

    /// A store that is never written to disk.
    pub fn in_memory(embedder: Box<dyn Embedder>) -> Self {
        Self::new(None, embedder, DEFAULT_QUERY_CACHE_SIZE)
    }

    fn new(path: Option<PathBuf>, embedder: Box<dyn Embedder>, query_cache_size: usize) -> Self {
        let cache_size = NonZeroUsize::new(query_cache_size)
            .unwrap_or(NonZeroUsize::MIN);
        Self {
            path,
            dimension: embedder.dimension(),
            embedder,
            entries: Vec::new(),
            next_id: 0,
            dirty: false,
            query_cache: LruCache::new(cache_size),
        }
    }

    /// Store file location, `None` for in-memory stores.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Embedding length, once known.
    pub fn dimension(&self) -> Option<usize> {
        self.dimension
    }

    /// Name of the embedding model the store is bound to.
    pub fn model_name(&self) -> &str {
        self.embedder.model_name()
    }

    /// Size of the store file on disk (0 when missing or in memory).
    pub fn file_size(&self) -> u64 {
        self.path
            .as_deref()
            .and_then(|p| std::fs::metadata(p).ok())
            .map(|m| m.len())
            .unwrap_or(0)
    }

    fn check_dimension(&mut self, found: usize) -> Result<()> {
        match self.dimension {
            Some(expected) if expected != found => {
                Err(TrailError::DimensionMismatch { expected, found })
            }
            Some(_) => Ok(()),
            None => {
                self.dimension = Some(found);
                Ok(())
            }
        }
    }

    fn query_vector(&mut self, query: &str) -> Result<Vec<f32>> {
        if let Some(vector) = self.query_cache.get(query) {
            return Ok(vector.clone());
        }
        let vector = self.embedder.embed(query)?;
        if let Some(expected) = self.dimension {
            if vector.len() != expected {
                return Err(TrailError::DimensionMismatch {
                    expected,
                    found: vector.len(),
                });
            }
        }
        self.query_cache.put(query.to_string(), vector.clone());
        Ok(vector)
    }

    /// Indices of entries passing `filter`, ranked by similarity to `query_vector`.
    fn ranked(&self, query_vector: &[f32], candidates: &[usize]) -> Vec<(usize, f32)> {
        let mut scored: Vec<(usize, f32)> = candidates
            .iter()
            .map(|&i| (i, cosine_similarity(query_vector, &self.entries[i].vector)))
            .collect();
        // Stable: equal scores keep insertion order.
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        scored
    }

    fn candidates(&self, filter: Option<&MetadataFilter>) -> Vec<usize> {
        self.entries
            .iter()
            .enumerate()
            .filter(|(_, e)| filter.map_or(true, |f| f.matches(&e.document.metadata)))
            .map(|(i, _)| i)
            .collect()
    }
}

impl DocumentStore for FileStore {
    fn upsert(&mut self, document: IndexedDocument) -> Result<DocumentId> {
        let vector = self.embedder.embed(&document.content)?;
        self.check_dimension(vector.len())?;

        let id = self.next_id;
        self.next_id += 1;
        debug!(id, source = %document.metadata.source, "Stored document");
        self.entries.push(StoredEntry {
            id,
            document,
            vector,
        });
        self.dirty = true;
        Ok(id)
    }

    fn similarity_search(
        &mut self,
        query: &str,
        k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<IndexedDocument>> {
        let candidates = self.candidates(filter);
        if candidates.is_empty() || k == 0 {
            return Ok(Vec::new());
        }
        let query_vector = self.query_vector(query)?;
        Ok(self
            .ranked(&query_vector, &candidates)
            .into_iter()
            .take(k)
            .map(|(i, _)| self.entries[i].document.clone())
            .collect())
    }

    fn mmr_search(
        &mut self,
        query: &str,
        k: usize,
        fetch_k: usize,
        lambda: f32,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<IndexedDocument>> {
        let candidates = self.candidates(filter);
        if candidates.is_empty() || k == 0 {
            return Ok(Vec::new());
        }
        let query_vector = self.query_vector(query)?;
        let pool: Vec<usize> = self
            .ranked(&query_vector, &candidates)
            .into_iter()
            .take(fetch_k.max(k))
            .map(|(i, _)| i)
            .collect();

        let vectors: Vec<&[f32]> = pool.iter().map(|&i| self.entries[i].vector.as_slice()).collect();
        let picked = mmr_select(&query_vector, &vectors, k, lambda);
        Ok(picked
            .into_iter()
            .map(|p| self.entries[pool[p]].document.clone())
            .collect())
    }

    fn documents(&self) -> Vec<&IndexedDocument> {
        self.entries.iter().map(|e| &e.document).collect()
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn flush(&mut self) -> Result<()> {
        let Some(path) = self.path.clone() else {
            return Ok(());
        };
        if !self.dirty {
            return Ok(());
        }

        let payload = bincode::serialize(&self.entries).map_err(|e| TrailError::InvalidStore {
            path: path.clone(),
            reason: format!("Payload serialization failed: {e}"),
        })?;
        let header = StoreHeader {
            magic: *MAGIC,
            version: VERSION,
            flags: 0,
            document_count: self.entries.len() as u64,
            dimension: self.dimension.unwrap_or(0) as u32,
            model_fingerprint: model_fingerprint(self.embedder.model_name()),
            payload_sha256: sha256(&payload),
        };
        let header_bytes = bincode::serialize(&header).map_err(|e| TrailError::InvalidStore {
            path: path.clone(),
            reason: format!("Header serialization failed: {e}"),
        })?;

        let mut padded_header = vec![0u8; HEADER_SIZE];
        let copy_len = header_bytes.len().min(HEADER_SIZE);
        padded_header[..copy_len].copy_from_slice(&header_bytes[..copy_len]);

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| TrailError::io(parent, e))?;
        }
        let tmp = path.with_extension("mtstore.tmp");
        write_file(&tmp, &padded_header, &payload)?;
        std::fs::rename(&tmp, &path).map_err(|e| TrailError::io(&path, e))?;

        self.dirty = false;
        info!(
            path = %path.display(),
            documents = self.entries.len(),
            "Document store written"
        );
        Ok(())
    }
}

/// Store file inside a store directory.
pub fn store_file_path(dir: &Path) -> PathBuf {
    dir.join(STORE_FILE_NAME)
}

/// Validate and decode a store file.
fn decode(path: &Path, data: &[u8]) -> Result<(StoreHeader, Vec<StoredEntry>)> {
    let invalid = |reason: String| TrailError::InvalidStore {
        path: path.to_path_buf(),
        reason,
    };

    if data.len() < HEADER_SIZE {
        return Err(invalid("File too small".into()));
    }

    let header: StoreHeader = bincode::deserialize(&data[..HEADER_SIZE])
        .map_err(|e| invalid(format!("Header deserialization failed: {e}")))?;
    header.validate().map_err(invalid)?;

    let payload = &data[HEADER_SIZE..];
    if sha256(payload) != header.payload_sha256 {
        return Err(invalid("Payload checksum mismatch".into()));
    }

    let entries: Vec<StoredEntry> = bincode::deserialize(payload)
        .map_err(|e| invalid(format!("Payload deserialization failed: {e}")))?;
    if entries.len() as u64 != header.document_count {
        return Err(invalid(format!(
            "Document count mismatch: header says {}, found {}",
            header.document_count,
            entries.len()
        )));
    }
    Ok((header, entries))
}

fn write_file(path: &Path, header: &[u8], payload: &[u8]) -> Result<()> {
    let mut file = File::create(path).map_err(|e| TrailError::io(path, e))?;
    file.write_all(header).map_err(|e| TrailError::io(path, e))?;
    file.write_all(payload).map_err(|e| TrailError::io(path, e))?;
    file.sync_all().map_err(|e| TrailError::io(path, e))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::HashingEmbedder;
    use crate::model::document::DocumentMetadata;

    fn doc(content: &str, source: &str, thread: Option<&str>) -> IndexedDocument {
        IndexedDocument {
            content: content.to_string(),
            metadata: DocumentMetadata {
                source: source.to_string(),
                thread: thread.map(str::to_string),
                ..DocumentMetadata::default()
            },
        }
    }

    fn hashing() -> Box<dyn Embedder> {
        Box::new(HashingEmbedder::new(512))
    }

    fn seeded() -> FileStore {
        let mut store = FileStore::in_memory(hashing());
        store.upsert(doc("phoenix kickoff is on tuesday", "a.txt", Some("phoenix"))).unwrap();
        store.upsert(doc("budget review for phoenix", "b.txt", Some("phoenix"))).unwrap();
        store.upsert(doc("the office party is friday", "c.txt", Some("social"))).unwrap();
        store
    }

    #[test]
    fn test_upsert_assigns_increasing_ids_without_dedup() {
        let mut store = FileStore::in_memory(hashing());
        let a = store.upsert(doc("same", "a.txt", None)).unwrap();
        let b = store.upsert(doc("same", "a.txt", None)).unwrap();
        assert_eq!((a, b), (0, 1));
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_similarity_search_ranks_by_relevance() {
        let mut store = seeded();
        let hits = store.similarity_search("when is the phoenix kickoff", 2, None).unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].metadata.source, "a.txt");
    }

    #[test]
    fn test_filter_restricts_results() {
        let mut store = seeded();
        let filter = MetadataFilter::thread("social");
        let hits = store.similarity_search("phoenix kickoff", 5, Some(&filter)).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].metadata.source, "c.txt");

        let hits = store
            .mmr_search("phoenix", 5, 20, 0.5, Some(&MetadataFilter::thread("nope")))
            .unwrap();
        assert!(hits.is_empty());
    }

    #[test]
    fn test_mmr_returns_at_most_k() {
        let mut store = seeded();
        let hits = store.mmr_search("phoenix", 2, 20, 0.5, None).unwrap();
        assert_eq!(hits.len(), 2);
    }

    #[test]
    fn test_flush_and_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let mut store = FileStore::open(dir.path(), hashing(), 8).unwrap();
            store.upsert(doc("phoenix kickoff is on tuesday", "a.txt", Some("phoenix"))).unwrap();
            store.flush().unwrap();
        }
        let mut store = FileStore::open(dir.path(), hashing(), 8).unwrap();
        assert_eq!(store.len(), 1);
        assert_eq!(store.dimension(), Some(512));
        let id = store.upsert(doc("more", "b.txt", None)).unwrap();
        assert_eq!(id, 1);
        assert!(store.file_size() > HEADER_SIZE as u64);
    }

    #[test]
    fn test_reopen_with_other_model_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = FileStore::open(dir.path(), hashing(), 8).unwrap();
        store.upsert(doc("text", "a.txt", None)).unwrap();
        store.flush().unwrap();

        let err = FileStore::open(dir.path(), Box::new(HashingEmbedder::new(64)), 8)
            .err()
            .unwrap();
        assert!(matches!(err, TrailError::InvalidStore { .. }));
    }

    #[test]
    fn test_corrupt_payload_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = FileStore::open(dir.path(), hashing(), 8).unwrap();
        store.upsert(doc("text", "a.txt", None)).unwrap();
        store.flush().unwrap();

        let path = store_file_path(dir.path());
        let mut bytes = std::fs::read(&path).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xFF;
        std::fs::write(&path, bytes).unwrap();

        let err = FileStore::open(dir.path(), hashing(), 8).err().unwrap();
        assert!(err.to_string().contains("checksum"));
    }

    #[test]
    fn test_truncated_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(store_file_path(dir.path()), b"short").unwrap();
        assert!(matches!(
            FileStore::open(dir.path(), hashing(), 8),
            Err(TrailError::InvalidStore { .. })
        ));
    }

    #[test]
    fn test_empty_store_search_does_not_embed() {
        struct Refusing;
        impl Embedder for Refusing {
            fn embed(&self, _: &str) -> Result<Vec<f32>> {
                Err(TrailError::Embedding("down".into()))
            }
            fn dimension(&self) -> Option<usize> {
                None
            }
            fn model_name(&self) -> &str {
                "refusing"
            }
        }
        let mut store = FileStore::in_memory(Box::new(Refusing));
        assert!(store.mmr_search("anything", 3, 10, 0.5, None).unwrap().is_empty());
    }
}
