//! Indexing pipeline: parse files, build documents, embed and store them.
//!
//! Failures are tolerated per record. A file that cannot be read or parsed,
//! or a document that fails to embed, is reported in
//! [`IndexingResult::errors`] and the batch carries on.

use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::error::{Result, TrailError};
use crate::model::document::IndexedDocument;
use crate::model::record::EmailRecord;
use crate::parser::email::{load_email_file, ParseMode};
use crate::parser::header::decode_text_bytes;
use crate::parser::splitter::ThreadSplitter;
use crate::parser::trail::DEFAULT_MARKER;
use crate::store::DocumentStore;

/// Files with this suffix are intermediate output and never indexed.
const PARSED_SUFFIX: &str = "-parsed.txt";

/// How records are turned into documents.
#[derive(Debug, Clone)]
pub struct IndexOptions {
    /// Reverse quote trails on this marker; `None` keeps bodies as written.
    pub reorder_marker: Option<String>,
    pub parse_mode: ParseMode,
    /// Treat each input file as a multi-message blob and split it.
    pub split: Option<ThreadSplitter>,
    /// Maximum subject characters in segment labels.
    pub label_max_len: usize,
}

impl Default for IndexOptions {
    fn default() -> Self {
        Self {
            reorder_marker: Some(DEFAULT_MARKER.to_string()),
            parse_mode: ParseMode::Lenient,
            split: None,
            label_max_len: 60,
        }
    }
}

/// One record that could not be indexed.
#[derive(Debug)]
pub struct IndexingError {
    pub source_id: String,
    pub error: TrailError,
}

/// Outcome of an indexing batch.
#[derive(Debug, Default)]
pub struct IndexingResult {
    /// Documents stored.
    pub count: usize,
    pub errors: Vec<IndexingError>,
}

/// Store one document per record, tagged with `thread`.
///
/// The store is flushed once at the end; a flush failure fails the whole call.
pub fn index_records<S: DocumentStore + ?Sized>(
    store: &mut S,
    records: &[EmailRecord],
    thread: Option<&str>,
    options: &IndexOptions,
    progress: Option<&dyn Fn(u64, u64)>,
) -> Result<IndexingResult> {
    let mut result = IndexingResult::default();
    let total = records.len() as u64;

    for (i, record) in records.iter().enumerate() {
        let document =
            IndexedDocument::from_record(record, thread, options.reorder_marker.as_deref());
        match store.upsert(document) {
            Ok(id) => {
                debug!(id, source = record.source_identifier(), "Indexed record");
                result.count += 1;
            }
            Err(error) => {
                warn!(source = record.source_identifier(), error = %error, "Failed to index record");
                result.errors.push(IndexingError {
                    source_id: record.source_identifier().to_string(),
                    error,
                });
            }
        }
        if let Some(cb) = progress {
            cb(i as u64 + 1, total);
        }
    }

    store.flush()?;
    info!(
        indexed = result.count,
        failed = result.errors.len(),
        thread = thread.unwrap_or("-"),
        "Indexing finished"
    );
    Ok(result)
}

/// Parse every file under `paths` and index the resulting records.
///
/// Directories contribute their `*.txt` files (not recursively, sorted by
/// name, skipping `*-parsed.txt`). With `options.split` set, each file is
/// split into segments, one record per segment.
pub fn index_paths<S: DocumentStore + ?Sized>(
    store: &mut S,
    paths: &[PathBuf],
    thread: Option<&str>,
    options: &IndexOptions,
    progress: Option<&dyn Fn(u64, u64)>,
) -> Result<IndexingResult> {
    let mut records = Vec::new();
    let mut errors = Vec::new();

    for file in collect_files(paths)? {
        let loaded = match &options.split {
            Some(splitter) => read_blob(&file)
                .map(|blob| segment_records(&blob, &file_stem(&file), splitter, options.label_max_len)),
            None => load_email_file(&file, options.parse_mode).map(|r| vec![r]),
        };
        match loaded {
            Ok(mut recs) => records.append(&mut recs),
            Err(error) => {
                warn!(path = %file.display(), error = %error, "Skipping unreadable file");
                errors.push(IndexingError {
                    source_id: file.display().to_string(),
                    error,
                });
            }
        }
    }

    let mut result = index_records(store, &records, thread, options, progress)?;
    errors.append(&mut result.errors);
    result.errors = errors;
    Ok(result)
}

/// Split a blob and convert each segment to a record.
///
/// Segments are labeled `{base}_part_{n}[_{subject}].txt`; when nothing
/// survives the length filter the whole blob becomes `{base}_full.txt`.
pub fn segment_records(
    blob: &str,
    base: &str,
    splitter: &ThreadSplitter,
    label_max_len: usize,
) -> Vec<EmailRecord> {
    let segments = splitter.split(blob);
    if segments.is_empty() {
        return splitter
            .split_or_whole(blob)
            .iter()
            .map(|seg| seg.to_record(format!("{base}_full.txt")))
            .collect();
    }
    segments
        .iter()
        .map(|seg| seg.to_record(format!("{}.txt", seg.label(base, label_max_len))))
        .collect()
}

/// Expand directories into their indexable text files.
pub fn collect_files(paths: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for path in paths {
        if path.is_dir() {
            let mut found: Vec<PathBuf> = std::fs::read_dir(path)
                .map_err(|e| TrailError::io(path, e))?
                .filter_map(|entry| entry.ok().map(|e| e.path()))
                .filter(|p| p.is_file() && is_indexable(p))
                .collect();
            found.sort();
            debug!(dir = %path.display(), files = found.len(), "Expanded directory");
            files.extend(found);
        } else {
            files.push(path.clone());
        }
    }
    Ok(files)
}

fn is_indexable(path: &Path) -> bool {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    name.ends_with(".txt") && !name.ends_with(PARSED_SUFFIX)
}

fn read_blob(path: &Path) -> Result<String> {
    let bytes = std::fs::read(path).map_err(|e| TrailError::io(path, e))?;
    Ok(decode_text_bytes(&bytes))
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "thread".to_string())
}
