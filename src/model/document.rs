//! Documents as stored in the vector index.

use serde::{Deserialize, Serialize};

use crate::model::record::EmailRecord;
use crate::parser::header::decode_encoded_words;
use crate::parser::trail;

/// Metadata attached to every stored document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    pub from: Option<String>,
    pub to: Option<String>,
    pub subject: Option<String>,
    /// Raw date string as it appeared in the message.
    pub date: Option<String>,
    /// Originating file name or segment label.
    pub source: String,
    /// Caller-supplied thread label.
    pub thread: Option<String>,
}

/// Metadata fields a search can be filtered on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetadataKey {
    From,
    To,
    Subject,
    Date,
    Source,
    Thread,
}

impl DocumentMetadata {
    /// Value of a metadata field, if set.
    pub fn get(&self, key: MetadataKey) -> Option<&str> {
        match key {
            MetadataKey::From => self.from.as_deref(),
            MetadataKey::To => self.to.as_deref(),
            MetadataKey::Subject => self.subject.as_deref(),
            MetadataKey::Date => self.date.as_deref(),
            MetadataKey::Source => Some(self.source.as_str()),
            MetadataKey::Thread => self.thread.as_deref(),
        }
    }
}

/// A normalized document ready to embed and store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexedDocument {
    /// Text that is embedded and shown to the model.
    pub content: String,
    pub metadata: DocumentMetadata,
}

impl IndexedDocument {
    /// Build a document from a parsed record.
    ///
    /// With `reorder_marker` set, the body's quote trail is reversed so the
    /// latest reply comes first; otherwise the trimmed body is used as is.
    pub fn from_record(
        record: &EmailRecord,
        thread: Option<&str>,
        reorder_marker: Option<&str>,
    ) -> Self {
        let body = record.body_text();
        let content = match reorder_marker {
            Some(marker) => trail::reorder(&body, marker),
            None => body,
        };

        Self {
            content,
            metadata: DocumentMetadata {
                from: record.header("from").map(decode_encoded_words),
                to: record.header("to").map(decode_encoded_words),
                subject: record.header("subject").map(decode_encoded_words),
                date: record.date_raw().map(str::to_string),
                source: record.source_identifier().to_string(),
                thread: thread.map(str::to_string),
            },
        }
    }
}
