//! Aggregate views over stored documents.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::model::address::EmailAddress;
use crate::model::document::IndexedDocument;
use crate::parser::header::parse_date;

/// Label used for documents indexed without a thread.
pub const UNKNOWN_THREAD: &str = "Unknown";

/// Per-thread document count and date range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ThreadSummary {
    pub name: String,
    pub documents: usize,
    pub oldest: Option<DateTime<Utc>>,
    pub newest: Option<DateTime<Utc>>,
}

/// Group documents by thread label, sorted by name.
///
/// Documents without a thread are counted under [`UNKNOWN_THREAD`]. Dates
/// that do not parse are ignored for the range.
pub fn thread_summaries<'a>(
    documents: impl IntoIterator<Item = &'a IndexedDocument>,
) -> Vec<ThreadSummary> {
    let mut threads: BTreeMap<String, ThreadSummary> = BTreeMap::new();

    for doc in documents {
        let name = doc
            .metadata
            .thread
            .clone()
            .unwrap_or_else(|| UNKNOWN_THREAD.to_string());
        let summary = threads.entry(name.clone()).or_insert_with(|| ThreadSummary {
            name,
            documents: 0,
            oldest: None,
            newest: None,
        });
        summary.documents += 1;

        if let Some(date) = doc.metadata.date.as_deref().and_then(parse_date) {
            summary.oldest = Some(summary.oldest.map_or(date, |d| d.min(date)));
            summary.newest = Some(summary.newest.map_or(date, |d| d.max(date)));
        }
    }

    threads.into_values().collect()
}

/// The `n` most frequent senders with their document counts.
///
/// Senders are grouped by lower-cased address and shown as first seen.
/// Ties are ordered by name.
pub fn top_senders<'a>(
    documents: impl IntoIterator<Item = &'a IndexedDocument>,
    n: usize,
) -> Vec<(String, usize)> {
    let mut counts: HashMap<String, (String, usize)> = HashMap::new();
    for doc in documents {
        let Some(from) = doc.metadata.from.as_deref() else {
            continue;
        };
        let sender = EmailAddress::parse(from);
        let entry = counts
            .entry(sender.key())
            .or_insert_with(|| (sender.to_string(), 0));
        entry.1 += 1;
    }

    let mut sorted: Vec<(String, usize)> = counts.into_values().collect();
    sorted.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    sorted.truncate(n);
    sorted
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::document::DocumentMetadata;

    fn doc(thread: Option<&str>, from: Option<&str>, date: Option<&str>) -> IndexedDocument {
        IndexedDocument {
            content: String::new(),
            metadata: DocumentMetadata {
                from: from.map(str::to_string),
                date: date.map(str::to_string),
                thread: thread.map(str::to_string),
                source: "s".into(),
                ..DocumentMetadata::default()
            },
        }
    }

    #[test]
    fn test_thread_summaries_group_and_sort() {
        let docs = vec![
            doc(Some("phoenix"), None, Some("2025-04-23")),
            doc(None, None, None),
            doc(Some("apollo"), None, Some("not a date")),
            doc(Some("phoenix"), None, Some("2025-04-21")),
        ];
        let summaries = thread_summaries(&docs);
        let names: Vec<&str> = summaries.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["Unknown", "apollo", "phoenix"]);

        let phoenix = &summaries[2];
        assert_eq!(phoenix.documents, 2);
        assert_eq!(phoenix.oldest.unwrap().format("%Y-%m-%d").to_string(), "2025-04-21");
        assert_eq!(phoenix.newest.unwrap().format("%Y-%m-%d").to_string(), "2025-04-23");
        assert_eq!(summaries[1].oldest, None);
    }

    #[test]
    fn test_top_senders_groups_by_address() {
        let docs = vec![
            doc(None, Some("Alice <alice@example.com>"), None),
            doc(None, Some("ALICE@example.com"), None),
            doc(None, Some("bob@example.com"), None),
            doc(None, None, None),
        ];
        let top = top_senders(&docs, 5);
        assert_eq!(top[0], ("Alice <alice@example.com>".to_string(), 2));
        assert_eq!(top[1], ("bob@example.com".to_string(), 1));
        assert_eq!(top_senders(&docs, 1).len(), 1);
    }
}
