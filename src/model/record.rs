//! Parsed email record: headers plus body lines.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use crate::parser::header;

/// Headers rendered first, in this order, by [`EmailRecord::to_text`].
const CANONICAL_ORDER: [&str; 5] = ["from", "to", "subject", "date", "cc"];

/// One email message as parsed from a text file, a thread segment or a Gmail export.
///
/// Built once by a parser and never modified afterwards; the indexing
/// pipeline turns it into an [`IndexedDocument`](super::document::IndexedDocument).
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct EmailRecord {
    headers: BTreeMap<String, String>,
    body: Vec<String>,
    source_identifier: String,
}

impl EmailRecord {
    /// Build a record. Header names are lower-cased; on collision the later value wins.
    pub fn new(
        headers: impl IntoIterator<Item = (String, String)>,
        body: Vec<String>,
        source_identifier: impl Into<String>,
    ) -> Self {
        let headers = headers
            .into_iter()
            .map(|(k, v)| (k.trim().to_lowercase(), v))
            .collect();
        Self {
            headers,
            body,
            source_identifier: source_identifier.into(),
        }
    }

    /// All headers, keyed by lower-case name.
    pub fn headers(&self) -> &BTreeMap<String, String> {
        &self.headers
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_lowercase())
            .map(String::as_str)
    }

    /// Body lines, without the header block and its separating blank line.
    pub fn body(&self) -> &[String] {
        &self.body
    }

    /// Body joined with `\n`, surrounding whitespace trimmed.
    pub fn body_text(&self) -> String {
        self.body.join("\n").trim().to_string()
    }

    /// File name or label the record came from.
    pub fn source_identifier(&self) -> &str {
        &self.source_identifier
    }

    /// Raw `Date:` value, or `Sent:` for Outlook-style headers.
    pub fn date_raw(&self) -> Option<&str> {
        self.header("date").or_else(|| self.header("sent"))
    }

    /// Parsed message date, if the raw value is understood.
    pub fn parsed_date(&self) -> Option<DateTime<Utc>> {
        self.date_raw().and_then(header::parse_date)
    }

    /// Whether the record carries neither headers nor body text.
    pub fn is_empty(&self) -> bool {
        self.headers.is_empty() && self.body.iter().all(|l| l.trim().is_empty())
    }

    /// Render in the plain-text file format: headers, one blank line, body.
    pub fn to_text(&self) -> String {
        let mut out = String::new();
        for name in CANONICAL_ORDER {
            if let Some(value) = self.headers.get(name) {
                out.push_str(&format!("{}: {}\n", display_name(name), value));
            }
        }
        for (name, value) in &self.headers {
            if !CANONICAL_ORDER.contains(&name.as_str()) {
                out.push_str(&format!("{}: {}\n", display_name(name), value));
            }
        }
        out.push('\n');
        out.push_str(&self.body_text());
        out.push('\n');
        out
    }
}

/// `reply-to` → `Reply-To`, `cc` → `Cc`.
fn display_name(name: &str) -> String {
    name.split('-')
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join("-")
}
