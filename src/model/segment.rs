//! One message cut out of a multi-message blob.

use crate::model::record::EmailRecord;
use crate::parser::splitter::{classify_line, LineKind};

/// A contiguous piece of a larger blob believed to hold one message.
///
/// Produced by [`ThreadSplitter`](crate::parser::splitter::ThreadSplitter);
/// `raw_text` is already trimmed and at least the splitter's minimum length.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ThreadSegment {
    /// Trimmed text of the segment.
    pub raw_text: String,
    /// First `Subject:` value found in the segment, if any.
    pub derived_subject: Option<String>,
    /// Zero-based order of appearance among the kept segments.
    pub position: usize,
    /// Byte offset of the segment's first line in the source blob.
    pub offset: usize,
}

impl ThreadSegment {
    /// Human-readable label: `{base}_part_{n}` plus `_{subject}` when one was found.
    ///
    /// `n` is 1-based. The subject is sanitized for file names and cut to
    /// `subject_max` characters.
    pub fn label(&self, base: &str, subject_max: usize) -> String {
        let mut label = format!("{base}_part_{}", self.position + 1);
        if let Some(subject) = &self.derived_subject {
            let clean = sanitize_label_part(subject, subject_max);
            if !clean.is_empty() {
                label.push('_');
                label.push_str(&clean);
            }
        }
        label
    }

    /// Convert to an [`EmailRecord`].
    ///
    /// Leading header-field lines become headers and one blank line after
    /// them is skipped; everything else is body. Segments often have no blank
    /// line between headers and body (PDF extraction drops it), so the header
    /// block ends at the first line that is not a header field.
    pub fn to_record(&self, source_id: impl Into<String>) -> EmailRecord {
        let mut headers = Vec::new();
        let mut lines = self.raw_text.lines().peekable();

        while let Some(line) = lines.peek() {
            let name = match classify_line(line) {
                LineKind::HeaderStart => "from",
                LineKind::HeaderField(name) => name,
                _ => break,
            };
            if let Some((_, value)) = line.split_once(':') {
                headers.push((name.to_string(), value.trim().to_string()));
            }
            lines.next();
        }

        if !headers.is_empty() && lines.peek().is_some_and(|l| l.trim().is_empty()) {
            lines.next();
        }

        let body = lines.map(str::to_string).collect();
        EmailRecord::new(headers, body, source_id)
    }
}

/// Replace characters that are illegal in file names and cut to `max_len` characters.
pub fn sanitize_label_part(s: &str, max_len: usize) -> String {
    let sanitized: String = s
        .trim()
        .chars()
        .map(|c| match c {
            '\\' | '/' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .take(max_len)
        .collect();
    sanitized.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn segment(text: &str, subject: Option<&str>) -> ThreadSegment {
        ThreadSegment {
            raw_text: text.to_string(),
            derived_subject: subject.map(str::to_string),
            position: 1,
            offset: 0,
        }
    }

    #[test]
    fn test_label_with_subject() {
        let seg = segment("x", Some("Re: Budget/Q3: final?"));
        assert_eq!(seg.label("thread", 60), "thread_part_2_Re_ Budget_Q3_ final_");
    }

    #[test]
    fn test_label_truncates_subject() {
        let long = "a".repeat(80);
        let seg = segment("x", Some(&long));
        let label = seg.label("t", 50);
        assert_eq!(label, format!("t_part_2_{}", "a".repeat(50)));
    }

    #[test]
    fn test_label_without_subject() {
        assert_eq!(segment("x", None).label("t", 60), "t_part_2");
    }

    #[test]
    fn test_to_record_without_blank_line() {
        let seg = segment(
            "From: Bob <bob@example.com>\nSent: Monday, June 23, 2025 9:00 AM\nTo: Alice\nSubject: Status\nAll green this week.",
            Some("Status"),
        );
        let rec = seg.to_record("t_part_2");
        assert_eq!(rec.header("from"), Some("Bob <bob@example.com>"));
        assert_eq!(rec.header("sent"), Some("Monday, June 23, 2025 9:00 AM"));
        assert_eq!(rec.header("subject"), Some("Status"));
        assert_eq!(rec.body_text(), "All green this week.");
        assert_eq!(rec.source_identifier(), "t_part_2");
    }

    #[test]
    fn test_to_record_uses_canonical_header_names() {
        let seg = segment(
            "From: a@x.com\nReply To: b@x.com\nSUBJECT: Hi\nBody",
            Some("Hi"),
        );
        let rec = seg.to_record("s");
        assert_eq!(rec.header("reply-to"), Some("b@x.com"));
        assert_eq!(rec.header("subject"), Some("Hi"));
        assert!(!rec.headers().contains_key("reply to"));
    }

    #[test]
    fn test_to_record_skips_single_blank_line() {
        let seg = segment("From: a@x.com\nSubject: Hi\n\n\nBody", None);
        let rec = seg.to_record("s");
        assert_eq!(rec.body(), &["".to_string(), "Body".to_string()]);
    }

    #[test]
    fn test_to_record_plain_text() {
        let seg = segment("Just some quoted text\nwith two lines", None);
        let rec = seg.to_record("s");
        assert!(rec.headers().is_empty());
        assert_eq!(rec.body_text(), "Just some quoted text\nwith two lines");
    }
}
