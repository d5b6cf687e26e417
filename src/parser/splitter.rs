//! Thread splitter: cut a multi-message blob (PDF extraction, pasted export)
//! into one [`ThreadSegment`] per message.
//!
//! The splitter walks the blob line by line through three states:
//!
//! - `SeekingHeader`: at the start, or right after a separator line.
//! - `InHeader`: inside a header block that opened with an anchor.
//! - `InBody`: anywhere else.
//!
//! A header block *anchor* is a `From:` line followed, within a few
//! contiguous header-field lines, by a `Subject:` and a `Date:` or `Sent:`
//! line. An anchor always opens a new segment, except while already in a
//! header block. Explicit separator lines (`----- Original Message -----`,
//! forwarded-message banners, `--- PAGE n ---`) close the current segment
//! and are dropped, but only with [`SplitStrategy::SeparatorAnchored`];
//! with [`SplitStrategy::HeaderAnchored`] they stay in the text.

use std::borrow::Cow;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::model::segment::ThreadSegment;

/// Segments shorter than this many characters are treated as noise.
pub const DEFAULT_MIN_SEGMENT_LEN: usize = 50;

/// How many header-field lines after a `From:` line are inspected for an anchor.
const HEADER_WINDOW: usize = 8;

static RE_MESSAGE_BANNER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*-*\s*(?:original message|forwarded message)\s*-*\s*$").unwrap()
});
static RE_PAGE_BREAK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^\s*-{2,}\s*page\s*\d+\s*-{2,}\s*$").unwrap());

/// Which boundaries cut a blob into segments.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SplitStrategy {
    /// Only header-block anchors cut.
    #[serde(rename = "header")]
    HeaderAnchored,
    /// Separator lines cut (and are dropped); anchors inside a chunk still cut.
    #[default]
    #[serde(rename = "separator")]
    SeparatorAnchored,
}

/// Classification of a single line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind {
    /// Whitespace only.
    Blank,
    /// A message banner or page-break marker.
    Separator,
    /// `From: ...`
    HeaderStart,
    /// Another recognized header field, by canonical lower-case name.
    HeaderField(&'static str),
    /// Anything else.
    Text,
}

/// Classify one line of a blob.
pub fn classify_line(line: &str) -> LineKind {
    if line.trim().is_empty() {
        return LineKind::Blank;
    }
    if RE_MESSAGE_BANNER.is_match(line) || RE_PAGE_BREAK.is_match(line) {
        return LineKind::Separator;
    }

    let Some((name, _)) = line.trim_start().split_once(':') else {
        return LineKind::Text;
    };
    match name.trim().to_ascii_lowercase().as_str() {
        "from" => LineKind::HeaderStart,
        "to" => LineKind::HeaderField("to"),
        "cc" => LineKind::HeaderField("cc"),
        "bcc" => LineKind::HeaderField("bcc"),
        "subject" => LineKind::HeaderField("subject"),
        "date" => LineKind::HeaderField("date"),
        "sent" => LineKind::HeaderField("sent"),
        "reply-to" | "reply to" => LineKind::HeaderField("reply-to"),
        _ => LineKind::Text,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    SeekingHeader,
    InHeader,
    InBody,
}

/// Lines collected for the segment under construction.
struct Pending<'a> {
    offset: usize,
    lines: Vec<&'a str>,
}

/// Splits raw blobs into thread segments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThreadSplitter {
    pub strategy: SplitStrategy,
    pub min_segment_len: usize,
}

impl Default for ThreadSplitter {
    fn default() -> Self {
        Self {
            strategy: SplitStrategy::default(),
            min_segment_len: DEFAULT_MIN_SEGMENT_LEN,
        }
    }
}

impl ThreadSplitter {
    pub fn new(strategy: SplitStrategy, min_segment_len: usize) -> Self {
        Self {
            strategy,
            min_segment_len,
        }
    }

    /// Split `blob` into segments, in order of appearance.
    ///
    /// Segments are trimmed; any shorter than `min_segment_len` characters
    /// are discarded. The result may be empty.
    ///
    /// CRLF line endings are normalized to LF first, so segment offsets index
    /// the normalized blob. For LF input that is the blob itself.
    pub fn split(&self, blob: &str) -> Vec<ThreadSegment> {
        let blob = normalize_newlines(blob);
        let mut offset = 0;
        let lines: Vec<(usize, &str)> = blob
            .split('\n')
            .map(|line| {
                let start = offset;
                offset += line.len() + 1;
                (start, line)
            })
            .collect();
        let kinds: Vec<LineKind> = lines.iter().map(|(_, l)| classify_line(l)).collect();

        let mut segments = Vec::new();
        let mut pending: Option<Pending> = None;
        let mut state = State::SeekingHeader;

        for (i, &(line_offset, line)) in lines.iter().enumerate() {
            let kind = kinds[i];

            if kind == LineKind::Separator && self.strategy == SplitStrategy::SeparatorAnchored {
                self.close(pending.take(), &mut segments);
                state = State::SeekingHeader;
                continue;
            }

            if kind == LineKind::HeaderStart && state != State::InHeader && is_anchor(&kinds, i) {
                self.close(pending.take(), &mut segments);
                pending = Some(Pending {
                    offset: line_offset + leading_ws(line),
                    lines: vec![line],
                });
                state = State::InHeader;
                continue;
            }

            match pending.as_mut() {
                Some(p) => p.lines.push(line),
                None if kind == LineKind::Blank => {}
                None => {
                    pending = Some(Pending {
                        offset: line_offset + leading_ws(line),
                        lines: vec![line],
                    })
                }
            }

            state = match (state, kind) {
                (State::InHeader, LineKind::HeaderStart | LineKind::HeaderField(_)) => State::InHeader,
                (State::SeekingHeader, LineKind::Blank) => State::SeekingHeader,
                _ => State::InBody,
            };
        }
        self.close(pending.take(), &mut segments);

        debug!(
            strategy = ?self.strategy,
            segments = segments.len(),
            "Split blob"
        );
        segments
    }

    /// Like [`split`](Self::split), but when nothing survives filtering the
    /// whole trimmed blob comes back as a single segment.
    ///
    /// Only a blob that is empty or all whitespace yields no segments.
    pub fn split_or_whole(&self, blob: &str) -> Vec<ThreadSegment> {
        let segments = self.split(blob);
        if !segments.is_empty() {
            return segments;
        }

        let blob = normalize_newlines(blob);
        let text = blob.trim();
        if text.is_empty() {
            return Vec::new();
        }
        debug!("No segment passed the length filter, keeping the whole blob");
        vec![ThreadSegment {
            raw_text: text.to_string(),
            derived_subject: find_subject(text.lines()),
            position: 0,
            offset: leading_ws(&blob),
        }]
    }

    fn close(&self, pending: Option<Pending>, out: &mut Vec<ThreadSegment>) {
        let Some(pending) = pending else {
            return;
        };
        let text = pending.lines.join("\n");
        let text = text.trim();
        let len = text.chars().count();
        if len < self.min_segment_len {
            if len > 0 {
                debug!(offset = pending.offset, len, "Dropping short segment");
            }
            return;
        }
        out.push(ThreadSegment {
            raw_text: text.to_string(),
            derived_subject: find_subject(pending.lines.iter().copied()),
            position: out.len(),
            offset: pending.offset,
        });
    }
}

/// Whether the `From:` line at `start` opens a header block.
fn is_anchor(kinds: &[LineKind], start: usize) -> bool {
    let mut subject = false;
    let mut date = false;
    for kind in kinds.iter().skip(start + 1).take(HEADER_WINDOW) {
        match kind {
            LineKind::HeaderField("subject") => subject = true,
            LineKind::HeaderField("date" | "sent") => date = true,
            LineKind::HeaderField(_) => {}
            _ => break,
        }
    }
    subject && date
}

fn find_subject<'a>(lines: impl Iterator<Item = &'a str>) -> Option<String> {
    lines
        .filter(|l| classify_line(l) == LineKind::HeaderField("subject"))
        .filter_map(|l| l.split_once(':').map(|(_, v)| v.trim().to_string()))
        .find(|s| !s.is_empty())
}

/// Replace CRLF line endings with LF.
pub fn normalize_newlines(blob: &str) -> Cow<'_, str> {
    if blob.contains("\r\n") {
        Cow::Owned(blob.replace("\r\n", "\n"))
    } else {
        Cow::Borrowed(blob)
    }
}

fn leading_ws(s: &str) -> usize {
    s.len() - s.trim_start().len()
}
