//! Parser for plain-text email files: `Key: Value` headers, one blank line, body.

use std::path::Path;

use tracing::debug;

use crate::error::{Result, TrailError};
use crate::model::record::EmailRecord;
use crate::parser::header::decode_text_bytes;

/// How to treat header lines that have no colon.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ParseMode {
    /// Ignore them.
    #[default]
    Lenient,
    /// Fail with [`TrailError::MalformedHeader`].
    Strict,
}

/// Parse raw email text into an [`EmailRecord`].
///
/// Header lines are collected from the top until the first blank line; each
/// is split on its first `:`, the name lower-cased and both parts trimmed.
/// Lines starting with a space or tab continue the previous header.
/// Everything after the first blank line is body, even lines that look like
/// headers. Leading and trailing blank body lines are dropped.
pub fn parse(raw: &str, source_id: &str, mode: ParseMode) -> Result<EmailRecord> {
    let mut headers: Vec<(String, String)> = Vec::new();
    let mut body: Vec<String> = Vec::new();
    let mut in_body = false;

    for (idx, line) in raw.lines().enumerate() {
        if in_body {
            body.push(line.to_string());
            continue;
        }

        if line.trim().is_empty() {
            in_body = true;
            continue;
        }

        if line.starts_with(' ') || line.starts_with('\t') {
            if let Some(last) = headers.last_mut() {
                last.1.push(' ');
                last.1.push_str(line.trim());
                continue;
            }
        }

        match line.split_once(':') {
            Some((name, value)) if !name.trim().is_empty() => {
                headers.push((name.trim().to_lowercase(), value.trim().to_string()));
            }
            _ => match mode {
                ParseMode::Strict => {
                    return Err(TrailError::MalformedHeader {
                        source_id: source_id.to_string(),
                        line: idx + 1,
                        content: line.to_string(),
                    });
                }
                ParseMode::Lenient => {
                    debug!(source = source_id, line = idx + 1, "Ignoring header line without colon");
                }
            },
        }
    }

    while body.first().is_some_and(|l| l.trim().is_empty()) {
        body.remove(0);
    }
    while body.last().is_some_and(|l| l.trim().is_empty()) {
        body.pop();
    }

    Ok(EmailRecord::new(headers, body, source_id))
}

/// Read, decode and parse an email file. The file name is the source identifier.
pub fn load_email_file(path: impl AsRef<Path>, mode: ParseMode) -> Result<EmailRecord> {
    let path = path.as_ref();
    let bytes = std::fs::read(path).map_err(|e| TrailError::io(path, e))?;
    let text = decode_text_bytes(&bytes);
    let source_id = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    parse(&text, &source_id, mode)
}
