//! Parser for Gmail "print conversation" exports.
//!
//! Each message starts with a sender line such as
//! `Alice Park <alice@example.com> Wed, 25 Jun, 2025 at 10:38 am`,
//! followed by `To:`, `Cc:`, `Subject:` and `Reply to:` lines and then the body.
//! Quoted history below `------ Original Message ------` or
//! `[Quoted text hidden]` is cut off.

use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use crate::model::address::EmailAddress;
use crate::model::record::EmailRecord;
use crate::parser::header::normalize_date;

static RE_SENDER_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^([^<]+<[^@>]+@[^>]+>)\s+(\w+,\s+\d+\s+\w+,\s+\d+\s+at\s+\d+:\d+(?:\s*[ap]m)?)",
    )
    .unwrap()
});
static RE_QUOTED_TAIL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)(?:------ Original Message ------|\[Quoted text hidden\]).*$").unwrap()
});
static RE_BLANK_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n\s*\n\s*\n").unwrap());

/// Header lines that may follow a sender line.
const GMAIL_HEADERS: [&str; 5] = ["To:", "Cc:", "Subject:", "Reply to:", "From:"];

/// Split a Gmail print export into one record per message.
///
/// Records are labeled `email_001.txt`, `email_002.txt`, ... in order of
/// appearance. Text before the first sender line is ignored.
pub fn parse_gmail_export(text: &str) -> Vec<EmailRecord> {
    let mut chunks: Vec<Vec<&str>> = Vec::new();
    for line in text.lines() {
        if RE_SENDER_LINE.is_match(line) {
            chunks.push(vec![line]);
        } else if let Some(current) = chunks.last_mut() {
            current.push(line);
        }
    }

    let records: Vec<EmailRecord> = chunks
        .iter()
        .enumerate()
        .filter_map(|(i, lines)| parse_message(lines, &format!("email_{:03}.txt", i + 1)))
        .collect();
    debug!(messages = records.len(), "Parsed Gmail export");
    records
}

fn parse_message(lines: &[&str], source_id: &str) -> Option<EmailRecord> {
    let caps = RE_SENDER_LINE.captures(lines.first()?)?;
    let sender = EmailAddress::parse(&caps[1]);

    let mut headers = vec![
        ("from".to_string(), sender.to_string()),
        ("date".to_string(), normalize_date(&caps[2])),
    ];

    let mut rest = lines[1..].iter().peekable();
    while let Some(line) = rest.next_if(|l| GMAIL_HEADERS.iter().any(|h| l.starts_with(h))) {
        if let Some((name, value)) = line.split_once(':') {
            let name = name.trim().to_lowercase().replace(' ', "-");
            // `From:` inside the header block is a repeat of the sender line.
            if name != "from" && !headers.iter().any(|(n, _)| *n == name) {
                headers.push((name, value.trim().to_string()));
            }
        }
    }

    let body: Vec<&str> = rest.copied().collect();
    let body = body.join("\n");
    let body = RE_QUOTED_TAIL.replace(body.trim(), "");
    let body = RE_BLANK_RUN.replace_all(&body, "\n\n");
    let body = body.trim();

    Some(EmailRecord::new(
        headers,
        body.lines().map(str::to_string).collect(),
        source_id,
    ))
}
