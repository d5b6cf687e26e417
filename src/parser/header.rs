//! Header-value helpers: text decoding, RFC 2047 encoded words, and date parsing.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use tracing::warn;

/// Output format of [`normalize_date`].
pub const NORMALIZED_DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Decode raw file bytes to text with `\n` line endings.
///
/// Tries UTF-8 first, then falls back to Windows-1252 (which accepts every byte).
pub fn decode_text_bytes(bytes: &[u8]) -> String {
    let bytes = bytes.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(bytes);

    let text = match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(_) => {
            let (decoded, _, _) = encoding_rs::WINDOWS_1252.decode(bytes);
            decoded.into_owned()
        }
    };

    if text.contains('\r') {
        text.replace("\r\n", "\n").replace('\r', "\n")
    } else {
        text
    }
}

/// Decode RFC 2047 encoded-words in a header value.
///
/// Example: `"=?UTF-8?B?SG9sYQ==?= =?UTF-8?B?IG11bmRv?="` → `"Hola mundo"`
///
/// Values without encoded words, or that cannot be decoded, are returned unchanged.
pub fn decode_encoded_words(input: &str) -> String {
    if !input.contains("=?") {
        return input.to_string();
    }

    let fake_msg = format!("Subject: {input}\n\n");
    mail_parser::MessageParser::default()
        .parse(fake_msg.as_bytes())
        .and_then(|msg| msg.subject().map(str::to_string))
        .unwrap_or_else(|| input.to_string())
}

/// Parse an email date string in the formats seen in archives and exports.
///
/// Supports RFC 2822, RFC 3339, Outlook `Sent:` lines, the Gmail print
/// format (`"Wed, 25 Jun, 2025 at 10:38 am"`), and a number of broken variants.
pub fn parse_date(date_str: &str) -> Option<DateTime<Utc>> {
    let trimmed = date_str.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc2822(trimmed) {
        return Some(dt.with_timezone(&Utc));
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(dt.with_timezone(&Utc));
    }

    // Outlook: "Monday, June 23, 2025 9:00 AM"
    for fmt in ["%A, %B %d, %Y %I:%M %p", "%A, %B %d, %Y %H:%M"] {
        if let Ok(ndt) = NaiveDateTime::parse_from_str(trimmed, fmt) {
            return Some(Utc.from_utc_datetime(&ndt));
        }
    }

    // Gmail print: "Wed, 25 Jun, 2025 at 10:38 am"
    let gmail = trimmed.replace(',', "").replace(" at ", " ");
    if let Ok(ndt) = NaiveDateTime::parse_from_str(&gmail, "%a %d %b %Y %I:%M %p") {
        return Some(Utc.from_utc_datetime(&ndt));
    }

    let bare = strip_day_of_week(trimmed);
    for candidate in [bare.clone(), replace_named_tz(&bare)] {
        if let Some(dt) = parse_with_formats(&candidate) {
            return Some(dt);
        }
    }

    // Bare calendar date: "2025-04-23"
    if let Ok(d) = chrono::NaiveDate::parse_from_str(&bare, "%Y-%m-%d") {
        return d.and_hms_opt(0, 0, 0).map(|ndt| Utc.from_utc_datetime(&ndt));
    }

    mail_parser_date(trimmed)
}

/// Normalize a date for display: `YYYY-MM-DD HH:MM:SS` when it parses,
/// otherwise the original string unchanged.
pub fn normalize_date(raw: &str) -> String {
    match parse_date(raw) {
        Some(dt) => dt.format(NORMALIZED_DATE_FORMAT).to_string(),
        None => {
            warn!(date = raw, "Could not parse date, keeping raw value");
            raw.to_string()
        }
    }
}

/// Layouts tried once the weekday is stripped. Offset-less matches are UTC.
const FALLBACK_FORMATS: [&str; 11] = [
    "%d %b %Y %H:%M:%S %z",
    "%d %b %Y %H:%M:%S",
    "%d %b %Y %H:%M %z",
    "%d %b %Y %H:%M",
    "%Y-%m-%dT%H:%M:%S%z",
    "%Y-%m-%dT%H:%M:%SZ",
    "%Y-%m-%d %H:%M:%S %z",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%d/%m/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M:%S",
];

/// Zone abbreviations seen in archived headers.
const NAMED_ZONES: [(&str, &str); 11] = [
    ("CEST", "+0200"),
    ("CET", "+0100"),
    ("EST", "-0500"),
    ("EDT", "-0400"),
    ("CST", "-0600"),
    ("CDT", "-0500"),
    ("PST", "-0800"),
    ("PDT", "-0700"),
    ("GMT", "+0000"),
    ("UTC", "+0000"),
    ("IST", "+0530"),
];

const WEEKDAYS: [&str; 7] = ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"];

fn parse_with_formats(candidate: &str) -> Option<DateTime<Utc>> {
    FALLBACK_FORMATS.iter().find_map(|fmt| {
        DateTime::parse_from_str(candidate, fmt)
            .map(|dt| dt.with_timezone(&Utc))
            .or_else(|_| {
                NaiveDateTime::parse_from_str(candidate, fmt).map(|ndt| Utc.from_utc_datetime(&ndt))
            })
            .ok()
    })
}

/// Last resort: `mail-parser`'s lenient RFC 5322 date parser.
fn mail_parser_date(input: &str) -> Option<DateTime<Utc>> {
    let header = format!("Date: {input}\n\n");
    let message = mail_parser::MessageParser::default().parse(header.as_bytes())?;
    DateTime::parse_from_rfc3339(&message.date()?.to_rfc3339())
        .ok()
        .map(|d| d.with_timezone(&Utc))
}

/// Drop a leading abbreviated weekday ("Thu, " or "Thu ").
fn strip_day_of_week(s: &str) -> String {
    WEEKDAYS
        .iter()
        .filter_map(|day| s.strip_prefix(day))
        .find_map(|rest| rest.strip_prefix(',').or_else(|| rest.strip_prefix(' ')))
        .map(|rest| rest.trim().to_string())
        .unwrap_or_else(|| s.to_string())
}

/// Swap a trailing zone abbreviation for its numeric offset.
fn replace_named_tz(s: &str) -> String {
    NAMED_ZONES
        .iter()
        .find_map(|(name, offset)| s.strip_suffix(name).map(|head| format!("{head}{offset}")))
        .unwrap_or_else(|| s.to_string())
}
