//! Persistent evaluation logs: a growing JSON array and a CSV file.
//!
//! Both are append-only across runs. Writes are not transactional; a crash
//! mid-write can leave a partial CSV row.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

use anyhow::Context;
use tracing::info;

use crate::eval::harness::EvaluationRecord;

/// CSV column names, written once when the file is empty.
pub const CSV_HEADER: &str = "question,expected_answer,predicted_answer,exact_match,f1_score";

/// Append records to a JSON array file, creating it if missing.
///
/// Existing entries are kept as opaque values, so older logs with other
/// fields or `null` predictions still accept new rows.
pub fn append_json_log(path: &Path, records: &[EvaluationRecord]) -> anyhow::Result<()> {
    let mut existing: Vec<serde_json::Value> = if path.exists() {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        if text.trim().is_empty() {
            Vec::new()
        } else {
            serde_json::from_str(&text)
                .with_context(|| format!("{} is not a JSON array of results", path.display()))?
        }
    } else {
        Vec::new()
    };

    for record in records {
        existing.push(serde_json::to_value(record)?);
    }
    let json = serde_json::to_string_pretty(&existing)?;
    std::fs::write(path, json).with_context(|| format!("writing {}", path.display()))?;
    info!(path = %path.display(), appended = records.len(), "Logged results to JSON");
    Ok(())
}

/// Append records as CSV rows. F1 is rounded to two decimals.
pub fn append_csv_log(path: &Path, records: &[EvaluationRecord]) -> anyhow::Result<()> {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("opening {}", path.display()))?;

    if file.metadata()?.len() == 0 {
        writeln!(file, "{CSV_HEADER}")?;
    }
    for r in records {
        writeln!(
            file,
            "{},{},{},{},{:.2}",
            csv_escape(&r.question),
            csv_escape(&r.expected_answer),
            csv_escape(&r.predicted_answer),
            r.exact_match,
            r.f1_score,
        )?;
    }
    info!(path = %path.display(), appended = records.len(), "Logged results to CSV");
    Ok(())
}

/// Escape a value for CSV (RFC 4180).
///
/// Wraps in double quotes if the value contains commas, quotes, or newlines.
fn csv_escape(value: &str) -> String {
    if value.contains(',') || value.contains('"') || value.contains('\n') || value.contains('\r') {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}
