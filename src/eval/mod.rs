//! Offline evaluation: scoring answers against expected ones and logging results.

pub mod harness;
pub mod log;
pub mod metrics;

pub use harness::{evaluate, load_cases, summarize, EvalSummary, EvaluationRecord, TestCase};
pub use log::{append_csv_log, append_json_log};
pub use metrics::{contains_hallucination, exact_match, f1_score, hallucination_score, normalize};
