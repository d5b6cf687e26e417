//! Batch evaluation of question/expected-answer pairs.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::backend::Generator;
use crate::error::{Result, TrailError};
use crate::eval::metrics::{exact_match, f1_score, hallucination_score};
use crate::query::{answer, Answer, RetrievalOptions};
use crate::store::DocumentStore;

/// One question with its reference answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestCase {
    pub question: String,
    pub expected_answer: String,
}

/// Scores for one answered case.
///
/// Serialized with the short keys of the JSON log (`expected`, `predicted`,
/// `em`, `f1`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationRecord {
    pub question: String,
    #[serde(rename = "expected")]
    pub expected_answer: String,
    #[serde(rename = "predicted")]
    pub predicted_answer: String,
    #[serde(rename = "em")]
    pub exact_match: bool,
    #[serde(rename = "f1")]
    pub f1_score: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hallucination: Option<f64>,
}

impl EvaluationRecord {
    /// Score `predicted` against the case; with `context` set, also the
    /// hallucination ratio.
    pub fn score(case: &TestCase, predicted: &str, context: Option<&str>) -> Self {
        Self {
            question: case.question.clone(),
            expected_answer: case.expected_answer.clone(),
            predicted_answer: predicted.to_string(),
            exact_match: exact_match(predicted, &case.expected_answer),
            f1_score: f1_score(predicted, &case.expected_answer),
            hallucination: context.map(|c| hallucination_score(predicted, c)),
        }
    }
}

/// Aggregate scores over a batch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvalSummary {
    pub cases: usize,
    pub exact_match_rate: f64,
    pub mean_f1: f64,
    /// Mean over the records that carry a hallucination ratio.
    pub mean_hallucination: Option<f64>,
}

/// Read test cases from a JSON array of `{question, expected_answer}`.
pub fn load_cases(path: impl AsRef<Path>) -> Result<Vec<TestCase>> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path).map_err(|e| TrailError::io(path, e))?;
    serde_json::from_str(&text).map_err(|e| TrailError::InvalidCases {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

/// Answer every case in order and score it.
///
/// A case with no retrieved documents is scored with an empty prediction.
/// A generation failure aborts the batch.
pub fn evaluate<S: DocumentStore + ?Sized>(
    store: &mut S,
    generator: &dyn Generator,
    cases: &[TestCase],
    thread_filter: Option<&str>,
    options: &RetrievalOptions,
    with_hallucination: bool,
    progress: Option<&dyn Fn(u64, u64)>,
) -> Result<Vec<EvaluationRecord>> {
    let total = cases.len() as u64;
    let mut records = Vec::with_capacity(cases.len());

    for (i, case) in cases.iter().enumerate() {
        let (predicted, context) =
            match answer(store, generator, &case.question, thread_filter, options)? {
                Answer::Grounded { text, context, .. } => (text, context),
                Answer::NoRelevantDocuments => (String::new(), String::new()),
            };
        let record = EvaluationRecord::score(
            case,
            &predicted,
            with_hallucination.then_some(context.as_str()),
        );
        debug!(
            question = %case.question,
            em = record.exact_match,
            f1 = record.f1_score,
            "Scored case"
        );
        records.push(record);
        if let Some(cb) = progress {
            cb(i as u64 + 1, total);
        }
    }

    info!(cases = records.len(), "Evaluation finished");
    Ok(records)
}

/// Aggregate a batch of records.
pub fn summarize(records: &[EvaluationRecord]) -> EvalSummary {
    let cases = records.len();
    if cases == 0 {
        return EvalSummary {
            cases,
            exact_match_rate: 0.0,
            mean_f1: 0.0,
            mean_hallucination: None,
        };
    }
    let n = cases as f64;
    let hallucinations: Vec<f64> = records.iter().filter_map(|r| r.hallucination).collect();
    EvalSummary {
        cases,
        exact_match_rate: records.iter().filter(|r| r.exact_match).count() as f64 / n,
        mean_f1: records.iter().map(|r| r.f1_score).sum::<f64>() / n,
        mean_hallucination: (!hallucinations.is_empty())
            .then(|| hallucinations.iter().sum::<f64>() / hallucinations.len() as f64),
    }
}
