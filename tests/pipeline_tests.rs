//! Integration tests for indexing, the persistent store, question answering
//! and evaluation logging.

use std::path::{Path, PathBuf};

use assert_fs::prelude::*;
use predicates::prelude::*;

use mailtrail::backend::{HashingEmbedder, ScriptedGenerator};
use mailtrail::error::TrailError;
use mailtrail::eval::{self, EvaluationRecord};
use mailtrail::index::{index_paths, IndexOptions};
use mailtrail::parser::ThreadSplitter;
use mailtrail::query::{self, Answer, RetrievalOptions, SearchKind, ALL_THREADS};
use mailtrail::store::summary::{thread_summaries, top_senders};
use mailtrail::store::{DocumentStore, FileStore};

fn fixture(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

fn open(dir: &Path) -> FileStore {
    FileStore::open(dir, Box::new(HashingEmbedder::new(512)), 16).unwrap()
}

fn indexed_store(dir: &Path) -> FileStore {
    let mut store = open(dir);
    let result = index_paths(
        &mut store,
        &[fixture("inbox")],
        Some("phoenix"),
        &IndexOptions::default(),
        None,
    )
    .unwrap();
    assert_eq!(result.count, 2);
    assert!(result.errors.is_empty());
    store
}

#[test]
fn test_index_directory_skips_parsed_and_non_text_files() {
    let temp = assert_fs::TempDir::new().unwrap();
    let store = indexed_store(temp.path());

    let sources: Vec<&str> = store
        .documents()
        .into_iter()
        .map(|d| d.metadata.source.as_str())
        .collect();
    assert_eq!(sources, vec!["budget.txt", "kickoff.txt"]);

    temp.child("documents.mtstore").assert(predicate::path::is_file());
    temp.child("documents.mtstore.tmp").assert(predicate::path::missing());
}

#[test]
fn test_indexed_content_has_latest_reply_first() {
    let temp = assert_fs::TempDir::new().unwrap();
    let store = indexed_store(temp.path());

    let kickoff = store
        .documents()
        .into_iter()
        .find(|d| d.metadata.source == "kickoff.txt")
        .cloned()
        .unwrap();
    assert!(kickoff.content.starts_with("Update: attendees"));
    assert_eq!(kickoff.metadata.thread.as_deref(), Some("phoenix"));
    assert_eq!(
        kickoff.metadata.subject.as_deref(),
        Some("Phoenix kickoff meeting")
    );
}

#[test]
fn test_store_survives_reopen() {
    let temp = assert_fs::TempDir::new().unwrap();
    drop(indexed_store(temp.path()));

    let mut reopened = open(temp.path());
    assert_eq!(reopened.len(), 2);
    assert_eq!(reopened.dimension(), Some(512));

    let hits = reopened
        .similarity_search("Phoenix budget approval finance 120k", 1, None)
        .unwrap();
    assert_eq!(hits[0].metadata.source, "budget.txt");
}

#[test]
fn test_reopen_with_other_model_is_rejected() {
    let temp = assert_fs::TempDir::new().unwrap();
    drop(indexed_store(temp.path()));

    let err = FileStore::open(temp.path(), Box::new(HashingEmbedder::new(256)), 16)
        .err()
        .unwrap();
    assert!(matches!(err, TrailError::InvalidStore { .. }));
}

#[test]
fn test_corrupt_store_file_is_rejected() {
    let temp = assert_fs::TempDir::new().unwrap();
    temp.child("documents.mtstore")
        .write_binary(b"definitely not a store")
        .unwrap();

    let err = FileStore::open(temp.path(), Box::new(HashingEmbedder::new(512)), 16)
        .err()
        .unwrap();
    assert!(matches!(err, TrailError::InvalidStore { .. }));
}

#[test]
fn test_index_with_split_and_progress() {
    let temp = assert_fs::TempDir::new().unwrap();
    let mut store = open(temp.path());
    let options = IndexOptions {
        split: Some(ThreadSplitter::default()),
        ..IndexOptions::default()
    };

    let calls = std::cell::RefCell::new(Vec::<(u64, u64)>::new());
    let result = index_paths(
        &mut store,
        &[fixture("thread_export.txt")],
        Some("phoenix-export"),
        &options,
        Some(&|done: u64, total: u64| calls.borrow_mut().push((done, total))),
    )
    .unwrap();

    assert_eq!(result.count, 2);
    assert_eq!(calls.into_inner(), vec![(1, 2), (2, 2)]);
    let summaries = thread_summaries(store.documents());
    assert_eq!(summaries.len(), 1);
    assert_eq!(summaries[0].name, "phoenix-export");
    assert_eq!(summaries[0].documents, 2);
}

#[test]
fn test_unreadable_path_is_reported_not_fatal() {
    let temp = assert_fs::TempDir::new().unwrap();
    let mut store = open(temp.path());
    let result = index_paths(
        &mut store,
        &[fixture("inbox/budget.txt"), fixture("missing.txt")],
        None,
        &IndexOptions::default(),
        None,
    )
    .unwrap();

    assert_eq!(result.count, 1);
    assert_eq!(result.errors.len(), 1);
    assert!(result.errors[0].source_id.ends_with("missing.txt"));
    assert!(matches!(result.errors[0].error, TrailError::FileNotFound(_)));
}

#[test]
fn test_thread_summaries_and_senders() {
    let temp = assert_fs::TempDir::new().unwrap();
    let store = indexed_store(temp.path());

    let summaries = thread_summaries(store.documents());
    assert_eq!(summaries.len(), 1);
    let phoenix = &summaries[0];
    assert_eq!(phoenix.name, "phoenix");
    assert_eq!(phoenix.documents, 2);
    assert_eq!(
        phoenix.oldest.unwrap().format("%Y-%m-%d").to_string(),
        "2025-06-02"
    );
    assert_eq!(
        phoenix.newest.unwrap().format("%Y-%m-%d").to_string(),
        "2025-06-03"
    );

    let senders = top_senders(store.documents(), 10);
    assert_eq!(senders.len(), 2);
    assert!(senders.iter().all(|(_, n)| *n == 1));
}

#[test]
fn test_answer_builds_grounded_prompt() {
    let temp = assert_fs::TempDir::new().unwrap();
    let mut store = indexed_store(temp.path());
    let generator = ScriptedGenerator::new("Alice, Bob, DevOps Team and QA Team.");

    let answer = query::answer(
        &mut store,
        &generator,
        "Who attends the Phoenix kickoff meeting?",
        query::thread_scope(Some(ALL_THREADS)),
        &RetrievalOptions::default(),
    )
    .unwrap();

    match answer {
        Answer::Grounded {
            text,
            retrieved,
            context,
        } => {
            assert_eq!(text, "Alice, Bob, DevOps Team and QA Team.");
            assert_eq!(retrieved.len(), 2);
            assert!(context.contains("Subject: Phoenix kickoff meeting"));
        }
        Answer::NoRelevantDocuments => panic!("expected a grounded answer"),
    }

    let prompts = generator.prompts();
    assert_eq!(prompts.len(), 1);
    assert!(prompts[0].contains("QUESTION:\nWho attends the Phoenix kickoff meeting?"));
    assert!(prompts[0].contains("Update: attendees are Alice, Bob, DevOps Team and QA Team."));
    assert!(prompts[0].ends_with("Answer:"));
}

#[test]
fn test_unknown_thread_skips_generation() {
    let temp = assert_fs::TempDir::new().unwrap();
    let mut store = indexed_store(temp.path());
    let generator = ScriptedGenerator::new("unused");
    let options = RetrievalOptions {
        search: SearchKind::Similarity,
        ..RetrievalOptions::default()
    };

    let answer = query::answer(&mut store, &generator, "Who attends?", Some("apollo"), &options)
        .unwrap();
    assert_eq!(answer, Answer::NoRelevantDocuments);
    assert_eq!(generator.calls(), 0);
}

#[test]
fn test_evaluation_run_and_logs() {
    let temp = assert_fs::TempDir::new().unwrap();
    let mut store = indexed_store(temp.path());
    let generator = ScriptedGenerator::new("Alice, Bob, DevOps Team and QA Team");
    let cases = eval::load_cases(fixture("cases.json")).unwrap();
    assert_eq!(cases.len(), 2);

    let records = eval::evaluate(
        &mut store,
        &generator,
        &cases,
        Some("phoenix"),
        &RetrievalOptions::default(),
        false,
        None,
    )
    .unwrap();
    assert!(records[0].exact_match);
    assert!(!records[1].exact_match);
    assert_eq!(records[1].f1_score, 0.0);

    let json_log = temp.child("results.json");
    let csv_log = temp.child("results.csv");
    for _ in 0..2 {
        eval::append_json_log(json_log.path(), &records).unwrap();
        eval::append_csv_log(csv_log.path(), &records).unwrap();
    }

    let logged: Vec<EvaluationRecord> =
        serde_json::from_str(&std::fs::read_to_string(json_log.path()).unwrap()).unwrap();
    assert_eq!(logged.len(), 4);

    csv_log.assert(predicate::str::starts_with(
        "question,expected_answer,predicted_answer,exact_match,f1_score\n",
    ));
    csv_log.assert(predicate::str::contains(
        "Who attends the Phoenix kickoff meeting?,\"Alice, Bob, DevOps Team and QA Team\",\
         \"Alice, Bob, DevOps Team and QA Team\",true,1.00",
    ));
    let rows = std::fs::read_to_string(csv_log.path()).unwrap();
    assert_eq!(rows.lines().count(), 5);
    assert_eq!(rows.matches(",true,1.00").count(), 2);

    let summary = eval::summarize(&records);
    assert_eq!(summary.cases, 2);
    assert_eq!(summary.exact_match_rate, 0.5);
    assert_eq!(summary.mean_hallucination, None);
}
