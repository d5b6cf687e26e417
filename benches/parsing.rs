use criterion::{criterion_group, criterion_main, Criterion};
use std::path::Path;

use mailtrail::parser::{parse, reorder, ParseMode, ThreadSplitter};

fn fixture(name: &str) -> String {
    let path = Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name);
    std::fs::read_to_string(path).unwrap()
}

fn bench_parse_email(c: &mut Criterion) {
    let raw = fixture("inbox/kickoff.txt");

    c.bench_function("parse_email", |b| {
        b.iter(|| {
            let record = parse(&raw, "kickoff.txt", ParseMode::Lenient).unwrap();
            reorder(&record.body_text(), "\n---\n")
        })
    });
}

fn bench_split_thread(c: &mut Criterion) {
    // A long export: the fixture thread repeated to a few hundred messages.
    let blob = fixture("thread_export.txt").repeat(200);
    let splitter = ThreadSplitter::default();

    c.bench_function("split_thread_export", |b| b.iter(|| splitter.split(&blob).len()));
}

criterion_group!(benches, bench_parse_email, bench_split_thread);
criterion_main!(benches);
