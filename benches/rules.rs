use chrono::{Duration, Utc};
use criterion::{criterion_group, criterion_main, Criterion};
use std::path::Path;

use inboxrules::ingest::{ingest_path, IngestOptions};
use inboxrules::mailbox::DryRunMailbox;
use inboxrules::model::EmailRecord;
use inboxrules::rules::{CollectingSink, FileRuleSource, RuleEngine};

fn fixture(name: &str) -> std::path::PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

fn synthetic_batch(count: usize) -> Vec<EmailRecord> {
    let now = Utc::now();
    (0..count)
        .map(|i| {
            let sender = if i % 10 == 0 {
                "Shop Newsletter <news@shop.example>".to_string()
            } else {
                format!("user{i}@example.com")
            };
            EmailRecord::new(format!("m{i}"), format!("t{}", i / 3))
                .with_sender(sender)
                .with_subject(if i % 7 == 0 { "Weekly meeting" } else { "Status update" })
                .with_received_at(now - Duration::days((i % 400) as i64))
                .with_body("Lorem ipsum dolor sit amet, consectetur adipiscing elit. ".repeat(20))
                .with_labels(["Inbox", "Unread"])
        })
        .collect()
}

fn bench_process_batch(c: &mut Criterion) {
    let sink = CollectingSink::new();
    let engine = RuleEngine::load(&FileRuleSource::new(fixture("rules.json")), &sink);
    let records = synthetic_batch(1_000);

    c.bench_function("process_1000_records", |b| {
        b.iter(|| {
            let mut mail = DryRunMailbox::new();
            engine.process(&records, &mut mail, &sink);
            mail.planned().len()
        })
    });
}

fn bench_ingest_fixture(c: &mut Criterion) {
    let options = IngestOptions {
        max_messages: 0,
        ..Default::default()
    };
    c.bench_function("ingest_fixture_mbox", |b| {
        b.iter(|| ingest_path(fixture("inbox.mbox"), &options, None).unwrap())
    });
}

criterion_group!(benches, bench_process_batch, bench_ingest_fixture);
criterion_main!(benches);
