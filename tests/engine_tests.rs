//! End-to-end tests for rule loading and processing.

use std::path::Path;

use chrono::{DateTime, Duration, TimeZone, Utc};

use inboxrules::ingest::{ingest_path, IngestOptions};
use inboxrules::mailbox::{DryRunMailbox, LocalMailbox, MailService, PlannedAction};
use inboxrules::model::EmailRecord;
use inboxrules::rules::{
    CollectingSink, Diagnostic, FileRuleSource, InlineRuleSource, RuleEngine, Severity,
};
use inboxrules::store::{FileStore, RecordStore};

fn fixture(name: &str) -> std::path::PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

/// Records every call; fails the ids listed in `fail`.
#[derive(Default)]
struct Recorder {
    calls: Vec<String>,
    fail: Vec<String>,
}

impl Recorder {
    fn failing(ids: &[&str]) -> Self {
        Self {
            calls: Vec::new(),
            fail: ids.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn record(&mut self, call: String, id: &str) -> bool {
        self.calls.push(call);
        !self.fail.iter().any(|f| f == id)
    }

    fn count(&self, prefix: &str) -> usize {
        self.calls.iter().filter(|c| c.starts_with(prefix)).count()
    }
}

impl MailService for Recorder {
    fn mark_read(&mut self, id: &str) -> bool {
        self.record(format!("read:{id}"), id)
    }
    fn mark_unread(&mut self, id: &str) -> bool {
        self.record(format!("unread:{id}"), id)
    }
    fn move_message(&mut self, id: &str, destination: &str) -> bool {
        self.record(format!("move:{id}:{destination}"), id)
    }
    fn apply_label(&mut self, id: &str, label: &str) -> bool {
        self.record(format!("label:{id}:{label}"), id)
    }
}

const TWO_RULES: &str = r#"[
    {
        "description": "Meeting invites from example.com",
        "overall_predicate": "all",
        "conditions": [
            {"field": "From", "predicate": "contains", "value": "example.com"},
            {"field": "Subject", "predicate": "equals", "value": "Meeting Invite"},
            {"field": "Received Date/Time", "predicate": "less than", "value": {"days": 7}}
        ],
        "actions": [{"type": "Mark as Read"}]
    },
    {
        "description": "Spam",
        "overall_predicate": "any",
        "conditions": [
            {"field": "From", "predicate": "equals", "value": "spam@bad.com"},
            {"field": "Message", "predicate": "contains", "value": "viagra"}
        ],
        "actions": [
            {"type": "Move Message", "value": "Spam"},
            {"type": "Mark as Unread"}
        ]
    }
]"#;

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 20, 12, 0, 0).unwrap()
}

#[test]
fn test_two_rule_document_end_to_end() {
    let sink = CollectingSink::new();
    let engine = RuleEngine::load(&InlineRuleSource(TWO_RULES.into()), &sink);
    assert_eq!(engine.len(), 2);

    let invite = EmailRecord::new("invite", "t1")
        .with_sender("a@example.com")
        .with_subject("Meeting Invite")
        .with_received_at(now() - Duration::days(1))
        .with_body("hi");
    let mut mail = Recorder::default();
    engine.process_with_clock(&[invite], &mut mail, &sink, &now);
    assert_eq!(mail.calls, vec!["read:invite"]);
    assert_eq!(mail.count("move:"), 0);
    assert_eq!(mail.count("unread:"), 0);

    let spam = EmailRecord::new("spam", "t2")
        .with_sender("x@y.com")
        .with_body("buy viagra now");
    let mut mail = Recorder::default();
    engine.process_with_clock(&[spam], &mut mail, &sink, &now);
    assert_eq!(mail.calls, vec!["move:spam:Spam", "unread:spam"]);
    assert_eq!(mail.count("read:"), 0);

    assert!(sink.is_empty(), "unexpected: {:?}", sink.diagnostics());
}

#[test]
fn test_failed_action_does_not_stop_the_batch() {
    let doc = r#"[{"actions": [{"type": "Mark as Read"}, {"type": "Mark as Unread"}]}]"#;
    let sink = CollectingSink::new();
    let engine = RuleEngine::load(&InlineRuleSource(doc.into()), &sink);

    let records = vec![EmailRecord::new("a", "a"), EmailRecord::new("b", "b")];
    let mut mail = Recorder::failing(&["a"]);
    engine.process(&records, &mut mail, &sink);

    assert_eq!(mail.calls, vec!["read:a", "unread:a", "read:b", "unread:b"]);
    let failed: Vec<_> = sink
        .diagnostics()
        .into_iter()
        .filter(|d| matches!(d, Diagnostic::ActionFailed { .. }))
        .collect();
    assert_eq!(failed.len(), 2);
}

#[test]
fn test_unknown_names_warn_once_each() {
    let doc = r#"[
        {
            "description": "odd combinator",
            "overall_predicate": "most",
            "conditions": [{"field": "Subject", "predicate": "contains", "value": "x"}],
            "actions": [{"type": "Mark as Read"}]
        },
        {
            "description": "odd parts",
            "overall_predicate": "any",
            "conditions": [
                {"field": "Cc", "predicate": "contains", "value": "x"},
                {"field": "Subject", "predicate": "starts with", "value": "x"},
                {"field": "Message", "predicate": "contains", "value": ""}
            ],
            "actions": [{"type": "Archive"}, {"type": "Mark as Read"}]
        }
    ]"#;
    let sink = CollectingSink::new();
    let engine = RuleEngine::load(&InlineRuleSource(doc.into()), &sink);
    let record = EmailRecord::new("m", "m").with_subject("hello");
    let mut mail = Recorder::default();
    engine.process(&[record], &mut mail, &sink);

    let diagnostics = sink.diagnostics();
    let count = |f: fn(&Diagnostic) -> bool| diagnostics.iter().filter(|d| f(d)).count();
    assert_eq!(count(|d| matches!(d, Diagnostic::UnknownCombinator { .. })), 1);
    assert_eq!(count(|d| matches!(d, Diagnostic::UnknownField { .. })), 1);
    assert_eq!(count(|d| matches!(d, Diagnostic::UnknownPredicate { .. })), 1);
    assert_eq!(count(|d| matches!(d, Diagnostic::UnknownActionType { .. })), 1);
    assert_eq!(sink.count(Severity::Warning), 4);
    // The unknown action type also counts as a failed action.
    assert_eq!(sink.count(Severity::Error), 1);

    // The empty needle matches, so the second rule ran its known action.
    assert_eq!(mail.calls, vec!["read:m"]);
}

#[test]
fn test_dry_run_plans_without_touching_state() {
    let sink = CollectingSink::new();
    let engine = RuleEngine::load(&InlineRuleSource(TWO_RULES.into()), &sink);
    let spam = EmailRecord::new("spam", "t2").with_body("viagra");

    let mut plan = DryRunMailbox::new();
    engine.process(&[spam], &mut plan, &sink);
    assert_eq!(
        plan.planned(),
        &[
            PlannedAction::Move {
                id: "spam".into(),
                destination: "Spam".into()
            },
            PlannedAction::MarkUnread { id: "spam".into() },
        ]
    );
}

#[test]
fn test_fixture_mbox_through_store_and_local_mailbox() {
    let dir = tempfile::tempdir().unwrap();

    let options = IngestOptions {
        max_messages: 0,
        ..Default::default()
    };
    let report = ingest_path(fixture("inbox.mbox"), &options, None).unwrap();
    assert_eq!(report.records.len(), 4);

    let mut store = FileStore::open(dir.path().join("records.db")).unwrap();
    store.upsert(report.records).unwrap();
    let records = FileStore::open(dir.path().join("records.db"))
        .unwrap()
        .fetch_all()
        .unwrap();
    assert_eq!(records.len(), 4);

    let mailbox_path = dir.path().join("mailbox.json");
    let mut mailbox = LocalMailbox::open(&mailbox_path).unwrap();
    for record in &records {
        mailbox.register(record);
    }
    mailbox.create_label("Meetings");

    let sink = CollectingSink::new();
    let engine = RuleEngine::load(&FileRuleSource::new(fixture("rules.json")), &sink);
    assert_eq!(engine.len(), 2);
    engine.process(&records, &mut mailbox, &sink);
    mailbox.save().unwrap();
    assert!(sink.is_empty(), "unexpected: {:?}", sink.diagnostics());

    let mailbox = LocalMailbox::open(&mailbox_path).unwrap();

    let meeting = "meeting-001@example.com";
    assert_eq!(mailbox.is_unread(meeting), Some(false));
    let labels = mailbox.message_labels(meeting).unwrap();
    assert!(labels.contains(&"Meetings".to_string()));
    assert!(labels.contains(&"INBOX".to_string()));

    let promo = "promo-2024-01@shop.example";
    let labels = mailbox.message_labels(promo).unwrap();
    assert!(!labels.contains(&"INBOX".to_string()));
    assert!(labels.contains(&"Promotions".to_string()));
    assert_eq!(mailbox.is_unread(promo), Some(true));

    let reply = "reply-004@example.net";
    assert_eq!(mailbox.message_labels(reply).unwrap(), vec!["Archived"]);
}

#[test]
fn test_missing_label_fails_the_action_only() {
    let sink = CollectingSink::new();
    let engine = RuleEngine::load(&FileRuleSource::new(fixture("rules.json")), &sink);

    let mut mailbox = LocalMailbox::in_memory();
    let record = EmailRecord::new("m", "m")
        .with_subject("Weekly meeting")
        .with_received_at(Utc::now() - Duration::days(1))
        .with_labels(["Inbox", "Unread"]);
    mailbox.register(&record);
    engine.process(&[record], &mut mailbox, &sink);

    // Mark as Read succeeded; Apply Label "Meetings" failed.
    assert_eq!(mailbox.is_unread("m"), Some(false));
    assert_eq!(sink.count(Severity::Error), 1);
    assert!(matches!(
        sink.diagnostics()[0],
        Diagnostic::ActionFailed { .. }
    ));
}
