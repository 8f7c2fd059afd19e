//! The rule engine: loads rules once, then applies them to batches of records.

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::error::InboxError;
use crate::mailbox::MailService;
use crate::model::EmailRecord;

use super::diagnostics::{Diagnostic, DiagnosticSink};
use super::document::{parse_document, RuleSource};
use super::rule::Rule;

/// Ordered, immutable set of rules.
///
/// Rules are loaded at construction; build a new engine to reload them.
#[derive(Debug, Clone, Default)]
pub struct RuleEngine {
    rules: Vec<Rule>,
}

impl RuleEngine {
    /// Wrap an already-built rule list.
    pub fn new(rules: Vec<Rule>) -> Self {
        Self { rules }
    }

    /// Load rules from `source`.
    ///
    /// A missing or malformed document is reported to `sink` and yields an
    /// engine with no rules. Documents are never partially loaded.
    pub fn load(source: &dyn RuleSource, sink: &dyn DiagnosticSink) -> Self {
        let origin = source.origin();
        let text = match source.read() {
            Ok(text) => text,
            Err(e) => {
                sink.emit(Diagnostic::RuleSourceUnavailable {
                    origin,
                    reason: e.to_string(),
                });
                return Self::default();
            }
        };

        match parse_document(&origin, &text) {
            Ok(rules) => {
                info!(origin = %origin, count = rules.len(), "Loaded rules");
                Self::new(rules)
            }
            Err(InboxError::RuleDocument { origin, reason }) => {
                sink.emit(Diagnostic::MalformedRuleDocument { origin, reason });
                Self::default()
            }
            Err(e) => {
                sink.emit(Diagnostic::MalformedRuleDocument {
                    origin,
                    reason: e.to_string(),
                });
                Self::default()
            }
        }
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Apply every rule to every record, in order.
    ///
    /// Each matching rule runs its actions (no first-match-wins), so one
    /// record may receive actions from several rules in declaration order.
    /// Nothing is returned: outcomes are visible only through the mail
    /// service and the diagnostics sink.
    pub fn process(
        &self,
        records: &[EmailRecord],
        mail: &mut dyn MailService,
        sink: &dyn DiagnosticSink,
    ) {
        self.process_with_clock(records, mail, sink, &Utc::now);
    }

    /// [`RuleEngine::process`] with an injectable clock, sampled once per
    /// rule evaluation.
    pub fn process_with_clock(
        &self,
        records: &[EmailRecord],
        mail: &mut dyn MailService,
        sink: &dyn DiagnosticSink,
        clock: &dyn Fn() -> DateTime<Utc>,
    ) {
        if self.rules.is_empty() {
            info!("No rules loaded; skipping message processing");
            return;
        }

        info!(
            records = records.len(),
            rules = self.rules.len(),
            "Processing messages"
        );

        for record in records {
            debug!(id = %record.id, subject = record.subject_display(), "Processing message");
            for rule in &self.rules {
                if rule.matches_at(record, clock(), sink) {
                    info!(id = %record.id, rule = %rule.description, "Message matches rule");
                    rule.execute_actions(mail, &record.id, sink);
                } else {
                    debug!(id = %record.id, rule = %rule.description, "Message does not match rule");
                }
            }
        }

        info!(records = records.len(), "Message processing complete");
    }
}
