//! A rule: combined conditions plus the actions to run on a match.

use chrono::{DateTime, Utc};
use tracing::info;

use crate::mailbox::MailService;
use crate::model::EmailRecord;

use super::action::Action;
use super::condition::Condition;
use super::diagnostics::{Diagnostic, DiagnosticSink};

/// How a rule's condition results are combined.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Combinator {
    /// Every condition must hold.
    All,
    /// At least one condition must hold.
    Any,
    Unrecognized(String),
}

impl Combinator {
    /// Map a rule-document `overall_predicate` (case-insensitive).
    pub fn parse(name: &str) -> Self {
        match name.to_lowercase().as_str() {
            "all" => Self::All,
            "any" => Self::Any,
            other => Self::Unrecognized(other.to_string()),
        }
    }

    pub fn label(&self) -> &str {
        match self {
            Self::All => "all",
            Self::Any => "any",
            Self::Unrecognized(name) => name,
        }
    }
}

/// A named policy.
#[derive(Debug, Clone, PartialEq)]
pub struct Rule {
    pub description: String,
    pub combinator: Combinator,
    pub conditions: Vec<Condition>,
    pub actions: Vec<Action>,
}

impl Rule {
    pub fn new(
        description: impl Into<String>,
        combinator: Combinator,
        conditions: Vec<Condition>,
        actions: Vec<Action>,
    ) -> Self {
        Self {
            description: description.into(),
            combinator,
            conditions,
            actions,
        }
    }

    /// Whether `record` satisfies this rule, sampling the clock now.
    pub fn matches(&self, record: &EmailRecord, sink: &dyn DiagnosticSink) -> bool {
        self.matches_at(record, Utc::now(), sink)
    }

    /// Whether `record` satisfies this rule at `now`.
    ///
    /// A rule without conditions matches everything. Every condition is
    /// evaluated (no short-circuit) so each one reports its own diagnostics.
    pub fn matches_at(
        &self,
        record: &EmailRecord,
        now: DateTime<Utc>,
        sink: &dyn DiagnosticSink,
    ) -> bool {
        if self.conditions.is_empty() {
            return true;
        }

        let results: Vec<bool> = self
            .conditions
            .iter()
            .map(|condition| condition.evaluate_at(record, now, sink))
            .collect();

        match &self.combinator {
            Combinator::All => results.iter().all(|&r| r),
            Combinator::Any => results.iter().any(|&r| r),
            Combinator::Unrecognized(name) => {
                sink.emit(Diagnostic::UnknownCombinator {
                    combinator: name.clone(),
                    rule: self.description.clone(),
                });
                false
            }
        }
    }

    /// Run every action in order for message `id`.
    ///
    /// A failed action does not stop the remaining ones. Returns true only
    /// if all of them succeeded.
    pub fn execute_actions(
        &self,
        mail: &mut dyn MailService,
        id: &str,
        sink: &dyn DiagnosticSink,
    ) -> bool {
        info!(id, rule = %self.description, "Executing rule actions");
        let mut all_succeeded = true;
        for action in &self.actions {
            if !action.execute(mail, id, sink) {
                all_succeeded = false;
                sink.emit(Diagnostic::ActionFailed {
                    action: action.kind.label().to_string(),
                    record_id: id.to_string(),
                });
            }
        }
        all_succeeded
    }
}
