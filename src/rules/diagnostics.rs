//! Diagnostics emitted while loading and applying rules.
//!
//! Configuration problems (unknown names, missing targets) and mail-service
//! failures never abort processing. They are reported through a
//! [`DiagnosticSink`] that the caller passes down the evaluation chain.

use std::cell::RefCell;
use std::fmt;

use tracing::{error, warn};

use super::action::ActionKind;

/// How serious a diagnostic is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Warning,
    Error,
}

/// A single problem observed by the rule engine.
#[derive(Debug, Clone, PartialEq)]
pub enum Diagnostic {
    /// A condition names a field the engine does not know.
    UnknownField { field: String },
    /// A condition names a predicate the engine does not know.
    UnknownPredicate { predicate: String, field: String },
    /// A rule uses a combinator other than `all` / `any`.
    UnknownCombinator { combinator: String, rule: String },
    /// An action names a type the engine does not know.
    UnknownActionType { action: String, record_id: String },
    /// A Move/ApplyLabel action has no destination.
    MissingActionTarget { action: ActionKind, record_id: String },
    /// An action was attempted and did not succeed.
    ActionFailed { action: String, record_id: String },
    /// The rule document could not be read.
    RuleSourceUnavailable { origin: String, reason: String },
    /// The rule document was read but could not be decoded.
    MalformedRuleDocument { origin: String, reason: String },
}

impl Diagnostic {
    pub fn severity(&self) -> Severity {
        match self {
            Self::UnknownField { .. }
            | Self::UnknownPredicate { .. }
            | Self::UnknownCombinator { .. }
            | Self::UnknownActionType { .. } => Severity::Warning,
            Self::MissingActionTarget { .. }
            | Self::ActionFailed { .. }
            | Self::RuleSourceUnavailable { .. }
            | Self::MalformedRuleDocument { .. } => Severity::Error,
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownField { field } => {
                write!(f, "Unknown field '{field}'; condition will not be met")
            }
            Self::UnknownPredicate { predicate, field } => write!(
                f,
                "Unknown predicate '{predicate}' for field '{field}'; condition will not be met"
            ),
            Self::UnknownCombinator { combinator, rule } => write!(
                f,
                "Unknown overall predicate '{combinator}' in rule '{rule}'; rule will not match"
            ),
            Self::UnknownActionType { action, record_id } => write!(
                f,
                "Unknown action type '{action}'; action not executed for message {record_id}"
            ),
            Self::MissingActionTarget { action, record_id } => write!(
                f,
                "Missing {} for '{}' action on message {record_id}",
                action.target_noun(),
                action.label()
            ),
            Self::ActionFailed { action, record_id } => {
                write!(f, "Action '{action}' failed for message {record_id}")
            }
            Self::RuleSourceUnavailable { origin, reason } => {
                write!(f, "Rules source '{origin}' unavailable: {reason}")
            }
            Self::MalformedRuleDocument { origin, reason } => {
                write!(f, "Rules document '{origin}' is malformed: {reason}")
            }
        }
    }
}

/// Receiver for engine diagnostics.
pub trait DiagnosticSink {
    fn emit(&self, diagnostic: Diagnostic);
}

/// Forwards diagnostics to `tracing` at the matching level.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn emit(&self, diagnostic: Diagnostic) {
        match diagnostic.severity() {
            Severity::Warning => warn!("{diagnostic}"),
            Severity::Error => error!("{diagnostic}"),
        }
    }
}

/// Keeps diagnostics in memory, in emission order.
#[derive(Debug, Default)]
pub struct CollectingSink {
    items: RefCell<Vec<Diagnostic>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything emitted so far.
    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        self.items.borrow().clone()
    }

    /// Number of diagnostics with the given severity.
    pub fn count(&self, severity: Severity) -> usize {
        self.items
            .borrow()
            .iter()
            .filter(|d| d.severity() == severity)
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.items.borrow().is_empty()
    }
}

impl DiagnosticSink for CollectingSink {
    fn emit(&self, diagnostic: Diagnostic) {
        self.items.borrow_mut().push(diagnostic);
    }
}
