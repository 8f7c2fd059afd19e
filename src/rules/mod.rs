//! Rule engine: conditions, actions, rules, and the engine that applies them.
//!
//! Records flow through [`RuleEngine::process`]; for every record each rule
//! is checked in load order, and each matching rule executes its actions
//! against a [`crate::mailbox::MailService`].

pub mod action;
pub mod condition;
pub mod diagnostics;
pub mod document;
pub mod engine;
pub mod rule;

pub use action::{Action, ActionKind};
pub use condition::{AgeSpec, Condition, ConditionValue, Field, Predicate};
pub use diagnostics::{CollectingSink, Diagnostic, DiagnosticSink, Severity, TracingSink};
pub use document::{FileRuleSource, InlineRuleSource, RuleSource};
pub use engine::RuleEngine;
pub use rule::{Combinator, Rule};
