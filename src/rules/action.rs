//! Mailbox mutations requested by a rule.

use tracing::debug;

use crate::mailbox::MailService;

use super::diagnostics::{Diagnostic, DiagnosticSink};

/// What an action does.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionKind {
    MarkRead,
    MarkUnread,
    /// Move to the mailbox named by the target.
    Move,
    /// Add the label named by the target.
    ApplyLabel,
    Unrecognized(String),
}

impl ActionKind {
    /// Map a rule-document action type (`"Mark as Read"`, …).
    pub fn parse(name: &str) -> Self {
        match name {
            "Mark as Read" => Self::MarkRead,
            "Mark as Unread" => Self::MarkUnread,
            "Move Message" => Self::Move,
            "Apply Label" => Self::ApplyLabel,
            other => Self::Unrecognized(other.to_string()),
        }
    }

    /// The rule-document name of this action type.
    pub fn label(&self) -> &str {
        match self {
            Self::MarkRead => "Mark as Read",
            Self::MarkUnread => "Mark as Unread",
            Self::Move => "Move Message",
            Self::ApplyLabel => "Apply Label",
            Self::Unrecognized(name) => name,
        }
    }

    /// What the target of this action names, for messages.
    pub fn target_noun(&self) -> &'static str {
        match self {
            Self::Move => "destination mailbox",
            Self::ApplyLabel => "label name",
            _ => "target",
        }
    }
}

/// One mutation, with its optional target (mailbox or label name).
///
/// A missing target on Move/ApplyLabel is only detected at [`Action::execute`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Action {
    pub kind: ActionKind,
    pub target: Option<String>,
}

impl Action {
    pub fn new(kind: ActionKind, target: Option<String>) -> Self {
        Self { kind, target }
    }

    /// Build an action from a rule-document type name and value.
    pub fn from_names(kind: &str, target: Option<String>) -> Self {
        Self::new(ActionKind::parse(kind), target)
    }

    /// Run this action for message `id`.
    ///
    /// Returns exactly what the mail service returned. Missing targets and
    /// unknown types fail without calling the mail service.
    pub fn execute(&self, mail: &mut dyn MailService, id: &str, sink: &dyn DiagnosticSink) -> bool {
        debug!(id, action = self.kind.label(), target = ?self.target, "Executing action");
        match &self.kind {
            ActionKind::MarkRead => mail.mark_read(id),
            ActionKind::MarkUnread => mail.mark_unread(id),
            ActionKind::Move => match self.required_target(id, sink) {
                Some(destination) => mail.move_message(id, destination),
                None => false,
            },
            ActionKind::ApplyLabel => match self.required_target(id, sink) {
                Some(label) => mail.apply_label(id, label),
                None => false,
            },
            ActionKind::Unrecognized(name) => {
                sink.emit(Diagnostic::UnknownActionType {
                    action: name.clone(),
                    record_id: id.to_string(),
                });
                false
            }
        }
    }

    fn required_target(&self, id: &str, sink: &dyn DiagnosticSink) -> Option<&str> {
        match self.target.as_deref() {
            Some(target) if !target.is_empty() => Some(target),
            _ => {
                sink.emit(Diagnostic::MissingActionTarget {
                    action: self.kind.clone(),
                    record_id: id.to_string(),
                });
                None
            }
        }
    }
}
