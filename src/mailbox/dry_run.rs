//! A mail service that only records what it was asked to do.

use std::fmt;

use tracing::info;

use super::MailService;

/// One requested mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlannedAction {
    MarkRead { id: String },
    MarkUnread { id: String },
    Move { id: String, destination: String },
    ApplyLabel { id: String, label: String },
}

impl PlannedAction {
    pub fn id(&self) -> &str {
        match self {
            Self::MarkRead { id }
            | Self::MarkUnread { id }
            | Self::Move { id, .. }
            | Self::ApplyLabel { id, .. } => id,
        }
    }
}

impl fmt::Display for PlannedAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MarkRead { .. } => write!(f, "mark read"),
            Self::MarkUnread { .. } => write!(f, "mark unread"),
            Self::Move { destination, .. } => write!(f, "move to '{destination}'"),
            Self::ApplyLabel { label, .. } => write!(f, "apply label '{label}'"),
        }
    }
}

/// Accepts every request and keeps it, in order, without touching any mailbox.
#[derive(Debug, Default)]
pub struct DryRunMailbox {
    planned: Vec<PlannedAction>,
}

impl DryRunMailbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn planned(&self) -> &[PlannedAction] {
        &self.planned
    }

    fn plan(&mut self, action: PlannedAction) -> bool {
        info!(id = action.id(), action = %action, "Dry run: would apply");
        self.planned.push(action);
        true
    }
}

impl MailService for DryRunMailbox {
    fn mark_read(&mut self, id: &str) -> bool {
        self.plan(PlannedAction::MarkRead { id: id.into() })
    }

    fn mark_unread(&mut self, id: &str) -> bool {
        self.plan(PlannedAction::MarkUnread { id: id.into() })
    }

    fn move_message(&mut self, id: &str, destination: &str) -> bool {
        self.plan(PlannedAction::Move {
            id: id.into(),
            destination: destination.into(),
        })
    }

    fn apply_label(&mut self, id: &str, label: &str) -> bool {
        self.plan(PlannedAction::ApplyLabel {
            id: id.into(),
            label: label.into(),
        })
    }
}
