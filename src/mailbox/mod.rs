//! Mail-service capability used by rule actions, and its implementations.

pub mod dry_run;
pub mod local;

pub use dry_run::{DryRunMailbox, PlannedAction};
pub use local::LocalMailbox;

/// The mailbox mutations rule actions can request.
///
/// Each call is independent and reports only success or failure. Name
/// resolution for mailboxes and labels is the implementation's concern.
pub trait MailService {
    fn mark_read(&mut self, id: &str) -> bool;
    fn mark_unread(&mut self, id: &str) -> bool;
    /// Move message `id` to the mailbox named `destination`.
    fn move_message(&mut self, id: &str, destination: &str) -> bool;
    /// Add the label named `label` to message `id`.
    fn apply_label(&mut self, id: &str, label: &str) -> bool;
}
