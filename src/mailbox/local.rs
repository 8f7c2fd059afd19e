//! File-backed mailbox following the Gmail label model.
//!
//! Every message carries a set of label ids. Read state is the absence of
//! the `UNREAD` system label; "moving" a message removes `INBOX` and adds
//! the destination label. User labels get ids of the form `Label_<n>`.
//!
//! State is kept as pretty JSON so it can be inspected and edited by hand.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{InboxError, Result};
use crate::model::EmailRecord;

use super::MailService;

pub const INBOX: &str = "INBOX";
pub const UNREAD: &str = "UNREAD";

/// Labels that always exist. Their id is also their name.
pub const SYSTEM_LABELS: &[&str] = &[
    INBOX,
    UNREAD,
    "STARRED",
    "IMPORTANT",
    "SENT",
    "DRAFT",
    "SPAM",
    "TRASH",
];

/// Alternative spellings found in exported mail (`X-Gmail-Labels`).
const SYSTEM_ALIASES: &[(&str, &str)] = &[("Drafts", "DRAFT"), ("Sent Mail", "SENT")];

/// A label in the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelInfo {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct MailboxState {
    /// User-created labels (system labels are implicit).
    #[serde(default)]
    labels: Vec<LabelInfo>,
    #[serde(default)]
    next_label: u32,
    /// Message id → label ids.
    #[serde(default)]
    messages: BTreeMap<String, BTreeSet<String>>,
}

/// A mailbox whose state lives in a local JSON file.
#[derive(Debug)]
pub struct LocalMailbox {
    path: Option<PathBuf>,
    state: MailboxState,
    /// Name → id, filled lazily by [`LocalMailbox::resolve_label`].
    label_cache: HashMap<String, String>,
}

impl LocalMailbox {
    /// Open the mailbox stored at `path`, or start an empty one if the file
    /// does not exist yet.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let state = if path.exists() {
            let text = std::fs::read_to_string(&path).map_err(|e| InboxError::io(&path, e))?;
            serde_json::from_str(&text).map_err(|e| InboxError::MailboxState {
                path: path.clone(),
                reason: e.to_string(),
            })?
        } else {
            debug!(path = %path.display(), "No mailbox state yet, starting empty");
            MailboxState::default()
        };
        Ok(Self {
            path: Some(path),
            state,
            label_cache: HashMap::new(),
        })
    }

    /// A mailbox that is never persisted.
    pub fn in_memory() -> Self {
        Self {
            path: None,
            state: MailboxState::default(),
            label_cache: HashMap::new(),
        }
    }

    /// Write the state back to its file (no-op for in-memory mailboxes).
    pub fn save(&self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| InboxError::io(parent, e))?;
            }
        }
        let text = serde_json::to_string_pretty(&self.state)
            .map_err(|e| InboxError::Serialization(e.to_string()))?;
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, text).map_err(|e| InboxError::io(&tmp, e))?;
        std::fs::rename(&tmp, path).map_err(|e| InboxError::io(path, e))?;
        debug!(path = %path.display(), "Saved mailbox state");
        Ok(())
    }

    /// Number of known messages.
    pub fn message_count(&self) -> usize {
        self.state.messages.len()
    }

    /// The full catalog: system labels first, then user labels in creation order.
    pub fn labels(&self) -> Vec<LabelInfo> {
        SYSTEM_LABELS
            .iter()
            .map(|&id| LabelInfo {
                id: id.to_string(),
                name: id.to_string(),
            })
            .chain(self.state.labels.iter().cloned())
            .collect()
    }

    /// Each label with the number of messages carrying it.
    pub fn label_counts(&self) -> Vec<(LabelInfo, usize)> {
        self.labels()
            .into_iter()
            .map(|label| {
                let count = self
                    .state
                    .messages
                    .values()
                    .filter(|ids| ids.contains(&label.id))
                    .count();
                (label, count)
            })
            .collect()
    }

    /// Create a user label, or return the id of an existing label with
    /// the same name (case-insensitive).
    pub fn create_label(&mut self, name: &str) -> String {
        if let Some(id) = self.resolve_label(name) {
            return id;
        }
        self.state.next_label += 1;
        let id = format!("Label_{}", self.state.next_label);
        self.state.labels.push(LabelInfo {
            id: id.clone(),
            name: name.to_string(),
        });
        self.label_cache.insert(name.to_string(), id.clone());
        info!(label = name, id = %id, "Created label");
        id
    }

    /// Resolve a label name to its id, case-insensitively.
    pub fn resolve_label(&mut self, name: &str) -> Option<String> {
        if let Some(id) = self.label_cache.get(name) {
            return Some(id.clone());
        }
        let found = self.lookup_label(name)?;
        self.label_cache.insert(name.to_string(), found.clone());
        Some(found)
    }

    fn lookup_label(&self, name: &str) -> Option<String> {
        let system = SYSTEM_LABELS
            .iter()
            .find(|id| id.eq_ignore_ascii_case(name))
            .or_else(|| {
                SYSTEM_ALIASES
                    .iter()
                    .find(|(alias, _)| alias.eq_ignore_ascii_case(name))
                    .map(|(_, id)| id)
            });
        if let Some(id) = system {
            return Some(id.to_string());
        }
        let lower = name.to_lowercase();
        self.state
            .labels
            .iter()
            .find(|l| l.name.to_lowercase() == lower)
            .map(|l| l.id.clone())
    }

    /// Seed a message and its labels the first time it is seen, creating
    /// any user labels it mentions.
    ///
    /// Returns `false` for a message already known; its current state
    /// (including changes made by rule actions) is kept.
    pub fn register(&mut self, record: &EmailRecord) -> bool {
        if self.state.messages.contains_key(&record.id) {
            return false;
        }
        let ids: BTreeSet<String> = record
            .labels
            .iter()
            .map(|name| self.create_label(name))
            .collect();
        self.state.messages.insert(record.id.clone(), ids);
        true
    }

    /// Label names on message `id`, in catalog order.
    pub fn message_labels(&self, id: &str) -> Option<Vec<String>> {
        let ids = self.state.messages.get(id)?;
        Some(
            self.labels()
                .into_iter()
                .filter(|l| ids.contains(&l.id))
                .map(|l| l.name)
                .collect(),
        )
    }

    pub fn is_unread(&self, id: &str) -> Option<bool> {
        self.state.messages.get(id).map(|ids| ids.contains(UNREAD))
    }

    fn message_mut(&mut self, id: &str) -> Option<&mut BTreeSet<String>> {
        let labels = self.state.messages.get_mut(id);
        if labels.is_none() {
            warn!(id, "Message not found in mailbox");
        }
        labels
    }
}

impl MailService for LocalMailbox {
    fn mark_read(&mut self, id: &str) -> bool {
        let Some(labels) = self.message_mut(id) else {
            return false;
        };
        labels.remove(UNREAD);
        info!(id, "Marked as read");
        true
    }

    fn mark_unread(&mut self, id: &str) -> bool {
        let Some(labels) = self.message_mut(id) else {
            return false;
        };
        labels.insert(UNREAD.to_string());
        info!(id, "Marked as unread");
        true
    }

    fn move_message(&mut self, id: &str, destination: &str) -> bool {
        let Some(label_id) = self.resolve_label(destination) else {
            warn!(id, destination, "Destination mailbox not found");
            return false;
        };
        let Some(labels) = self.message_mut(id) else {
            return false;
        };
        if label_id != INBOX {
            labels.remove(INBOX);
        }
        labels.insert(label_id);
        info!(id, destination, "Moved message");
        true
    }

    fn apply_label(&mut self, id: &str, label: &str) -> bool {
        let Some(label_id) = self.resolve_label(label) else {
            warn!(id, label, "Label not found");
            return false;
        };
        let Some(labels) = self.message_mut(id) else {
            return false;
        };
        labels.insert(label_id);
        info!(id, label, "Applied label");
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mailbox() -> LocalMailbox {
        let mut mb = LocalMailbox::in_memory();
        mb.register(&EmailRecord::new("m1", "t1").with_labels(["Inbox", "Unread", "Work"]));
        mb
    }

    #[test]
    fn test_register_maps_system_and_user_labels() {
        let mb = mailbox();
        assert_eq!(
            mb.message_labels("m1").unwrap(),
            vec!["INBOX", "UNREAD", "Work"]
        );
        assert_eq!(mb.is_unread("m1"), Some(true));
    }

    #[test]
    fn test_read_state_toggles() {
        let mut mb = mailbox();
        assert!(mb.mark_read("m1"));
        assert_eq!(mb.is_unread("m1"), Some(false));
        assert!(mb.mark_unread("m1"));
        assert_eq!(mb.is_unread("m1"), Some(true));
    }

    #[test]
    fn test_unknown_message_fails() {
        let mut mb = mailbox();
        assert!(!mb.mark_read("nope"));
        assert!(!mb.apply_label("nope", "Work"));
    }

    #[test]
    fn test_move_leaves_inbox() {
        let mut mb = mailbox();
        assert!(mb.move_message("m1", "spam"));
        let labels = mb.message_labels("m1").unwrap();
        assert!(labels.contains(&"SPAM".to_string()));
        assert!(!labels.contains(&"INBOX".to_string()));
    }

    #[test]
    fn test_move_to_inbox_keeps_inbox() {
        let mut mb = mailbox();
        assert!(mb.move_message("m1", "Inbox"));
        assert!(mb.message_labels("m1").unwrap().contains(&"INBOX".to_string()));
    }

    #[test]
    fn test_unknown_label_fails() {
        let mut mb = mailbox();
        assert!(!mb.apply_label("m1", "Receipts"));
        assert!(!mb.move_message("m1", "Receipts"));
        mb.create_label("Receipts");
        assert!(mb.apply_label("m1", "receipts"));
    }

    #[test]
    fn test_create_label_is_idempotent() {
        let mut mb = LocalMailbox::in_memory();
        let a = mb.create_label("Travel");
        let b = mb.create_label("TRAVEL");
        assert_eq!(a, b);
        assert_eq!(a, "Label_1");
        assert_eq!(mb.create_label("inbox"), "INBOX");
    }

    #[test]
    fn test_save_and_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state").join("mailbox.json");
        let mut mb = LocalMailbox::open(&path).unwrap();
        mb.register(&EmailRecord::new("m1", "t1").with_labels(["Unread", "Work"]));
        assert!(mb.mark_read("m1"));
        mb.save().unwrap();

        let reopened = LocalMailbox::open(&path).unwrap();
        assert_eq!(reopened.message_count(), 1);
        assert_eq!(reopened.is_unread("m1"), Some(false));
        assert_eq!(reopened.message_labels("m1").unwrap(), vec!["Work"]);
    }

    #[test]
    fn test_corrupt_state_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mailbox.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            LocalMailbox::open(&path),
            Err(InboxError::MailboxState { .. })
        ));
    }

    #[test]
    fn test_register_keeps_existing_state() {
        let mut mb = mailbox();
        assert!(mb.mark_read("m1"));
        assert!(!mb.register(&EmailRecord::new("m1", "t1").with_labels(["Inbox", "Unread"])));
        assert_eq!(mb.is_unread("m1"), Some(false));
    }

    #[test]
    fn test_label_counts() {
        let mut mb = mailbox();
        mb.register(&EmailRecord::new("m2", "t2").with_labels(["Work"]));
        let counts = mb.label_counts();
        let work = counts.iter().find(|(l, _)| l.name == "Work").unwrap();
        assert_eq!(work.1, 2);
        let inbox = counts.iter().find(|(l, _)| l.id == "INBOX").unwrap();
        assert_eq!(inbox.1, 1);
    }
}
