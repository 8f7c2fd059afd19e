//! The stored snapshot of one message.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Metadata and plain-text body of a single message.
///
/// `id` is the only identity key: two records with the same id denote the
/// same message. Records are read-only while rules are evaluated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmailRecord {
    /// Stable message identifier (Message-ID or a content hash).
    pub id: String,

    /// Conversation identifier.
    pub thread_id: String,

    /// Raw sender in `"Display Name <addr>"` form, if the header was present.
    pub sender: Option<String>,

    /// Decoded subject line, if the header was present.
    pub subject: Option<String>,

    /// When the message was received. `None` if the `Date:` header was
    /// missing or unparseable.
    pub received_at: Option<DateTime<Utc>>,

    /// Plain-text body (may be empty).
    pub body: String,

    /// Ordered set of label names.
    pub labels: Vec<String>,
}

impl EmailRecord {
    /// Create a record with only its identity set.
    pub fn new(id: impl Into<String>, thread_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            thread_id: thread_id.into(),
            sender: None,
            subject: None,
            received_at: None,
            body: String::new(),
            labels: Vec::new(),
        }
    }

    pub fn with_sender(mut self, sender: impl Into<String>) -> Self {
        self.sender = Some(sender.into());
        self
    }

    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    pub fn with_received_at(mut self, received_at: DateTime<Utc>) -> Self {
        self.received_at = Some(received_at);
        self
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    /// Set the labels, dropping duplicates but keeping first-seen order.
    pub fn with_labels<I, S>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.labels.clear();
        for label in labels {
            let label = label.into();
            if !self.labels.contains(&label) {
                self.labels.push(label);
            }
        }
        self
    }

    /// Sender for display: the raw header, or `"(unknown)"`.
    pub fn sender_display(&self) -> &str {
        self.sender.as_deref().unwrap_or("(unknown)")
    }

    /// Subject for display: the decoded subject, or `"(no subject)"`.
    pub fn subject_display(&self) -> &str {
        self.subject.as_deref().unwrap_or("(no subject)")
    }
}
