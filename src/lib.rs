//! `inboxrules`: declarative triage rules for a mailbox.
//!
//! Rules are loaded from a JSON document, evaluated against message records
//! ingested from MBOX/EML files, and matching rules drive mutations on a
//! [`mailbox::MailService`].

pub mod config;
pub mod error;
pub mod ingest;
pub mod mailbox;
pub mod model;
pub mod rules;
pub mod store;
