//! Core data model: the message record the rule engine evaluates.

pub mod record;

pub use record::EmailRecord;
