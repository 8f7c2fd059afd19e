//! Rule document schema and the sources it is read from.
//!
//! The document is a JSON array:
//!
//! ```json
//! [
//!   {
//!     "description": "Recent meeting invites",
//!     "overall_predicate": "all",
//!     "conditions": [
//!       { "field": "From", "predicate": "contains", "value": "example.com" },
//!       { "field": "Received Date/Time", "predicate": "less than", "value": { "days": 7 } }
//!     ],
//!     "actions": [ { "type": "Mark as Read" } ]
//!   }
//! ]
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{InboxError, Result};

use super::action::Action;
use super::condition::Condition;
use super::rule::{Combinator, Rule};

const DEFAULT_DESCRIPTION: &str = "Untitled Rule";
const DEFAULT_COMBINATOR: &str = "all";

/// One rule as written in the document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleSpec {
    #[serde(default = "default_description")]
    pub description: String,
    #[serde(default = "default_combinator")]
    pub overall_predicate: String,
    #[serde(default)]
    pub conditions: Vec<ConditionSpec>,
    #[serde(default)]
    pub actions: Vec<ActionSpec>,
}

/// One condition as written in the document. All keys are required.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConditionSpec {
    pub field: String,
    pub predicate: String,
    pub value: serde_json::Value,
}

/// One action as written in the document. `value` is the mailbox or label name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionSpec {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

fn default_description() -> String {
    DEFAULT_DESCRIPTION.to_string()
}

fn default_combinator() -> String {
    DEFAULT_COMBINATOR.to_string()
}

impl From<RuleSpec> for Rule {
    fn from(spec: RuleSpec) -> Self {
        let conditions = spec
            .conditions
            .into_iter()
            .map(|c| Condition::from_names(&c.field, &c.predicate, c.value))
            .collect();
        let actions = spec
            .actions
            .into_iter()
            .map(|a| Action::from_names(&a.kind, a.value))
            .collect();
        Rule::new(
            spec.description,
            Combinator::parse(&spec.overall_predicate),
            conditions,
            actions,
        )
    }
}

/// Decode a whole document. Any structural problem fails the whole document.
pub fn parse_document(origin: &str, text: &str) -> Result<Vec<Rule>> {
    let specs: Vec<RuleSpec> =
        serde_json::from_str(text).map_err(|e| InboxError::RuleDocument {
            origin: origin.to_string(),
            reason: e.to_string(),
        })?;
    Ok(specs.into_iter().map(Rule::from).collect())
}

/// Where a rule document comes from.
pub trait RuleSource {
    /// Human-readable name for logs (usually a path).
    fn origin(&self) -> String;

    /// Read the raw document text.
    fn read(&self) -> Result<String>;
}

/// A rule document on disk.
#[derive(Debug, Clone)]
pub struct FileRuleSource {
    path: PathBuf,
}

impl FileRuleSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl RuleSource for FileRuleSource {
    fn origin(&self) -> String {
        self.path.display().to_string()
    }

    fn read(&self) -> Result<String> {
        std::fs::read_to_string(&self.path).map_err(|e| InboxError::io(&self.path, e))
    }
}

/// A rule document held in memory.
#[derive(Debug, Clone)]
pub struct InlineRuleSource(pub String);

impl RuleSource for InlineRuleSource {
    fn origin(&self) -> String {
        "<inline>".to_string()
    }

    fn read(&self) -> Result<String> {
        Ok(self.0.clone())
    }
}
