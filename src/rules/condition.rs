//! Single field/predicate/value tests against an [`EmailRecord`].

use chrono::{DateTime, TimeDelta, Utc};

use crate::model::EmailRecord;

use super::diagnostics::{Diagnostic, DiagnosticSink};

/// Average month length used for `{months: n}` ages. Not calendar-accurate.
pub const DAYS_PER_MONTH: f64 = 30.44;

const MILLIS_PER_DAY: f64 = 86_400_000.0;

/// Which record attribute a condition reads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Field {
    Sender,
    Subject,
    Body,
    ReceivedAt,
    /// A name from the rule document that maps to no known field.
    Unrecognized(String),
}

impl Field {
    /// Map a rule-document field name (`"From"`, `"Subject"`, …).
    pub fn parse(name: &str) -> Self {
        match name {
            "From" => Self::Sender,
            "Subject" => Self::Subject,
            "Message" => Self::Body,
            "Received Date/Time" => Self::ReceivedAt,
            other => Self::Unrecognized(other.to_string()),
        }
    }

    /// The rule-document name of this field.
    pub fn label(&self) -> &str {
        match self {
            Self::Sender => "From",
            Self::Subject => "Subject",
            Self::Body => "Message",
            Self::ReceivedAt => "Received Date/Time",
            Self::Unrecognized(name) => name,
        }
    }
}

/// The comparison a condition applies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Predicate {
    Contains,
    NotContains,
    Equals,
    NotEquals,
    /// `"greater than"`: the message is older than the given age.
    OlderThan,
    /// `"less than"`: the message is newer than the given age.
    NewerThan,
    Unrecognized(String),
}

impl Predicate {
    pub fn parse(name: &str) -> Self {
        match name {
            "contains" => Self::Contains,
            "does not contain" => Self::NotContains,
            "equals" => Self::Equals,
            "does not equal" => Self::NotEquals,
            "greater than" => Self::OlderThan,
            "less than" => Self::NewerThan,
            other => Self::Unrecognized(other.to_string()),
        }
    }

    pub fn label(&self) -> &str {
        match self {
            Self::Contains => "contains",
            Self::NotContains => "does not contain",
            Self::Equals => "equals",
            Self::NotEquals => "does not equal",
            Self::OlderThan => "greater than",
            Self::NewerThan => "less than",
            Self::Unrecognized(name) => name,
        }
    }

    fn is_equality(&self) -> bool {
        matches!(self, Self::Equals | Self::NotEquals)
    }
}

/// A message age, as written in the rule document.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AgeSpec {
    Days(f64),
    Months(f64),
}

impl AgeSpec {
    /// Length of this age in days. Months use [`DAYS_PER_MONTH`].
    pub fn approx_days(&self) -> f64 {
        match *self {
            Self::Days(days) => days,
            Self::Months(months) => months * DAYS_PER_MONTH,
        }
    }

    /// The instant this age reaches back to from `now`.
    ///
    /// `None` if the result falls outside the representable range.
    pub fn threshold(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let millis = (self.approx_days() * MILLIS_PER_DAY).round();
        if !millis.is_finite() {
            return None;
        }
        let delta = TimeDelta::try_milliseconds(millis as i64)?;
        now.checked_sub_signed(delta)
    }
}

/// The right-hand side of a condition.
#[derive(Debug, Clone, PartialEq)]
pub enum ConditionValue {
    Text(String),
    Age(AgeSpec),
    Null,
    /// Any other JSON value. Never equal to a record field.
    Other(serde_json::Value),
}

impl ConditionValue {
    /// Interpret a rule-document `value`.
    ///
    /// `{days: n}` takes precedence over `{months: n}` when both are given.
    pub fn from_json(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::String(s) => Self::Text(s),
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Object(ref map) => {
                if let Some(days) = map.get("days").and_then(|v| v.as_f64()) {
                    Self::Age(AgeSpec::Days(days))
                } else if let Some(months) = map.get("months").and_then(|v| v.as_f64()) {
                    Self::Age(AgeSpec::Months(months))
                } else {
                    Self::Other(value)
                }
            }
            other => Self::Other(other),
        }
    }
}

/// A resolved record attribute.
#[derive(Debug, Clone, Copy, PartialEq)]
enum FieldValue<'a> {
    Text(&'a str),
    Timestamp(DateTime<Utc>),
    Missing,
}

/// One test: `field predicate value`.
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub field: Field,
    pub predicate: Predicate,
    pub value: ConditionValue,
}

impl Condition {
    pub fn new(field: Field, predicate: Predicate, value: ConditionValue) -> Self {
        Self {
            field,
            predicate,
            value,
        }
    }

    /// Build a condition from rule-document names and value.
    pub fn from_names(field: &str, predicate: &str, value: serde_json::Value) -> Self {
        Self::new(
            Field::parse(field),
            Predicate::parse(predicate),
            ConditionValue::from_json(value),
        )
    }

    /// Evaluate against `record`, sampling the clock now.
    pub fn evaluate(&self, record: &EmailRecord, sink: &dyn DiagnosticSink) -> bool {
        self.evaluate_at(record, Utc::now(), sink)
    }

    /// Evaluate against `record` with an explicit clock reading.
    ///
    /// Never fails: unknown names emit one warning and evaluate false.
    pub fn evaluate_at(
        &self,
        record: &EmailRecord,
        now: DateTime<Utc>,
        sink: &dyn DiagnosticSink,
    ) -> bool {
        let actual = match &self.field {
            Field::Unrecognized(name) => {
                sink.emit(Diagnostic::UnknownField {
                    field: name.clone(),
                });
                return false;
            }
            field => resolve(field, record),
        };

        // Nothing to compare against except for (in)equality with null.
        if actual == FieldValue::Missing && !self.predicate.is_equality() {
            return self.warn_if_unknown_predicate(sink);
        }

        match &self.predicate {
            Predicate::Contains => match (actual, &self.value) {
                (FieldValue::Text(haystack), ConditionValue::Text(needle)) => {
                    contains_ignore_case(haystack, needle)
                }
                _ => false,
            },
            Predicate::NotContains => match (actual, &self.value) {
                (FieldValue::Text(haystack), ConditionValue::Text(needle)) => {
                    !contains_ignore_case(haystack, needle)
                }
                _ => false,
            },
            Predicate::Equals => values_equal(actual, &self.value),
            Predicate::NotEquals => !values_equal(actual, &self.value),
            Predicate::OlderThan => self
                .received_and_threshold(actual, now)
                .is_some_and(|(received, age, threshold)| match threshold {
                    Some(threshold) => received < threshold,
                    // Beyond the calendar: only a far-future threshold is older.
                    None => age.approx_days() < 0.0,
                }),
            Predicate::NewerThan => self
                .received_and_threshold(actual, now)
                .is_some_and(|(received, age, threshold)| match threshold {
                    Some(threshold) => received > threshold,
                    None => age.approx_days() > 0.0,
                }),
            Predicate::Unrecognized(_) => self.warn_if_unknown_predicate(sink),
        }
    }

    /// Emit the unknown-predicate warning (if applicable). Always returns false.
    fn warn_if_unknown_predicate(&self, sink: &dyn DiagnosticSink) -> bool {
        if let Predicate::Unrecognized(name) = &self.predicate {
            sink.emit(Diagnostic::UnknownPredicate {
                predicate: name.clone(),
                field: self.field.label().to_string(),
            });
        }
        false
    }

    /// For date predicates: the received time and the age threshold.
    ///
    /// `None` when the condition cannot apply (wrong field, missing date,
    /// non-age value). An inner `None` threshold means the age reaches
    /// outside the representable range, in the direction of its sign.
    fn received_and_threshold(
        &self,
        actual: FieldValue<'_>,
        now: DateTime<Utc>,
    ) -> Option<(DateTime<Utc>, &AgeSpec, Option<DateTime<Utc>>)> {
        if self.field != Field::ReceivedAt {
            return None;
        }
        let FieldValue::Timestamp(received) = actual else {
            return None;
        };
        let ConditionValue::Age(age) = &self.value else {
            return None;
        };
        Some((received, age, age.threshold(now)))
    }
}

fn resolve<'a>(field: &Field, record: &'a EmailRecord) -> FieldValue<'a> {
    match field {
        Field::Sender => record
            .sender
            .as_deref()
            .map_or(FieldValue::Missing, FieldValue::Text),
        Field::Subject => record
            .subject
            .as_deref()
            .map_or(FieldValue::Missing, FieldValue::Text),
        Field::Body => FieldValue::Text(&record.body),
        Field::ReceivedAt => record
            .received_at
            .map_or(FieldValue::Missing, FieldValue::Timestamp),
        Field::Unrecognized(_) => FieldValue::Missing,
    }
}

/// Case-insensitive substring test.
fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

/// Case-insensitive for two strings; exact otherwise. Missing equals null.
fn values_equal(actual: FieldValue<'_>, expected: &ConditionValue) -> bool {
    match (actual, expected) {
        (FieldValue::Text(a), ConditionValue::Text(b)) => a.to_lowercase() == b.to_lowercase(),
        (FieldValue::Missing, ConditionValue::Null) => true,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::diagnostics::{CollectingSink, Severity};
    use chrono::Duration;
    use serde_json::json;

    fn record() -> EmailRecord {
        EmailRecord::new("m1", "t1")
            .with_sender("Alice <alice@Example.com>")
            .with_subject("Quarterly Report")
            .with_body("Please find the numbers attached.")
    }

    fn eval(field: &str, predicate: &str, value: serde_json::Value, r: &EmailRecord) -> bool {
        let sink = CollectingSink::new();
        Condition::from_names(field, predicate, value).evaluate(r, &sink)
    }

    #[test]
    fn test_contains_is_case_insensitive() {
        assert!(eval("From", "contains", json!("example.COM"), &record()));
        assert!(!eval("From", "contains", json!("other.org"), &record()));
    }

    #[test]
    fn test_does_not_contain() {
        assert!(eval("Message", "does not contain", json!("invoice"), &record()));
        assert!(!eval("Message", "does not contain", json!("NUMBERS"), &record()));
    }

    #[test]
    fn test_equals_ignores_case() {
        assert!(eval("Subject", "equals", json!("quarterly report"), &record()));
        assert!(!eval("Subject", "equals", json!("quarterly"), &record()));
        assert!(eval("Subject", "does not equal", json!("quarterly"), &record()));
        assert!(!eval("Subject", "does not equal", json!("QUARTERLY REPORT"), &record()));
    }

    #[test]
    fn test_missing_sender_never_contains() {
        let r = EmailRecord::new("m2", "t2");
        assert!(!eval("From", "contains", json!(""), &r));
        assert!(!eval("From", "contains", json!("x"), &r));
        assert!(!eval("From", "does not contain", json!("x"), &r));
    }

    #[test]
    fn test_missing_equals_null() {
        let r = EmailRecord::new("m2", "t2");
        assert!(eval("Subject", "equals", json!(null), &r));
        assert!(!eval("Subject", "does not equal", json!(null), &r));
        assert!(!eval("Subject", "equals", json!("x"), &r));
        assert!(eval("Subject", "does not equal", json!("x"), &r));
    }

    #[test]
    fn test_age_windows() {
        let now = Utc::now();
        let sink = CollectingSink::new();
        let three_days = record().with_received_at(now - Duration::days(3));
        let newer_7 = Condition::from_names("Received Date/Time", "less than", json!({"days": 7}));
        let newer_2 = Condition::from_names("Received Date/Time", "less than", json!({"days": 2}));
        assert!(newer_7.evaluate_at(&three_days, now, &sink));
        assert!(!newer_2.evaluate_at(&three_days, now, &sink));

        let forty_days = record().with_received_at(now - Duration::days(40));
        let older_30 =
            Condition::from_names("Received Date/Time", "greater than", json!({"days": 30}));
        let newer_30 = Condition::from_names("Received Date/Time", "less than", json!({"days": 30}));
        assert!(older_30.evaluate_at(&forty_days, now, &sink));
        assert!(!newer_30.evaluate_at(&forty_days, now, &sink));
        assert!(sink.is_empty());
    }

    #[test]
    fn test_months_use_average_length() {
        assert!((AgeSpec::Months(2.0).approx_days() - 60.88).abs() < 1e-9);
        let now = Utc::now();
        let sink = CollectingSink::new();
        let r = record().with_received_at(now - Duration::days(45));
        let older_1m =
            Condition::from_names("Received Date/Time", "greater than", json!({"months": 1}));
        let newer_2m = Condition::from_names("Received Date/Time", "less than", json!({"months": 2}));
        assert!(older_1m.evaluate_at(&r, now, &sink));
        assert!(newer_2m.evaluate_at(&r, now, &sink));
    }

    #[test]
    fn test_days_take_precedence_over_months() {
        let value = ConditionValue::from_json(json!({"days": 3, "months": 9}));
        assert_eq!(value, ConditionValue::Age(AgeSpec::Days(3.0)));
    }

    #[test]
    fn test_missing_date_never_matches_age() {
        let r = record();
        assert!(!eval("Received Date/Time", "less than", json!({"days": 7}), &r));
        assert!(!eval("Received Date/Time", "greater than", json!({"days": 7}), &r));
    }

    #[test]
    fn test_age_predicate_on_text_field_is_false() {
        let r = record().with_received_at(Utc::now());
        assert!(!eval("Subject", "less than", json!({"days": 7}), &r));
        assert!(!eval("Received Date/Time", "less than", json!("7"), &r));
    }

    #[test]
    fn test_huge_age_does_not_panic() {
        let now = Utc::now();
        let sink = CollectingSink::new();
        let r = record().with_received_at(now - Duration::days(1));
        let c = Condition::from_names("Received Date/Time", "less than", json!({"days": 1e300}));
        assert!(c.evaluate_at(&r, now, &sink));
    }

    #[test]
    fn test_huge_negative_age_follows_its_sign() {
        let now = Utc::now();
        let sink = CollectingSink::new();
        let r = record().with_received_at(now - Duration::days(1));
        let newer = |v| Condition::from_names("Received Date/Time", "less than", v);
        let older = |v| Condition::from_names("Received Date/Time", "greater than", v);

        assert!(!newer(json!({"days": -10})).evaluate_at(&r, now, &sink));
        assert!(!newer(json!({"days": -1e300})).evaluate_at(&r, now, &sink));
        assert!(older(json!({"days": -1e300})).evaluate_at(&r, now, &sink));
        assert!(!older(json!({"days": 1e300})).evaluate_at(&r, now, &sink));
        assert!(sink.is_empty());
    }

    #[test]
    fn test_unknown_field_warns_once() {
        let sink = CollectingSink::new();
        let c = Condition::from_names("Cc", "equals", json!(null));
        assert!(!c.evaluate(&record(), &sink));
        assert_eq!(sink.count(Severity::Warning), 1);
        assert_eq!(
            sink.diagnostics()[0],
            Diagnostic::UnknownField { field: "Cc".into() }
        );
    }

    #[test]
    fn test_unknown_predicate_warns_once() {
        let sink = CollectingSink::new();
        let c = Condition::from_names("Subject", "starts with", json!("Q"));
        assert!(!c.evaluate(&record(), &sink));
        assert_eq!(sink.count(Severity::Warning), 1);

        let sink = CollectingSink::new();
        let c = Condition::from_names("Subject", "starts with", json!("Q"));
        assert!(!c.evaluate(&EmailRecord::new("m3", "t3"), &sink));
        assert_eq!(sink.count(Severity::Warning), 1);
    }

    #[test]
    fn test_non_text_value_never_equals() {
        assert!(!eval("Subject", "equals", json!(42), &record()));
        assert!(eval("Subject", "does not equal", json!(42), &record()));
        assert!(!eval("Subject", "contains", json!({"days": 1}), &record()));
    }
}
