//! Condition matching — pure predicate evaluation against event attributes.
//!
//! Two surfaces share the comparison logic: flat-rule condition maps
//! (`matches`) and workflow branch predicates (`Predicate::evaluate`).
//! Ambiguous comparisons fail closed: a malformed value is a non-match,
//! never an error.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use autoflow_core::types::Event;

/// Result of evaluating a rule's condition set against an event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchOutcome {
    pub matched: bool,
    /// A condition key that failed, when `matched` is false.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failed_key: Option<String>,
}

impl MatchOutcome {
    pub fn matched() -> Self {
        Self {
            matched: true,
            failed_key: None,
        }
    }

    pub fn failed(key: impl Into<String>) -> Self {
        Self {
            matched: false,
            failed_key: Some(key.into()),
        }
    }
}

/// Evaluates every `(key, expected)` pair against the event's attributes.
/// All conditions must hold; an empty set always matches.
///
/// Comparison per key:
/// - `*_duration_min`: numeric, actual >= expected
/// - `*_duration_max`: numeric, actual <= expected
/// - `*_keyword` and `link_url_contains`: case-insensitive substring
/// - everything else: exact string equality (numbers by string form)
pub fn matches(conditions: &HashMap<String, serde_json::Value>, event: &Event) -> MatchOutcome {
    for (key, expected) in conditions {
        let actual = event.attribute(key_attribute(key));
        if !condition_holds(key, expected, actual) {
            return MatchOutcome::failed(key.clone());
        }
    }
    MatchOutcome::matched()
}

/// Returns whether a confidence-gated rule clears its threshold. A missing
/// classifier score fails closed.
pub fn confidence_clears(confidence: Option<f64>, threshold: u8) -> bool {
    match confidence {
        Some(score) => score >= f64::from(threshold),
        None => false,
    }
}

fn condition_holds(key: &str, expected: &serde_json::Value, actual: Option<&serde_json::Value>) -> bool {
    let Some(actual) = actual else {
        return false;
    };

    if key.ends_with("_duration_min") {
        return match (as_number(actual), as_number(expected)) {
            (Some(a), Some(e)) => a >= e,
            _ => false,
        };
    }
    if key.ends_with("_duration_max") {
        return match (as_number(actual), as_number(expected)) {
            (Some(a), Some(e)) => a <= e,
            _ => false,
        };
    }
    if key.ends_with("_keyword") || key == "link_url_contains" {
        let haystack = as_string(actual).to_lowercase();
        let needle = as_string(expected).to_lowercase();
        return !needle.is_empty() && haystack.contains(&needle);
    }

    as_string(actual) == as_string(expected)
}

/// The attribute a condition key reads. Range keys read the base attribute
/// (`call_duration_min` checks `call_duration`); keyword keys read their
/// subject (`notes_keyword` checks `notes`, `reply_keyword` checks `reply`).
fn key_attribute(key: &str) -> &str {
    if let Some(base) = key.strip_suffix("_min").or_else(|| key.strip_suffix("_max")) {
        return base;
    }
    if let Some(base) = key.strip_suffix("_keyword") {
        return base;
    }
    if key == "link_url_contains" {
        return "link_url";
    }
    key
}

fn as_number(value: &serde_json::Value) -> Option<f64> {
    match value {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn as_string(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Number(n) => n.to_string(),
        serde_json::Value::Bool(b) => b.to_string(),
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Comparison operator for a workflow branch predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PredicateOperator {
    Equals,
    NotEquals,
    Contains,
    GreaterThan,
    LessThan,
    IsEmpty,
}

/// A single `{field, operator, value}` predicate, as configured on a
/// workflow condition node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Predicate {
    pub field: String,
    pub operator: PredicateOperator,
    #[serde(default)]
    pub value: serde_json::Value,
}

impl Predicate {
    pub fn new(field: impl Into<String>, operator: PredicateOperator, value: serde_json::Value) -> Self {
        Self {
            field: field.into(),
            operator,
            value,
        }
    }

    /// Evaluates the predicate against the event's attributes. Missing
    /// fields satisfy only `NotEquals` and `IsEmpty`.
    pub fn evaluate(&self, event: &Event) -> bool {
        let actual = event.attribute(&self.field);
        match self.operator {
            PredicateOperator::Equals => {
                actual.is_some_and(|a| as_string(a) == as_string(&self.value))
            }
            PredicateOperator::NotEquals => {
                !actual.is_some_and(|a| as_string(a) == as_string(&self.value))
            }
            PredicateOperator::Contains => actual.is_some_and(|a| {
                as_string(a)
                    .to_lowercase()
                    .contains(&as_string(&self.value).to_lowercase())
            }),
            PredicateOperator::GreaterThan => match (actual.and_then(as_number), as_number(&self.value)) {
                (Some(a), Some(e)) => a > e,
                _ => false,
            },
            PredicateOperator::LessThan => match (actual.and_then(as_number), as_number(&self.value)) {
                (Some(a), Some(e)) => a < e,
                _ => false,
            },
            PredicateOperator::IsEmpty => match actual {
                None | Some(serde_json::Value::Null) => true,
                Some(serde_json::Value::String(s)) => s.is_empty(),
                Some(_) => false,
            },
        }
    }
}
