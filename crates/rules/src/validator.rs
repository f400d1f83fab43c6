//! Structural validation for automation rules. Collects every problem
//! rather than stopping at the first; a rule with any error must not be
//! activated.

use autoflow_core::catalog::{is_confidence_bearing, Catalog};
use autoflow_core::error::ValidationError;

use crate::types::AutomationRule;

pub fn validate(rule: &AutomationRule, catalog: &dyn Catalog) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if rule.name.trim().is_empty() {
        errors.push(ValidationError::new("name", "must not be empty"));
    }

    if rule.trigger_type.trim().is_empty() {
        errors.push(ValidationError::new("trigger_type", "must not be empty"));
    } else if !catalog
        .trigger_types(rule.channel)
        .contains(&rule.trigger_type)
    {
        errors.push(ValidationError::new(
            "trigger_type",
            format!(
                "'{}' is not a known trigger for channel '{}'",
                rule.trigger_type, rule.channel
            ),
        ));
    }

    if rule.action_type.trim().is_empty() {
        errors.push(ValidationError::new("action_type", "must not be empty"));
    } else if !catalog.action_types().contains(&rule.action_type) {
        errors.push(ValidationError::new(
            "action_type",
            format!("'{}' is not a known action type", rule.action_type),
        ));
    }

    if !rule.trigger_type.trim().is_empty() {
        let allowed = catalog.condition_keys(&rule.trigger_type);
        for key in rule.trigger_conditions.keys() {
            if !allowed.contains(key) {
                errors.push(ValidationError::new(
                    format!("trigger_conditions.{key}"),
                    format!(
                        "'{}' is not a condition key for trigger '{}'",
                        key, rule.trigger_type
                    ),
                ));
            }
        }
    }

    if is_confidence_bearing(&rule.trigger_type) {
        match rule.confidence_threshold {
            None => errors.push(ValidationError::new(
                "confidence_threshold",
                format!(
                    "required for classifier-derived trigger '{}'",
                    rule.trigger_type
                ),
            )),
            Some(threshold) if threshold > 100 => errors.push(ValidationError::new(
                "confidence_threshold",
                "must be between 0 and 100",
            )),
            Some(_) => {}
        }
    }

    errors
}

#[cfg(test)]
mod tests {
    use super::*;
    use autoflow_core::catalog::StaticCatalog;
    use autoflow_core::types::Channel;
    use serde_json::json;

    #[test]
    fn test_valid_rule_has_no_errors() {
        let catalog = StaticCatalog::new();
        let rule = AutomationRule::new(
            "Follow up interested",
            Channel::Call,
            "disposition_interested",
            "send_email",
        )
        .with_condition("disposition_category", json!("positive"));

        assert!(validate(&rule, &catalog).is_empty());
    }

    #[test]
    fn test_collects_all_errors() {
        let catalog = StaticCatalog::new();
        let mut rule = AutomationRule::new("", Channel::Email, "no_such_trigger", "send_fax");
        rule.trigger_conditions
            .insert("bogus_key".to_string(), json!("x"));

        let errors = validate(&rule, &catalog);
        let fields: Vec<&str> = errors.iter().map(|e| e.field.as_str()).collect();
        assert!(fields.contains(&"name"));
        assert!(fields.contains(&"trigger_type"));
        assert!(fields.contains(&"action_type"));
        assert!(fields.iter().any(|f| f.starts_with("trigger_conditions.")));
    }

    #[test]
    fn test_confidence_bearing_requires_threshold() {
        let catalog = StaticCatalog::new();
        let rule = AutomationRule::new(
            "Positive sentiment follow-up",
            Channel::Email,
            "sentiment_positive",
            "send_email",
        );

        let errors = validate(&rule, &catalog);
        assert!(errors.iter().any(|e| e.field == "confidence_threshold"));

        let fixed = rule.with_confidence_threshold(70);
        assert!(validate(&fixed, &catalog).is_empty());
    }

    #[test]
    fn test_unknown_channel_trigger_rejected() {
        let catalog = StaticCatalog::new();
        // A real trigger type, but scoped to the wrong channel.
        let rule = AutomationRule::new(
            "Wrong channel",
            Channel::Email,
            "disposition_interested",
            "send_email",
        );
        let errors = validate(&rule, &catalog);
        assert!(errors.iter().any(|e| e.field == "trigger_type"));
    }
}
