use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use tracing::{debug, info};
use uuid::Uuid;

use autoflow_core::catalog::{is_confidence_bearing, Catalog};
use autoflow_core::config::EngineConfig;
use autoflow_core::error::{AutomationError, AutomationResult};
use autoflow_core::event_bus::{make_event, noop_sink, DecisionEventType, EventSink};
use autoflow_core::types::Event;

use crate::matcher;
use crate::types::{AutomationRule, RuleFiring};
use crate::validator;

/// Registry and evaluator for flat automation rules.
///
/// Evaluation is pure and advisory: the engine returns the actions that
/// should run and their delays; executing, scheduling, and de-duplicating
/// at-least-once deliveries are the caller's responsibility.
#[derive(Clone)]
pub struct RuleEngine {
    rules: Arc<DashMap<Uuid, AutomationRule>>,
    catalog: Arc<dyn Catalog>,
    config: EngineConfig,
    event_sink: Arc<dyn EventSink>,
}

impl std::fmt::Debug for RuleEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuleEngine")
            .field("rules", &self.rules.len())
            .finish()
    }
}

impl RuleEngine {
    pub fn new(catalog: Arc<dyn Catalog>) -> Self {
        Self {
            rules: Arc::new(DashMap::new()),
            catalog,
            config: EngineConfig::default(),
            event_sink: noop_sink(),
        }
    }

    /// Attach an event sink for emitting audit events.
    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.event_sink = sink;
        self
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Stores a rule. An active rule must validate cleanly; storing an
    /// inactive draft with problems is allowed (the editor keeps working).
    pub fn upsert_rule(&self, mut rule: AutomationRule) -> AutomationResult<Uuid> {
        if rule.is_active {
            let errors = validator::validate(&rule, self.catalog.as_ref());
            if !errors.is_empty() {
                return Err(AutomationError::Validation(errors));
            }
        }
        rule.updated_at = Utc::now();
        let id = rule.id;
        info!(rule_id = %id, name = %rule.name, active = rule.is_active, "Storing automation rule");
        self.rules.insert(id, rule);
        Ok(id)
    }

    pub fn get_rule(&self, id: &Uuid) -> Option<AutomationRule> {
        self.rules.get(id).map(|r| r.clone())
    }

    pub fn list_rules(&self) -> Vec<AutomationRule> {
        self.rules.iter().map(|r| r.value().clone()).collect()
    }

    pub fn remove_rule(&self, id: &Uuid) -> AutomationResult<()> {
        self.rules
            .remove(id)
            .ok_or_else(|| AutomationError::NotFound(format!("rule {id}")))?;
        info!(rule_id = %id, "Deleted automation rule");
        Ok(())
    }

    /// Toggles a rule. Activation re-runs validation so a rule edited into
    /// an invalid state can never be switched on.
    pub fn set_active(&self, id: &Uuid, active: bool) -> AutomationResult<()> {
        let mut entry = self
            .rules
            .get_mut(id)
            .ok_or_else(|| AutomationError::NotFound(format!("rule {id}")))?;
        if active {
            let errors = validator::validate(&entry, self.catalog.as_ref());
            if !errors.is_empty() {
                return Err(AutomationError::Validation(errors));
            }
        }
        entry.is_active = active;
        entry.updated_at = Utc::now();
        info!(rule_id = %id, active, "Toggled automation rule");
        Ok(())
    }

    /// Evaluates an inbound event against every active rule on its channel
    /// whose trigger type matches the event kind. Rules are considered in
    /// priority order (descending), ties broken by id ascending so the
    /// outcome is reproducible across runs.
    pub fn evaluate(&self, event: &Event) -> Vec<RuleFiring> {
        let mut candidates: Vec<AutomationRule> = self
            .rules
            .iter()
            .filter(|r| {
                r.is_active && r.channel == event.channel && r.trigger_type == event.kind
            })
            .map(|r| r.value().clone())
            .collect();
        candidates.sort_by(|a, b| b.priority.cmp(&a.priority).then(a.id.cmp(&b.id)));

        let mut firings = Vec::new();
        for rule in &candidates {
            if is_confidence_bearing(&rule.trigger_type) {
                let threshold = rule
                    .confidence_threshold
                    .unwrap_or(self.config.default_confidence_threshold);
                if !matcher::confidence_clears(event.confidence, threshold) {
                    debug!(
                        rule_id = %rule.id,
                        confidence = ?event.confidence,
                        threshold,
                        "Rule skipped: below confidence threshold"
                    );
                    self.event_sink.emit(make_event(
                        DecisionEventType::RuleSkipped,
                        rule.id.to_string(),
                        Some(event.recipient_id.clone()),
                        Some(format!("confidence below threshold {threshold}")),
                    ));
                    continue;
                }
            }

            let outcome = matcher::matches(&rule.trigger_conditions, event);
            if !outcome.matched {
                debug!(
                    rule_id = %rule.id,
                    failed_key = ?outcome.failed_key,
                    "Rule skipped: condition failed"
                );
                self.event_sink.emit(make_event(
                    DecisionEventType::RuleSkipped,
                    rule.id.to_string(),
                    Some(event.recipient_id.clone()),
                    outcome.failed_key,
                ));
                continue;
            }

            info!(
                rule_id = %rule.id,
                name = %rule.name,
                action = %rule.action_type,
                "Rule matched"
            );
            self.event_sink.emit(make_event(
                DecisionEventType::RuleMatched,
                rule.id.to_string(),
                Some(event.recipient_id.clone()),
                Some(rule.action_type.clone()),
            ));
            firings.push(RuleFiring {
                rule_id: rule.id,
                rule_name: rule.name.clone(),
                action_type: rule.action_type.clone(),
                action_config: rule.action_config.clone(),
                run_after: rule.delay,
            });
        }
        firings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use autoflow_core::catalog::StaticCatalog;
    use autoflow_core::event_bus::capture_sink;
    use autoflow_core::types::{Channel, Delay};
    use serde_json::json;

    fn engine() -> RuleEngine {
        RuleEngine::new(Arc::new(StaticCatalog::new()))
    }

    #[test]
    fn test_active_rule_must_validate() {
        let engine = engine();
        let rule = AutomationRule::new("Broken", Channel::Email, "no_such_trigger", "send_email")
            .active();
        assert!(matches!(
            engine.upsert_rule(rule),
            Err(AutomationError::Validation(_))
        ));
    }

    #[test]
    fn test_activation_revalidates() {
        let engine = engine();
        // Draft with an unknown action is storable but cannot be enabled.
        let rule = AutomationRule::new("Draft", Channel::Email, "email_replied", "send_fax");
        let id = engine.upsert_rule(rule).unwrap();
        assert!(engine.set_active(&id, true).is_err());
        assert!(!engine.get_rule(&id).unwrap().is_active);
    }

    #[test]
    fn test_evaluate_matches_channel_and_trigger() {
        let engine = engine();
        let rule = AutomationRule::new(
            "Interested follow-up",
            Channel::Call,
            "disposition_interested",
            "send_email",
        )
        .with_condition("disposition_category", json!("positive"))
        .with_delay(Delay::hours(2))
        .active();
        engine.upsert_rule(rule).unwrap();

        let event = Event::new(Channel::Call, "disposition_interested", "contact-9")
            .with_attribute("disposition_category", json!("positive"));
        let firings = engine.evaluate(&event);
        assert_eq!(firings.len(), 1);
        assert_eq!(firings[0].action_type, "send_email");
        assert_eq!(firings[0].run_after, Delay::hours(2));

        // Same trigger, different channel: no firing.
        let wrong_channel = Event::new(Channel::Sms, "disposition_interested", "contact-9");
        assert!(engine.evaluate(&wrong_channel).is_empty());
    }

    #[test]
    fn test_priority_order_with_id_tiebreak() {
        let engine = engine();
        let mut low = AutomationRule::new("Low", Channel::Email, "email_replied", "add_tag");
        low.priority = 1;
        low.is_active = true;
        let mut high = AutomationRule::new("High", Channel::Email, "email_replied", "send_email");
        high.priority = 5;
        high.is_active = true;
        let mut tie_a = AutomationRule::new("TieA", Channel::Email, "email_replied", "notify_user");
        tie_a.priority = 5;
        tie_a.is_active = true;

        engine.upsert_rule(low).unwrap();
        let high_id = engine.upsert_rule(high).unwrap();
        let tie_id = engine.upsert_rule(tie_a).unwrap();

        let event = Event::new(Channel::Email, "email_replied", "contact-1");
        let firings = engine.evaluate(&event);
        assert_eq!(firings.len(), 3);
        assert_eq!(firings[2].rule_name, "Low");
        // Priority 5 pair ordered by id ascending.
        let expected_first = if high_id < tie_id { "High" } else { "TieA" };
        assert_eq!(firings[0].rule_name, expected_first);
    }

    #[test]
    fn test_confidence_gate_skips_without_error() {
        let engine = engine();
        let rule = AutomationRule::new(
            "Positive sentiment",
            Channel::Email,
            "sentiment_positive",
            "send_email",
        )
        .with_confidence_threshold(80)
        .active();
        engine.upsert_rule(rule).unwrap();

        let below = Event::new(Channel::Email, "sentiment_positive", "c1").with_confidence(72.0);
        assert!(engine.evaluate(&below).is_empty());

        let above = Event::new(Channel::Email, "sentiment_positive", "c1").with_confidence(91.0);
        assert_eq!(engine.evaluate(&above).len(), 1);

        // Missing classifier score fails closed.
        let missing = Event::new(Channel::Email, "sentiment_positive", "c1");
        assert!(engine.evaluate(&missing).is_empty());
    }

    #[test]
    fn test_audit_events_emitted() {
        let sink = capture_sink();
        let engine = engine().with_event_sink(sink.clone());
        let rule = AutomationRule::new("Tagger", Channel::Email, "email_replied", "add_tag")
            .with_condition("reply_keyword", json!("interested"))
            .active();
        engine.upsert_rule(rule).unwrap();

        let hit = Event::new(Channel::Email, "email_replied", "c1")
            .with_attribute("reply", json!("I am interested, call me"));
        engine.evaluate(&hit);
        let miss = Event::new(Channel::Email, "email_replied", "c1")
            .with_attribute("reply", json!("unsubscribe"));
        engine.evaluate(&miss);

        assert_eq!(sink.count_type(DecisionEventType::RuleMatched), 1);
        assert_eq!(sink.count_type(DecisionEventType::RuleSkipped), 1);
    }
}
