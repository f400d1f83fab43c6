use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use autoflow_core::types::{Channel, Delay};

/// A flat automation rule: when an event of `trigger_type` arrives on
/// `channel` and every condition holds, request `action_type` after `delay`.
///
/// Rules are edited by operators and read by the matcher; matching never
/// mutates them. Condition keys are unique: writing a key again replaces
/// the earlier value, it does not create an OR.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutomationRule {
    pub id: Uuid,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub channel: Channel,
    pub trigger_type: String,
    #[serde(default)]
    pub trigger_conditions: HashMap<String, serde_json::Value>,
    pub action_type: String,
    /// Opaque payload forwarded to the action executor.
    #[serde(default)]
    pub action_config: serde_json::Value,
    #[serde(default)]
    pub delay: Delay,
    /// Minimum classifier confidence (0-100). Meaningful only for
    /// sentiment/intent/semantic trigger types.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence_threshold: Option<u8>,
    /// Higher priority rules are evaluated first.
    #[serde(default)]
    pub priority: i32,
    #[serde(default)]
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AutomationRule {
    pub fn new(
        name: impl Into<String>,
        channel: Channel,
        trigger_type: impl Into<String>,
        action_type: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            description: None,
            channel,
            trigger_type: trigger_type.into(),
            trigger_conditions: HashMap::new(),
            action_type: action_type.into(),
            action_config: serde_json::json!({}),
            delay: Delay::immediate(),
            confidence_threshold: None,
            priority: 0,
            is_active: false,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_condition(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.trigger_conditions.insert(key.into(), value);
        self
    }

    pub fn with_delay(mut self, delay: Delay) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_confidence_threshold(mut self, threshold: u8) -> Self {
        self.confidence_threshold = Some(threshold);
        self
    }

    pub fn active(mut self) -> Self {
        self.is_active = true;
        self
    }
}

/// Advisory record returned when a rule matched an event: the action the
/// external executor should run and how long to defer it. The core never
/// executes nor schedules anything itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleFiring {
    pub rule_id: Uuid,
    pub rule_name: String,
    pub action_type: String,
    pub action_config: serde_json::Value,
    pub run_after: Delay,
}
