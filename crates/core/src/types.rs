use std::collections::HashMap;

use chrono::Duration;
use serde::{Deserialize, Serialize};

/// Delivery channel an event originated from or a rule listens on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Email,
    Sms,
    Call,
    Form,
    Whatsapp,
    Messenger,
    Linkedin,
}

impl Channel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Email => "email",
            Channel::Sms => "sms",
            Channel::Call => "call",
            Channel::Form => "form",
            Channel::Whatsapp => "whatsapp",
            Channel::Messenger => "messenger",
            Channel::Linkedin => "linkedin",
        }
    }
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A typed fact emitted by an external collaborator (dialer, email provider,
/// form backend). Read-only to the decision core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub channel: Channel,
    /// Event kind, e.g. `disposition_set`, `reply_received`, `sentiment_scored`.
    pub kind: String,
    pub recipient_id: String,
    /// Named scalar attributes (strings, numbers, booleans).
    #[serde(default)]
    pub attributes: HashMap<String, serde_json::Value>,
    /// Classifier confidence in [0, 100], present for analyzed events.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
}

impl Event {
    pub fn new(channel: Channel, kind: impl Into<String>, recipient_id: impl Into<String>) -> Self {
        Self {
            channel,
            kind: kind.into(),
            recipient_id: recipient_id.into(),
            attributes: HashMap::new(),
            confidence: None,
        }
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.attributes.insert(key.into(), value);
        self
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = Some(confidence);
        self
    }

    pub fn attribute(&self, key: &str) -> Option<&serde_json::Value> {
        self.attributes.get(key)
    }
}

/// Unit for a rule's execution delay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DelayUnit {
    Minutes,
    Hours,
    Days,
}

/// How long an action should be deferred after its rule fires. The core only
/// describes the delay; the scheduler that honors it is external.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Delay {
    pub amount: u32,
    pub unit: DelayUnit,
}

impl Delay {
    pub fn immediate() -> Self {
        Self {
            amount: 0,
            unit: DelayUnit::Minutes,
        }
    }

    pub fn minutes(amount: u32) -> Self {
        Self {
            amount,
            unit: DelayUnit::Minutes,
        }
    }

    pub fn hours(amount: u32) -> Self {
        Self {
            amount,
            unit: DelayUnit::Hours,
        }
    }

    pub fn days(amount: u32) -> Self {
        Self {
            amount,
            unit: DelayUnit::Days,
        }
    }

    pub fn is_immediate(&self) -> bool {
        self.amount == 0
    }

    pub fn to_duration(&self) -> Duration {
        match self.unit {
            DelayUnit::Minutes => Duration::minutes(i64::from(self.amount)),
            DelayUnit::Hours => Duration::hours(i64::from(self.amount)),
            DelayUnit::Days => Duration::days(i64::from(self.amount)),
        }
    }
}

impl Default for Delay {
    fn default() -> Self {
        Self::immediate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delay_conversion() {
        assert_eq!(Delay::minutes(30).to_duration(), Duration::minutes(30));
        assert_eq!(Delay::hours(2).to_duration(), Duration::hours(2));
        assert_eq!(Delay::days(1).to_duration(), Duration::days(1));
        assert!(Delay::immediate().is_immediate());
    }

    #[test]
    fn test_event_roundtrip() {
        let event = Event::new(Channel::Call, "disposition_set", "contact-42")
            .with_attribute("disposition_category", serde_json::json!("positive"))
            .with_confidence(82.5);

        let json = serde_json::to_string(&event).unwrap();
        let back: Event = serde_json::from_str(&json).unwrap();
        assert_eq!(back.channel, Channel::Call);
        assert_eq!(back.recipient_id, "contact-42");
        assert_eq!(
            back.attribute("disposition_category"),
            Some(&serde_json::json!("positive"))
        );
        assert_eq!(back.confidence, Some(82.5));
    }

    #[test]
    fn test_channel_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Channel::Whatsapp).unwrap(), "\"whatsapp\"");
    }
}
