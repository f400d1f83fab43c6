//! Audit event sink — trait for emitting decision audit events from any
//! engine. Routing (log pipeline, webhooks, analytics) is an external
//! concern; the core only describes what happened.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

/// What a decision engine just did, for audit trails and debugging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionEventType {
    RuleMatched,
    RuleSkipped,
    WalkStarted,
    WalkSuspended,
    WalkCompleted,
    ActionRequested,
    VariantAssigned,
    WinnerSelected,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionEvent {
    pub event_id: Uuid,
    pub event_type: DecisionEventType,
    /// Id of the rule, graph, or experiment the decision concerns.
    pub subject_id: String,
    pub recipient_id: Option<String>,
    pub detail: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// Trait for emitting decision audit events.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: DecisionEvent);
}

/// No-op sink for tests and engines that don't need auditing.
pub struct NoOpSink;

impl EventSink for NoOpSink {
    fn emit(&self, _event: DecisionEvent) {}
}

/// In-memory sink that captures events for testing.
#[derive(Default)]
pub struct CaptureSink {
    events: Mutex<Vec<DecisionEvent>>,
}

impl CaptureSink {
    pub fn new() -> Self {
        Self {
            events: Mutex::new(Vec::new()),
        }
    }

    pub fn events(&self) -> Vec<DecisionEvent> {
        self.events.lock().expect("event bus mutex poisoned").clone()
    }

    pub fn count(&self) -> usize {
        self.events.lock().expect("event bus mutex poisoned").len()
    }

    pub fn count_type(&self, event_type: DecisionEventType) -> usize {
        self.events
            .lock()
            .expect("event bus mutex poisoned")
            .iter()
            .filter(|e| e.event_type == event_type)
            .count()
    }

    pub fn clear(&self) {
        self.events.lock().expect("event bus mutex poisoned").clear();
    }
}

impl EventSink for CaptureSink {
    fn emit(&self, event: DecisionEvent) {
        self.events.lock().expect("event bus mutex poisoned").push(event);
    }
}

/// Convenience builder for creating `DecisionEvent` with minimal boilerplate.
pub fn make_event(
    event_type: DecisionEventType,
    subject_id: impl Into<String>,
    recipient_id: Option<String>,
    detail: Option<String>,
) -> DecisionEvent {
    DecisionEvent {
        event_id: Uuid::new_v4(),
        event_type,
        subject_id: subject_id.into(),
        recipient_id,
        detail,
        timestamp: Utc::now(),
    }
}

/// Convenience: create a no-op event sink for engines that don't need one.
pub fn noop_sink() -> Arc<dyn EventSink> {
    Arc::new(NoOpSink)
}

/// Convenience: create a capture sink for tests.
pub fn capture_sink() -> Arc<CaptureSink> {
    Arc::new(CaptureSink::new())
}
