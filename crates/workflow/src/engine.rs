use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use tracing::info;
use uuid::Uuid;

use autoflow_core::config::EngineConfig;
use autoflow_core::error::{AutomationError, AutomationResult};
use autoflow_core::event_bus::{make_event, noop_sink, DecisionEventType, EventSink};
use autoflow_core::types::Event;

use crate::types::WorkflowGraph;
use crate::validator;
use crate::walker::{WalkCursor, WalkInstruction};

/// Registry for workflow graphs. Holds immutable snapshots; every edit
/// stores a fresh copy and re-runs validation before the graph can stay (or
/// become) active.
#[derive(Clone)]
pub struct WorkflowEngine {
    graphs: Arc<DashMap<Uuid, Arc<WorkflowGraph>>>,
    config: EngineConfig,
    event_sink: Arc<dyn EventSink>,
}

impl std::fmt::Debug for WorkflowEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkflowEngine")
            .field("graphs", &self.graphs.len())
            .finish()
    }
}

impl WorkflowEngine {
    pub fn new() -> Self {
        Self {
            graphs: Arc::new(DashMap::new()),
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

    /// Stores a graph. Drafts may be structurally broken while an operator
    /// edits them; an active graph must validate cleanly.
    pub fn upsert_graph(&self, mut graph: WorkflowGraph) -> AutomationResult<Uuid> {
        if graph.is_active {
            let errors = validator::validate(&graph);
            if !errors.is_empty() {
                return Err(AutomationError::Validation(errors));
            }
        }
        graph.updated_at = Utc::now();
        let id = graph.id;
        info!(graph_id = %id, name = %graph.name, nodes = graph.nodes.len(), "Storing workflow graph");
        self.graphs.insert(id, Arc::new(graph));
        Ok(id)
    }

    pub fn get_graph(&self, id: &Uuid) -> Option<Arc<WorkflowGraph>> {
        self.graphs.get(id).map(|g| g.clone())
    }

    pub fn list_graphs(&self) -> Vec<Arc<WorkflowGraph>> {
        self.graphs.iter().map(|g| g.value().clone()).collect()
    }

    pub fn remove_graph(&self, id: &Uuid) -> AutomationResult<()> {
        self.graphs
            .remove(id)
            .ok_or_else(|| AutomationError::NotFound(format!("workflow graph {id}")))?;
        info!(graph_id = %id, "Deleted workflow graph");
        Ok(())
    }

    /// Activates or deactivates a graph; activation re-runs validation.
    pub fn set_active(&self, id: &Uuid, active: bool) -> AutomationResult<()> {
        let entry = self
            .graphs
            .get(id)
            .map(|g| g.clone())
            .ok_or_else(|| AutomationError::NotFound(format!("workflow graph {id}")))?;
        if active {
            let errors = validator::validate(&entry);
            if !errors.is_empty() {
                return Err(AutomationError::Validation(errors));
            }
        }
        let mut updated = (*entry).clone();
        updated.is_active = active;
        updated.updated_at = Utc::now();
        info!(graph_id = %id, active, "Toggled workflow graph");
        self.graphs.insert(*id, Arc::new(updated));
        Ok(())
    }

    /// Starts an independent traversal of the graph for one event. Works on
    /// inactive graphs too (the editor's test-run path); gating entry on
    /// activation is the caller's concern.
    pub fn begin_walk(
        &self,
        graph_id: &Uuid,
        event: &Event,
    ) -> AutomationResult<(WalkCursor, WalkInstruction)> {
        let graph = self
            .graphs
            .get(graph_id)
            .map(|g| g.clone())
            .ok_or_else(|| AutomationError::NotFound(format!("workflow graph {graph_id}")))?;

        let mut cursor = WalkCursor::new(graph, self.config.clone());
        let instruction = cursor.start(event);

        self.event_sink.emit(make_event(
            DecisionEventType::WalkStarted,
            graph_id.to_string(),
            Some(event.recipient_id.clone()),
            None,
        ));
        let audit = match &instruction {
            WalkInstruction::Execute { action_type, .. } => Some((
                DecisionEventType::ActionRequested,
                Some(action_type.clone()),
            )),
            WalkInstruction::Suspend { .. } | WalkInstruction::SuspendUntilEvent { .. } => {
                Some((DecisionEventType::WalkSuspended, None))
            }
            WalkInstruction::Done => Some((DecisionEventType::WalkCompleted, None)),
        };
        if let Some((event_type, detail)) = audit {
            self.event_sink.emit(make_event(
                event_type,
                graph_id.to_string(),
                Some(event.recipient_id.clone()),
                detail,
            ));
        }

        Ok((cursor, instruction))
    }
}

impl Default for WorkflowEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Node, NodeKind};
    use autoflow_core::event_bus::capture_sink;
    use autoflow_core::types::Channel;
    use serde_json::json;

    fn simple_graph() -> WorkflowGraph {
        WorkflowGraph::new("welcome")
            .with_node(
                "start",
                Node::new("Start", NodeKind::Trigger { trigger_type: "form_submitted".into() }),
            )
            .with_node(
                "email",
                Node::new(
                    "Send",
                    NodeKind::Action {
                        action_type: "send_email".into(),
                        action_config: json!({"template": "welcome"}),
                    },
                ),
            )
            .with_edge("start", "email")
    }

    #[test]
    fn test_active_graph_must_validate() {
        let engine = WorkflowEngine::new();
        let mut broken = WorkflowGraph::new("broken").with_node(
            "orphan",
            Node::new(
                "Orphan",
                NodeKind::Action {
                    action_type: "send_email".into(),
                    action_config: json!({}),
                },
            ),
        );
        broken.is_active = true;
        assert!(matches!(
            engine.upsert_graph(broken),
            Err(AutomationError::Validation(_))
        ));
    }

    #[test]
    fn test_activation_revalidates() {
        let engine = WorkflowEngine::new();
        // A draft missing its trigger can be stored but not activated.
        let draft = WorkflowGraph::new("draft").with_node(
            "email",
            Node::new(
                "Send",
                NodeKind::Action {
                    action_type: "send_email".into(),
                    action_config: json!({}),
                },
            ),
        );
        let id = engine.upsert_graph(draft).unwrap();
        assert!(engine.set_active(&id, true).is_err());

        let id2 = engine.upsert_graph(simple_graph()).unwrap();
        assert!(engine.set_active(&id2, true).is_ok());
        assert!(engine.get_graph(&id2).unwrap().is_active);
    }

    #[test]
    fn test_begin_walk_emits_audit_events() {
        let sink = capture_sink();
        let engine = WorkflowEngine::new().with_event_sink(sink.clone());
        let id = engine.upsert_graph(simple_graph()).unwrap();

        let event = Event::new(Channel::Form, "form_submitted", "contact-1");
        let (_cursor, instruction) = engine.begin_walk(&id, &event).unwrap();
        assert!(matches!(instruction, WalkInstruction::Execute { .. }));
        assert_eq!(sink.count_type(DecisionEventType::WalkStarted), 1);
        assert_eq!(sink.count_type(DecisionEventType::ActionRequested), 1);
    }

    #[test]
    fn test_begin_walk_unknown_graph() {
        let engine = WorkflowEngine::new();
        let event = Event::new(Channel::Form, "form_submitted", "contact-1");
        assert!(matches!(
            engine.begin_walk(&Uuid::new_v4(), &event),
            Err(AutomationError::NotFound(_))
        ));
    }
}
