use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use autoflow_core::types::Delay;
use autoflow_rules::matcher::Predicate;

/// A branching automation: nodes keyed by id, edges in insertion order.
/// The walker treats the graph as immutable; editing happens upstream and
/// must re-run validation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowGraph {
    pub id: Uuid,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub nodes: HashMap<String, Node>,
    pub edges: Vec<Edge>,
    #[serde(default)]
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl WorkflowGraph {
    pub fn new(name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            description: None,
            nodes: HashMap::new(),
            edges: Vec::new(),
            is_active: false,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_node(mut self, id: impl Into<String>, node: Node) -> Self {
        self.nodes.insert(id.into(), node);
        self
    }

    pub fn with_edge(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.edges.push(Edge {
            from: from.into(),
            to: to.into(),
            branch: None,
        });
        self
    }

    pub fn with_branch_edge(
        mut self,
        from: impl Into<String>,
        to: impl Into<String>,
        branch: bool,
    ) -> Self {
        self.edges.push(Edge {
            from: from.into(),
            to: to.into(),
            branch: Some(branch),
        });
        self
    }

    /// Outgoing edges of a node, in insertion order.
    pub fn edges_from<'a>(&'a self, node_id: &'a str) -> impl Iterator<Item = &'a Edge> {
        self.edges.iter().filter(move |e| e.from == node_id)
    }

    /// The id of the single trigger node, when the graph has exactly one.
    pub fn entry_node(&self) -> Option<&str> {
        let mut triggers = self
            .nodes
            .iter()
            .filter(|(_, n)| matches!(n.kind, NodeKind::Trigger { .. }));
        let first = triggers.next()?;
        if triggers.next().is_some() {
            return None;
        }
        Some(first.0.as_str())
    }
}

/// A directed edge. `branch` disambiguates the outgoing edges of a
/// branching node (`true`/`false`); linear nodes leave it unset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    pub from: String,
    pub to: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<bool>,
}

/// A workflow step. `label`/`description` are presentation-only and never
/// evaluated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(flatten)]
    pub kind: NodeKind,
}

impl Node {
    pub fn new(label: impl Into<String>, kind: NodeKind) -> Self {
        Self {
            label: label.into(),
            description: None,
            kind,
        }
    }
}

/// Closed sum of node kinds with per-kind configuration, so the walker can
/// match exhaustively and a new kind is a compile error until handled.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", content = "config", rename_all = "snake_case")]
pub enum NodeKind {
    Trigger {
        trigger_type: String,
    },
    Action {
        action_type: String,
        #[serde(default)]
        action_config: serde_json::Value,
    },
    /// Branches on a single predicate. The builder also calls this
    /// `if_else`; both spellings deserialize.
    #[serde(alias = "if_else")]
    Condition { predicate: Predicate },
    /// Timed pause. The builder's `delay` nodes are the same thing.
    #[serde(alias = "delay")]
    Wait { duration: Delay },
    WaitForEvent {
        event_type: String,
        timeout_hours: u32,
    },
    /// Redirects the cursor to `target_node_id` with no side effect. The
    /// only sanctioned way (with `loop`) to form a cycle.
    Goto { target_node_id: String },
    Loop {
        entry_node_id: String,
        bound: LoopBound,
    },
}

/// Iteration bound for a loop node. Either an explicit count or an exit
/// predicate; exit-predicate loops are additionally capped by
/// `EngineConfig::max_loop_iterations`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoopBound {
    Count(u32),
    Until(Predicate),
}
