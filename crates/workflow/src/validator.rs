//! Structural validation for workflow graphs. Runs before a graph may be
//! activated and again on every edit; collects every problem it finds.

use std::collections::{HashMap, HashSet};

use autoflow_core::error::ValidationError;

use crate::types::{LoopBound, NodeKind, WorkflowGraph};

pub fn validate(graph: &WorkflowGraph) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if graph.name.trim().is_empty() {
        errors.push(ValidationError::new("name", "must not be empty"));
    }

    // Exactly one trigger node, and it is the entry.
    let trigger_ids: Vec<&String> = graph
        .nodes
        .iter()
        .filter(|(_, n)| matches!(n.kind, NodeKind::Trigger { .. }))
        .map(|(id, _)| id)
        .collect();
    match trigger_ids.len() {
        0 => errors.push(ValidationError::new("nodes", "graph has no trigger node")),
        1 => {}
        n => errors.push(ValidationError::new(
            "nodes",
            format!("graph has {n} trigger nodes, expected exactly one"),
        )),
    }

    // Edge referential integrity.
    for (i, edge) in graph.edges.iter().enumerate() {
        if !graph.nodes.contains_key(&edge.from) {
            errors.push(ValidationError::new(
                format!("edges[{i}].from"),
                format!("references unknown node '{}'", edge.from),
            ));
        }
        if !graph.nodes.contains_key(&edge.to) {
            errors.push(ValidationError::new(
                format!("edges[{i}].to"),
                format!("references unknown node '{}'", edge.to),
            ));
        }
    }

    let mut incoming: HashMap<&str, usize> = HashMap::new();
    for edge in &graph.edges {
        *incoming.entry(edge.to.as_str()).or_insert(0) += 1;
    }

    for id in &trigger_ids {
        if incoming.get(id.as_str()).copied().unwrap_or(0) > 0 {
            errors.push(ValidationError::new(
                format!("nodes.{id}"),
                "trigger node must have no incoming edges",
            ));
        }
    }

    // Per-node invariants.
    for (id, node) in &graph.nodes {
        let outgoing: Vec<_> = graph.edges_from(id).collect();
        let true_edges = outgoing.iter().filter(|e| e.branch == Some(true)).count();
        let false_edges = outgoing.iter().filter(|e| e.branch == Some(false)).count();
        let unlabeled = outgoing.iter().filter(|e| e.branch.is_none()).count();

        match &node.kind {
            NodeKind::Condition { .. } => {
                if true_edges != 1 || false_edges != 1 || unlabeled != 0 {
                    errors.push(ValidationError::new(
                        format!("nodes.{id}"),
                        "condition node must have exactly one 'true' and one 'false' outgoing edge",
                    ));
                }
            }
            NodeKind::WaitForEvent { timeout_hours, .. } => {
                if *timeout_hours == 0 {
                    errors.push(ValidationError::new(
                        format!("nodes.{id}"),
                        "wait_for_event timeout must be at least one hour",
                    ));
                }
                if true_edges > 1 || false_edges > 1 {
                    errors.push(ValidationError::new(
                        format!("nodes.{id}"),
                        "wait_for_event node may have at most one edge per resumption cause",
                    ));
                }
            }
            NodeKind::Goto { target_node_id } => {
                if !graph.nodes.contains_key(target_node_id) {
                    errors.push(ValidationError::new(
                        format!("nodes.{id}"),
                        format!("goto targets unknown node '{target_node_id}'"),
                    ));
                }
            }
            NodeKind::Loop {
                entry_node_id,
                bound,
            } => {
                if !graph.nodes.contains_key(entry_node_id) {
                    errors.push(ValidationError::new(
                        format!("nodes.{id}"),
                        format!("loop entry references unknown node '{entry_node_id}'"),
                    ));
                }
                if let LoopBound::Count(0) = bound {
                    errors.push(ValidationError::new(
                        format!("nodes.{id}"),
                        "loop count bound must be at least 1",
                    ));
                }
            }
            NodeKind::Trigger { .. } | NodeKind::Action { .. } | NodeKind::Wait { .. } => {
                if true_edges + false_edges > 0 {
                    errors.push(ValidationError::new(
                        format!("nodes.{id}"),
                        "only condition and wait_for_event nodes may have branch-labeled edges",
                    ));
                }
            }
        }
    }

    // Every non-trigger node must be reachable from the entry, counting
    // goto/loop redirects.
    if let Some(entry) = graph.entry_node() {
        let reachable = reachable_from(graph, entry);
        let mut unreachable: Vec<&String> = graph
            .nodes
            .keys()
            .filter(|id| !reachable.contains(id.as_str()))
            .collect();
        unreachable.sort();
        for id in unreachable {
            errors.push(ValidationError::new(
                format!("nodes.{id}"),
                "node is unreachable from the trigger",
            ));
        }
    }

    // Cycles are only legal through goto/loop redirects. Any cycle in the
    // explicit edge list not originating at one of those nodes is an error.
    if has_implicit_cycle(graph) {
        errors.push(ValidationError::new(
            "edges",
            "graph contains a cycle not mediated by a goto or loop node",
        ));
    }

    errors
}

fn reachable_from<'a>(graph: &'a WorkflowGraph, entry: &'a str) -> HashSet<&'a str> {
    let mut seen: HashSet<&str> = HashSet::new();
    let mut stack = vec![entry];
    while let Some(id) = stack.pop() {
        if !seen.insert(id) {
            continue;
        }
        for edge in graph.edges_from(id) {
            stack.push(edge.to.as_str());
        }
        match graph.nodes.get(id).map(|n| &n.kind) {
            Some(NodeKind::Goto { target_node_id }) => {
                if graph.nodes.contains_key(target_node_id) {
                    stack.push(target_node_id.as_str());
                }
            }
            Some(NodeKind::Loop { entry_node_id, .. }) => {
                if graph.nodes.contains_key(entry_node_id) {
                    stack.push(entry_node_id.as_str());
                }
            }
            _ => {}
        }
    }
    seen
}

/// DFS cycle detection over the explicit edges, skipping edges whose source
/// is a goto or loop node (their redirects are the sanctioned cycles).
fn has_implicit_cycle(graph: &WorkflowGraph) -> bool {
    #[derive(Clone, Copy, PartialEq)]
    enum Mark {
        InProgress,
        Finished,
    }

    fn visit(graph: &WorkflowGraph, id: &str, marks: &mut HashMap<String, Mark>) -> bool {
        match marks.get(id) {
            Some(Mark::InProgress) => return true,
            Some(Mark::Finished) => return false,
            None => {}
        }
        if matches!(
            graph.nodes.get(id).map(|n| &n.kind),
            Some(NodeKind::Goto { .. }) | Some(NodeKind::Loop { .. })
        ) {
            // Redirect nodes break the chain; their outgoing edges are the
            // loop fall-through, which cannot close an implicit cycle on
            // its own without re-entering a non-redirect path.
            marks.insert(id.to_string(), Mark::Finished);
            return false;
        }
        marks.insert(id.to_string(), Mark::InProgress);
        for edge in graph.edges_from(id) {
            if graph.nodes.contains_key(&edge.to) && visit(graph, &edge.to, marks) {
                return true;
            }
        }
        marks.insert(id.to_string(), Mark::Finished);
        false
    }

    let mut marks = HashMap::new();
    let mut ids: Vec<&String> = graph.nodes.keys().collect();
    ids.sort();
    ids.iter().any(|id| visit(graph, id.as_str(), &mut marks))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Node, NodeKind, WorkflowGraph};
    use autoflow_core::types::Delay;
    use autoflow_rules::matcher::{Predicate, PredicateOperator};
    use serde_json::json;

    fn trigger() -> Node {
        Node::new("Start", NodeKind::Trigger { trigger_type: "form_submitted".into() })
    }

    fn action(label: &str) -> Node {
        Node::new(
            label,
            NodeKind::Action {
                action_type: "send_email".into(),
                action_config: json!({}),
            },
        )
    }

    fn condition() -> Node {
        Node::new(
            "Branch",
            NodeKind::Condition {
                predicate: Predicate::new("sentiment", PredicateOperator::Equals, json!("positive")),
            },
        )
    }

    #[test]
    fn test_valid_linear_graph() {
        let graph = WorkflowGraph::new("welcome")
            .with_node("start", trigger())
            .with_node("email", action("Send"))
            .with_edge("start", "email");
        assert!(validate(&graph).is_empty());
    }

    #[test]
    fn test_missing_trigger_rejected() {
        let graph = WorkflowGraph::new("no entry").with_node("email", action("Send"));
        let errors = validate(&graph);
        assert!(errors.iter().any(|e| e.message.contains("no trigger")));
    }

    #[test]
    fn test_two_triggers_rejected() {
        let graph = WorkflowGraph::new("two entries")
            .with_node("a", trigger())
            .with_node("b", trigger());
        let errors = validate(&graph);
        assert!(errors.iter().any(|e| e.message.contains("expected exactly one")));
    }

    #[test]
    fn test_trigger_with_incoming_edge_rejected() {
        let graph = WorkflowGraph::new("loopback")
            .with_node("start", trigger())
            .with_node("email", action("Send"))
            .with_edge("start", "email")
            .with_edge("email", "start");
        let errors = validate(&graph);
        assert!(errors
            .iter()
            .any(|e| e.message.contains("no incoming edges")));
    }

    #[test]
    fn test_edge_referential_integrity() {
        let graph = WorkflowGraph::new("dangling")
            .with_node("start", trigger())
            .with_edge("start", "ghost");
        let errors = validate(&graph);
        assert!(errors.iter().any(|e| e.field == "edges[0].to"));
    }

    #[test]
    fn test_condition_needs_both_branches() {
        let graph = WorkflowGraph::new("half branch")
            .with_node("start", trigger())
            .with_node("check", condition())
            .with_node("yes", action("Yes"))
            .with_edge("start", "check")
            .with_branch_edge("check", "yes", true);
        let errors = validate(&graph);
        assert!(errors
            .iter()
            .any(|e| e.message.contains("'true' and one 'false'")));
    }

    #[test]
    fn test_goto_target_must_exist() {
        let graph = WorkflowGraph::new("bad goto")
            .with_node("start", trigger())
            .with_node(
                "jump",
                Node::new("Jump", NodeKind::Goto { target_node_id: "nowhere".into() }),
            )
            .with_edge("start", "jump");
        let errors = validate(&graph);
        assert!(errors
            .iter()
            .any(|e| e.message.contains("targets unknown node")));
    }

    #[test]
    fn test_zero_count_loop_rejected() {
        let graph = WorkflowGraph::new("dead loop")
            .with_node("start", trigger())
            .with_node("email", action("Send"))
            .with_node(
                "again",
                Node::new(
                    "Repeat",
                    NodeKind::Loop {
                        entry_node_id: "email".into(),
                        bound: LoopBound::Count(0),
                    },
                ),
            )
            .with_edge("start", "email")
            .with_edge("email", "again");
        let errors = validate(&graph);
        assert!(errors.iter().any(|e| e.message.contains("at least 1")));
    }

    #[test]
    fn test_implicit_cycle_rejected() {
        let graph = WorkflowGraph::new("implicit cycle")
            .with_node("start", trigger())
            .with_node("a", action("A"))
            .with_node("b", action("B"))
            .with_edge("start", "a")
            .with_edge("a", "b")
            .with_edge("b", "a");
        let errors = validate(&graph);
        assert!(errors
            .iter()
            .any(|e| e.message.contains("not mediated by a goto or loop")));
    }

    #[test]
    fn test_goto_cycle_is_legal() {
        let graph = WorkflowGraph::new("goto cycle")
            .with_node("start", trigger())
            .with_node("a", action("A"))
            .with_node(
                "jump",
                Node::new("Back to A", NodeKind::Goto { target_node_id: "a".into() }),
            )
            .with_edge("start", "a")
            .with_edge("a", "jump");
        assert!(validate(&graph).is_empty());
    }

    #[test]
    fn test_unreachable_node_rejected() {
        let graph = WorkflowGraph::new("island")
            .with_node("start", trigger())
            .with_node("email", action("Send"))
            .with_node("orphan", action("Orphan"))
            .with_edge("start", "email");
        let errors = validate(&graph);
        assert!(errors.iter().any(|e| e.field == "nodes.orphan"));
    }

    #[test]
    fn test_wait_duration_and_timeout_checks() {
        let graph = WorkflowGraph::new("waits")
            .with_node("start", trigger())
            .with_node("pause", Node::new("Pause", NodeKind::Wait { duration: Delay::hours(1) }))
            .with_node(
                "listen",
                Node::new(
                    "Listen",
                    NodeKind::WaitForEvent {
                        event_type: "email_reply".into(),
                        timeout_hours: 0,
                    },
                ),
            )
            .with_edge("start", "pause")
            .with_edge("pause", "listen");
        let errors = validate(&graph);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("timeout"));
    }
}
