//! Step-by-step traversal contract. The walker never sleeps, executes, or
//! retains graph-global state: every boundary crossing is an advisory
//! instruction returned to the external engine, and each traversal is an
//! independent cursor over the same immutable graph.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::warn;

use autoflow_core::config::EngineConfig;
use autoflow_core::types::{Delay, Event};

use crate::types::{LoopBound, NodeKind, WorkflowGraph};

/// What the engine must do before the walk can continue.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum WalkInstruction {
    /// Call the external action executor, then resume with
    /// `ResumeCause::ActionCompleted`.
    Execute {
        action_type: String,
        action_config: serde_json::Value,
    },
    /// Persist the walk and resume after the given delay.
    Suspend { resume_after: Delay },
    /// Persist the walk and resume when a matching event arrives
    /// (`EventReceived`) or the timeout elapses (`TimedOut`).
    SuspendUntilEvent {
        event_type: String,
        timeout_hours: u32,
    },
    /// The path has terminated.
    Done,
}

/// Why the engine is resuming a suspended walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResumeCause {
    ActionCompleted,
    TimerElapsed,
    EventReceived,
    TimedOut,
}

/// An independent traversal of one recipient/event through a graph.
///
/// The cursor parks on boundary nodes (action, wait, wait_for_event) while
/// the engine acts; `resume` moves past them. Pass-through nodes (trigger,
/// condition, goto, loop) are consumed internally.
#[derive(Clone)]
pub struct WalkCursor {
    graph: Arc<WorkflowGraph>,
    current: Option<String>,
    loop_counts: HashMap<String, u32>,
    steps_taken: usize,
    started: bool,
    config: EngineConfig,
}

impl WalkCursor {
    pub fn new(graph: Arc<WorkflowGraph>, config: EngineConfig) -> Self {
        let current = graph.entry_node().map(str::to_string);
        Self {
            graph,
            current,
            loop_counts: HashMap::new(),
            steps_taken: 0,
            started: false,
            config,
        }
    }

    /// The node the cursor is parked on, if the walk is still live.
    pub fn current_node(&self) -> Option<&str> {
        self.current.as_deref()
    }

    /// Begins the walk at the entry node and advances to the first boundary.
    pub fn start(&mut self, event: &Event) -> WalkInstruction {
        if self.started {
            warn!("Walk already started; ignoring");
            return WalkInstruction::Done;
        }
        self.started = true;
        self.advance(event)
    }

    /// Continues a walk the engine previously parked on a boundary node.
    pub fn resume(&mut self, cause: ResumeCause, event: &Event) -> WalkInstruction {
        let Some(current) = self.current.clone() else {
            return WalkInstruction::Done;
        };
        let Some(node) = self.graph.nodes.get(&current) else {
            return self.finish();
        };

        match (&node.kind, cause) {
            (NodeKind::Action { .. }, ResumeCause::ActionCompleted)
            | (NodeKind::Wait { .. }, ResumeCause::TimerElapsed) => {
                self.current = self.first_unlabeled_edge(&current);
                self.advance(event)
            }
            (NodeKind::WaitForEvent { .. }, ResumeCause::EventReceived) => {
                // Event arrived: follow the `true`-labeled edge, or the sole
                // unlabeled edge when the node isn't branched.
                self.current = self
                    .branch_edge(&current, true)
                    .or_else(|| self.first_unlabeled_edge(&current));
                self.advance(event)
            }
            (NodeKind::WaitForEvent { .. }, ResumeCause::TimedOut) => {
                // Timed out: only an explicit `false` edge continues the path.
                self.current = self.branch_edge(&current, false);
                self.advance(event)
            }
            (_, cause) => {
                warn!(node = %current, ?cause, "Resume cause does not match suspended node");
                self.finish()
            }
        }
    }

    fn advance(&mut self, event: &Event) -> WalkInstruction {
        loop {
            let Some(current) = self.current.clone() else {
                return self.finish();
            };

            self.steps_taken += 1;
            if self.steps_taken > self.config.max_walk_steps {
                warn!(
                    graph_id = %self.graph.id,
                    node = %current,
                    "Walk exceeded step ceiling; terminating path"
                );
                return self.finish();
            }

            let Some(node) = self.graph.nodes.get(&current) else {
                // Dangling reference; validation rejects this, stale data
                // fails closed.
                return self.finish();
            };

            match &node.kind {
                NodeKind::Trigger { .. } => {
                    self.current = self.first_unlabeled_edge(&current);
                }
                NodeKind::Condition { predicate } => {
                    let branch = predicate.evaluate(event);
                    self.current = self.branch_edge(&current, branch);
                }
                NodeKind::Goto { target_node_id } => {
                    self.current = Some(target_node_id.clone());
                }
                NodeKind::Loop {
                    entry_node_id,
                    bound,
                } => {
                    let count = self.loop_counts.entry(current.clone()).or_insert(0);
                    let iterate = match bound {
                        LoopBound::Count(n) => *count < *n,
                        LoopBound::Until(predicate) => {
                            !predicate.evaluate(event) && *count < self.config.max_loop_iterations
                        }
                    };
                    if iterate {
                        *count += 1;
                        self.current = Some(entry_node_id.clone());
                    } else {
                        self.current = self.first_unlabeled_edge(&current);
                    }
                }
                NodeKind::Action {
                    action_type,
                    action_config,
                } => {
                    return WalkInstruction::Execute {
                        action_type: action_type.clone(),
                        action_config: action_config.clone(),
                    };
                }
                NodeKind::Wait { duration } => {
                    return WalkInstruction::Suspend {
                        resume_after: *duration,
                    };
                }
                NodeKind::WaitForEvent {
                    event_type,
                    timeout_hours,
                } => {
                    return WalkInstruction::SuspendUntilEvent {
                        event_type: event_type.clone(),
                        timeout_hours: *timeout_hours,
                    };
                }
            }
        }
    }

    fn finish(&mut self) -> WalkInstruction {
        self.current = None;
        WalkInstruction::Done
    }

    fn first_unlabeled_edge(&self, from: &str) -> Option<String> {
        self.graph
            .edges_from(from)
            .find(|e| e.branch.is_none())
            .map(|e| e.to.clone())
    }

    fn branch_edge(&self, from: &str, branch: bool) -> Option<String> {
        self.graph
            .edges_from(from)
            .find(|e| e.branch == Some(branch))
            .map(|e| e.to.clone())
    }
}
