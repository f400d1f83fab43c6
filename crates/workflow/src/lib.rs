//! Branching workflow graphs — typed nodes wired by labeled edges, a
//! structural validator, and the suspend/resume walker contract an external
//! execution engine drives.

pub mod engine;
pub mod types;
pub mod validator;
pub mod walker;

pub use engine::WorkflowEngine;
pub use types::{Edge, LoopBound, Node, NodeKind, WorkflowGraph};
pub use walker::{ResumeCause, WalkCursor, WalkInstruction};
