//! A/B experiments — deterministic traffic allocation across weighted
//! variants and rate-based winner selection under a minimum-sample gate.

pub mod allocator;
pub mod engine;
pub mod types;
pub mod validator;
pub mod winner;

pub use engine::ExperimentEngine;
pub use types::{
    ExperimentDefinition, ExperimentStatus, Variant, VariantMetrics, WinnerCriteria,
    WinnerDecision,
};
