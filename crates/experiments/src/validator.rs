//! Structural validation for experiment definitions.

use autoflow_core::error::ValidationError;

use crate::types::{ExperimentDefinition, ExperimentStatus};

pub const MIN_VARIANTS: usize = 2;
pub const MAX_VARIANTS: usize = 5;

pub fn validate(experiment: &ExperimentDefinition) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if experiment.name.trim().is_empty() {
        errors.push(ValidationError::new("name", "must not be empty"));
    }

    let count = experiment.variants.len();
    if !(MIN_VARIANTS..=MAX_VARIANTS).contains(&count) {
        errors.push(ValidationError::new(
            "variants",
            format!("expected {MIN_VARIANTS} to {MAX_VARIANTS} variants, got {count}"),
        ));
    }

    let controls = experiment.variants.iter().filter(|v| v.is_control).count();
    if controls != 1 {
        errors.push(ValidationError::new(
            "variants",
            format!("expected exactly one control variant, got {controls}"),
        ));
    }

    if experiment.min_sample_size == 0 {
        errors.push(ValidationError::new(
            "min_sample_size",
            "must be at least 1",
        ));
    }

    if let Some(winner_id) = experiment.winner_variant_id {
        if experiment.variant(&winner_id).is_none() {
            errors.push(ValidationError::new(
                "winner_variant_id",
                "does not reference a variant of this experiment",
            ));
        }
        if experiment.status != ExperimentStatus::WinnerSelected {
            errors.push(ValidationError::new(
                "status",
                "a recorded winner requires status 'winner_selected'",
            ));
        }
    }

    errors
}
