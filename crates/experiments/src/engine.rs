use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use tracing::info;
use uuid::Uuid;

use autoflow_core::config::ExperimentsConfig;
use autoflow_core::error::{AutomationError, AutomationResult, ValidationError};
use autoflow_core::event_bus::{make_event, noop_sink, DecisionEventType, EventSink};

use crate::allocator;
use crate::types::{
    ExperimentDefinition, ExperimentStatus, Variant, VariantMetrics, WinnerDecision,
};
use crate::validator;
use crate::winner;

/// Allowed status transitions. `WinnerSelected` is terminal; `Completed`
/// may only advance to `WinnerSelected`.
fn can_transition(from: ExperimentStatus, to: ExperimentStatus) -> bool {
    use ExperimentStatus::*;
    matches!(
        (from, to),
        (Draft, Running)
            | (Running, Paused)
            | (Paused, Running)
            | (Running, Completed)
            | (Paused, Completed)
            | (Running, WinnerSelected)
            | (Paused, WinnerSelected)
            | (Completed, WinnerSelected)
    )
}

/// Registry and lifecycle manager for experiments. Holds the latest
/// outcome counters reported by the recording collaborator and applies
/// automatic winner selection when an experiment opts in.
///
/// Winner selection mutates through the registry's per-entry lock, so the
/// automatic path and a concurrent manual call cannot both transition the
/// same experiment.
#[derive(Clone)]
pub struct ExperimentEngine {
    experiments: Arc<DashMap<Uuid, ExperimentDefinition>>,
    metrics: Arc<DashMap<Uuid, HashMap<Uuid, VariantMetrics>>>,
    config: ExperimentsConfig,
    event_sink: Arc<dyn EventSink>,
}

impl std::fmt::Debug for ExperimentEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExperimentEngine")
            .field("experiments", &self.experiments.len())
            .finish()
    }
}

impl ExperimentEngine {
    pub fn new() -> Self {
        Self {
            experiments: Arc::new(DashMap::new()),
            metrics: Arc::new(DashMap::new()),
            config: ExperimentsConfig::default(),
            event_sink: noop_sink(),
        }
    }

    /// Attach an event sink for emitting audit events.
    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.event_sink = sink;
        self
    }

    pub fn with_config(mut self, config: ExperimentsConfig) -> Self {
        self.config = config;
        self
    }

    /// Validates, normalizes traffic shares, and stores the experiment.
    pub fn create_experiment(&self, mut experiment: ExperimentDefinition) -> AutomationResult<Uuid> {
        let errors = validator::validate(&experiment);
        if !errors.is_empty() {
            return Err(AutomationError::Validation(errors));
        }
        allocator::normalize(&mut experiment.variants);
        experiment.updated_at = Utc::now();
        let id = experiment.id;
        info!(experiment_id = %id, name = %experiment.name, "Creating experiment");
        self.experiments.insert(id, experiment);
        Ok(id)
    }

    pub fn get_experiment(&self, id: &Uuid) -> Option<ExperimentDefinition> {
        self.experiments.get(id).map(|e| e.clone())
    }

    pub fn list_experiments(&self) -> Vec<ExperimentDefinition> {
        self.experiments.iter().map(|e| e.value().clone()).collect()
    }

    pub fn remove_experiment(&self, id: &Uuid) -> AutomationResult<()> {
        self.experiments
            .remove(id)
            .ok_or_else(|| AutomationError::NotFound(format!("experiment {id}")))?;
        self.metrics.remove(id);
        Ok(())
    }

    pub fn start(&self, id: &Uuid) -> AutomationResult<()> {
        self.transition(id, ExperimentStatus::Running)
    }

    pub fn pause(&self, id: &Uuid) -> AutomationResult<()> {
        self.transition(id, ExperimentStatus::Paused)
    }

    pub fn resume(&self, id: &Uuid) -> AutomationResult<()> {
        self.transition(id, ExperimentStatus::Running)
    }

    /// Ends the test (duration elapsed or manual stop) without a winner.
    pub fn stop(&self, id: &Uuid) -> AutomationResult<()> {
        self.transition(id, ExperimentStatus::Completed)
    }

    /// Adds a variant to a draft. Every share resets to `floor(100/(k+1))`
    /// and re-normalizes, matching the console's add-variant behavior.
    pub fn add_variant(&self, id: &Uuid, variant: Variant) -> AutomationResult<()> {
        let mut entry = self
            .experiments
            .get_mut(id)
            .ok_or_else(|| AutomationError::NotFound(format!("experiment {id}")))?;
        if entry.status != ExperimentStatus::Draft {
            return Err(AutomationError::Validation(vec![ValidationError::new(
                "status",
                "variants can only change while the experiment is a draft",
            )]));
        }
        let limit = self.config.max_variants.min(validator::MAX_VARIANTS);
        if entry.variants.len() >= limit {
            return Err(AutomationError::Validation(vec![ValidationError::new(
                "variants",
                format!("at most {limit} variants"),
            )]));
        }
        entry.variants.push(variant);
        allocator::split_evenly(&mut entry.variants);
        entry.updated_at = Utc::now();
        Ok(())
    }

    /// Removes a non-control variant from a draft and re-normalizes.
    pub fn remove_variant(&self, id: &Uuid, variant_id: &Uuid) -> AutomationResult<()> {
        let mut entry = self
            .experiments
            .get_mut(id)
            .ok_or_else(|| AutomationError::NotFound(format!("experiment {id}")))?;
        if entry.status != ExperimentStatus::Draft {
            return Err(AutomationError::Validation(vec![ValidationError::new(
                "status",
                "variants can only change while the experiment is a draft",
            )]));
        }
        let Some(index) = entry.variants.iter().position(|v| v.id == *variant_id) else {
            return Err(AutomationError::NotFound(format!("variant {variant_id}")));
        };
        if entry.variants[index].is_control {
            return Err(AutomationError::Validation(vec![ValidationError::new(
                "variants",
                "the control variant cannot be removed",
            )]));
        }
        if entry.variants.len() <= validator::MIN_VARIANTS {
            return Err(AutomationError::Validation(vec![ValidationError::new(
                "variants",
                format!("at least {} variants", validator::MIN_VARIANTS),
            )]));
        }
        entry.variants.remove(index);
        allocator::split_evenly(&mut entry.variants);
        entry.updated_at = Utc::now();
        Ok(())
    }

    /// Sticky variant assignment for a recipient at send time.
    pub fn assign(&self, id: &Uuid, recipient_id: &str) -> AutomationResult<Option<Uuid>> {
        let entry = self
            .experiments
            .get(id)
            .ok_or_else(|| AutomationError::NotFound(format!("experiment {id}")))?;
        let assigned = allocator::assign(&entry, recipient_id);
        if let Some(variant_id) = assigned {
            self.event_sink.emit(make_event(
                DecisionEventType::VariantAssigned,
                id.to_string(),
                Some(recipient_id.to_string()),
                Some(variant_id.to_string()),
            ));
        }
        Ok(assigned)
    }

    /// Stores the latest outcome counters and, when the experiment opted
    /// into automatic selection, applies the winner decision immediately.
    pub fn record_outcomes(
        &self,
        id: &Uuid,
        metrics: HashMap<Uuid, VariantMetrics>,
    ) -> AutomationResult<WinnerDecision> {
        if !self.experiments.contains_key(id) {
            return Err(AutomationError::NotFound(format!("experiment {id}")));
        }
        self.metrics.insert(*id, metrics);
        self.run_auto_selection(id)
    }

    /// Advisory winner evaluation against the latest recorded counters.
    pub fn evaluate(&self, id: &Uuid) -> AutomationResult<WinnerDecision> {
        let entry = self
            .experiments
            .get(id)
            .ok_or_else(|| AutomationError::NotFound(format!("experiment {id}")))?;
        let metrics = self.metrics.get(id).map(|m| m.clone()).unwrap_or_default();
        Ok(winner::evaluate(&entry, &metrics))
    }

    /// Manual winner selection by an operator.
    pub fn select_winner(&self, id: &Uuid, variant_id: &Uuid) -> AutomationResult<()> {
        let mut entry = self
            .experiments
            .get_mut(id)
            .ok_or_else(|| AutomationError::NotFound(format!("experiment {id}")))?;
        if entry.variant(variant_id).is_none() {
            return Err(AutomationError::NotFound(format!("variant {variant_id}")));
        }
        if !can_transition(entry.status, ExperimentStatus::WinnerSelected) {
            return Err(AutomationError::InvalidTransition {
                from: entry.status.to_string(),
                to: ExperimentStatus::WinnerSelected.to_string(),
            });
        }
        entry.status = ExperimentStatus::WinnerSelected;
        entry.winner_variant_id = Some(*variant_id);
        entry.updated_at = Utc::now();
        info!(experiment_id = %id, variant_id = %variant_id, "Winner selected");
        self.event_sink.emit(make_event(
            DecisionEventType::WinnerSelected,
            id.to_string(),
            None,
            Some(variant_id.to_string()),
        ));
        Ok(())
    }

    fn run_auto_selection(&self, id: &Uuid) -> AutomationResult<WinnerDecision> {
        let mut entry = self
            .experiments
            .get_mut(id)
            .ok_or_else(|| AutomationError::NotFound(format!("experiment {id}")))?;
        let metrics = self.metrics.get(id).map(|m| m.clone()).unwrap_or_default();
        let decision = winner::evaluate(&entry, &metrics);

        let already_selected = entry.status == ExperimentStatus::WinnerSelected;
        if entry.auto_select_winner && decision.can_decide && !already_selected {
            if let Some(winner_id) = decision.winner_id {
                if can_transition(entry.status, ExperimentStatus::WinnerSelected) {
                    entry.status = ExperimentStatus::WinnerSelected;
                    entry.winner_variant_id = Some(winner_id);
                    entry.updated_at = Utc::now();
                    info!(experiment_id = %id, variant_id = %winner_id, "Winner auto-selected");
                    self.event_sink.emit(make_event(
                        DecisionEventType::WinnerSelected,
                        id.to_string(),
                        None,
                        Some(winner_id.to_string()),
                    ));
                }
            }
        }
        Ok(decision)
    }

    fn transition(&self, id: &Uuid, to: ExperimentStatus) -> AutomationResult<()> {
        let mut entry = self
            .experiments
            .get_mut(id)
            .ok_or_else(|| AutomationError::NotFound(format!("experiment {id}")))?;
        if !can_transition(entry.status, to) {
            return Err(AutomationError::InvalidTransition {
                from: entry.status.to_string(),
                to: to.to_string(),
            });
        }
        info!(experiment_id = %id, from = %entry.status, to = %to, "Experiment status change");
        entry.status = to;
        entry.updated_at = Utc::now();
        Ok(())
    }
}

impl Default for ExperimentEngine {
    fn default() -> Self {
        Self::new()
    }
}
