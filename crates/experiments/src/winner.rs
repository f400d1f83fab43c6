//! Winner selection — rate ranking under a minimum-sample gate.
//!
//! `evaluate` is pure and race-unaware: the caller serializes the
//! check-and-set of `status -> winner_selected` per experiment.

use std::collections::HashMap;

use uuid::Uuid;

use crate::types::{
    ExperimentDefinition, ExperimentStatus, Variant, VariantMetrics, WinnerDecision,
};

/// Decides whether a winner can be declared and which variant it is.
///
/// Decidable only when every variant has reached `min_sample_size` sends
/// (missing counters count as zero). Ranking is by the experiment's
/// criterion rate, descending. On an exact rate tie a non-control variant
/// is preferred over control (a challenger that ties control takes the
/// slot); between tying challengers insertion order wins.
pub fn evaluate(
    experiment: &ExperimentDefinition,
    metrics: &HashMap<Uuid, VariantMetrics>,
) -> WinnerDecision {
    // Terminal: a selected winner never changes.
    if experiment.status == ExperimentStatus::WinnerSelected {
        return WinnerDecision {
            can_decide: true,
            winner_id: experiment.winner_variant_id,
            reason: "winner already selected".to_string(),
        };
    }

    let empty = VariantMetrics::default();
    for variant in &experiment.variants {
        let sent = metrics.get(&variant.id).unwrap_or(&empty).sent;
        if sent < experiment.min_sample_size {
            return WinnerDecision {
                can_decide: false,
                winner_id: None,
                reason: format!(
                    "variant '{}' has {sent} sends of the {} required",
                    variant.label, experiment.min_sample_size
                ),
            };
        }
    }

    let mut best: Option<(&Variant, f64)> = None;
    for variant in &experiment.variants {
        let rate = metrics
            .get(&variant.id)
            .unwrap_or(&empty)
            .rate_for(experiment.winner_criteria);
        best = match best {
            None => Some((variant, rate)),
            Some((leader, leader_rate)) => {
                if rate > leader_rate || (rate == leader_rate && leader.is_control && !variant.is_control)
                {
                    Some((variant, rate))
                } else {
                    Some((leader, leader_rate))
                }
            }
        };
    }

    match best {
        Some((variant, rate)) => WinnerDecision {
            can_decide: true,
            winner_id: Some(variant.id),
            reason: format!(
                "variant '{}' leads {:?} at {:.2}%",
                variant.label,
                experiment.winner_criteria,
                rate * 100.0
            ),
        },
        None => WinnerDecision {
            can_decide: false,
            winner_id: None,
            reason: "experiment has no variants".to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Variant, WinnerCriteria};

    fn experiment(min_sample_size: u64) -> ExperimentDefinition {
        let mut exp = ExperimentDefinition::new(
            "Subject test",
            "email_subject",
            WinnerCriteria::OpenRate,
            vec![Variant::control("Control", 50), Variant::new("Variant B", 50)],
        );
        exp.status = ExperimentStatus::Running;
        exp.min_sample_size = min_sample_size;
        exp
    }

    fn metrics_for(exp: &ExperimentDefinition, rows: &[(u64, u64)]) -> HashMap<Uuid, VariantMetrics> {
        exp.variants
            .iter()
            .zip(rows)
            .map(|(v, &(sent, opens))| {
                (
                    v.id,
                    VariantMetrics {
                        sent,
                        opens,
                        ..Default::default()
                    },
                )
            })
            .collect()
    }

    #[test]
    fn test_gate_requires_every_variant() {
        let exp = experiment(100);
        // Variant B below the gate even though control is far past it.
        let metrics = metrics_for(&exp, &[(500, 100), (99, 80)]);
        let decision = evaluate(&exp, &metrics);
        assert!(!decision.can_decide);
        assert!(decision.winner_id.is_none());
        assert!(decision.reason.contains("Variant B"));
    }

    #[test]
    fn test_missing_metrics_count_as_zero() {
        let exp = experiment(100);
        let metrics = metrics_for(&exp, &[(500, 100)]);
        assert!(!evaluate(&exp, &metrics).can_decide);
    }

    #[test]
    fn test_highest_rate_wins() {
        let exp = experiment(100);
        // A: 40/120 = 33.3%, B: 36/150 = 24%.
        let metrics = metrics_for(&exp, &[(120, 40), (150, 36)]);
        let decision = evaluate(&exp, &metrics);
        assert!(decision.can_decide);
        assert_eq!(decision.winner_id, Some(exp.variants[0].id));
    }

    #[test]
    fn test_tie_prefers_challenger_over_control() {
        let exp = experiment(100);
        // Both at exactly 40%.
        let metrics = metrics_for(&exp, &[(100, 40), (200, 80)]);
        let decision = evaluate(&exp, &metrics);
        assert!(decision.can_decide);
        assert_eq!(decision.winner_id, Some(exp.variants[1].id));
    }

    #[test]
    fn test_selected_winner_is_terminal() {
        let mut exp = experiment(100);
        let original_winner = exp.variants[0].id;
        exp.status = ExperimentStatus::WinnerSelected;
        exp.winner_variant_id = Some(original_winner);

        // Later counters would crown variant B; the decision must not move.
        let metrics = metrics_for(&exp, &[(1000, 10), (1000, 900)]);
        let decision = evaluate(&exp, &metrics);
        assert!(decision.can_decide);
        assert_eq!(decision.winner_id, Some(original_winner));
    }

    #[test]
    fn test_criterion_selects_the_rate() {
        let mut exp = experiment(10);
        exp.winner_criteria = WinnerCriteria::ReplyRate;
        let mut metrics = HashMap::new();
        metrics.insert(
            exp.variants[0].id,
            VariantMetrics {
                sent: 100,
                opens: 90,
                replies: 5,
                ..Default::default()
            },
        );
        metrics.insert(
            exp.variants[1].id,
            VariantMetrics {
                sent: 100,
                opens: 10,
                replies: 20,
                ..Default::default()
            },
        );
        // B loses on opens but wins on replies, which is the criterion.
        let decision = evaluate(&exp, &metrics);
        assert_eq!(decision.winner_id, Some(exp.variants[1].id));
    }
}
