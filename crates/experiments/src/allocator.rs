//! Deterministic, sticky traffic allocation.
//!
//! Assignment is a pure function of the recipient id and the experiment's
//! variant shares, with no lookup table. A recipient id is hashed with a
//! 31-multiplier polynomial rolling hash, reduced to a bucket in [0, 100),
//! and matched against the variants' cumulative percentage ranges in
//! insertion order.

use uuid::Uuid;

use crate::types::{ExperimentDefinition, ExperimentStatus, Variant};

/// Rescales integer traffic shares so they sum to exactly 100. Each share
/// becomes `floor(share * 100 / sum)` (equal shares when the sum is 0) and
/// the rounding remainder goes to the variant that had the largest share
/// before normalization, ties broken by insertion order.
pub fn normalize(variants: &mut [Variant]) {
    if variants.is_empty() {
        return;
    }

    let originals: Vec<u32> = variants
        .iter()
        .map(|v| u32::from(v.traffic_percentage))
        .collect();
    let sum: u32 = originals.iter().sum();

    if sum == 0 {
        let share = (100 / variants.len()) as u8;
        for variant in variants.iter_mut() {
            variant.traffic_percentage = share;
        }
    } else if sum != 100 {
        for (variant, original) in variants.iter_mut().zip(&originals) {
            variant.traffic_percentage = (original * 100 / sum) as u8;
        }
    }

    let assigned: u32 = variants
        .iter()
        .map(|v| u32::from(v.traffic_percentage))
        .sum();
    let remainder = (100 - assigned) as u8;
    if remainder > 0 {
        let largest = originals
            .iter()
            .enumerate()
            .max_by(|(ia, a), (ib, b)| a.cmp(b).then(ib.cmp(ia)))
            .map(|(i, _)| i)
            .unwrap_or(0);
        variants[largest].traffic_percentage += remainder;
    }
}

/// Resets every share to `floor(100 / n)` and re-normalizes. Applied when a
/// variant is added or removed, before the set is persisted.
pub fn split_evenly(variants: &mut [Variant]) {
    if variants.is_empty() {
        return;
    }
    let share = (100 / variants.len()) as u8;
    for variant in variants.iter_mut() {
        variant.traffic_percentage = share;
    }
    normalize(variants);
}

/// Assigns the recipient to exactly one variant of a running experiment.
/// Sticky: the same recipient always lands on the same variant for a fixed
/// variant set. Shares that don't sum to 100 (a caller bypassed
/// normalization) are re-normalized on a scratch copy before hashing.
pub fn assign(experiment: &ExperimentDefinition, recipient_id: &str) -> Option<Uuid> {
    if experiment.status != ExperimentStatus::Running {
        return None;
    }
    if experiment.variants.is_empty() {
        return None;
    }

    let sum: u32 = experiment
        .variants
        .iter()
        .map(|v| u32::from(v.traffic_percentage))
        .sum();
    let normalized;
    let variants: &[Variant] = if sum == 100 {
        &experiment.variants
    } else {
        let mut copy = experiment.variants.clone();
        normalize(&mut copy);
        normalized = copy;
        &normalized
    };

    let bucket = hash_bucket(recipient_id);
    let mut cumulative: u32 = 0;
    for variant in variants {
        cumulative += u32::from(variant.traffic_percentage);
        if u32::from(bucket) < cumulative {
            return Some(variant.id);
        }
    }
    variants.last().map(|v| v.id)
}

/// The documented hash: a 31-multiplier byte fold reduced modulo 100.
pub fn hash_bucket(recipient_id: &str) -> u8 {
    let hash = recipient_id
        .bytes()
        .fold(0u64, |acc, b| acc.wrapping_mul(31).wrapping_add(u64::from(b)));
    (hash % 100) as u8
}
