//! Confidence propagation over evidence sets.
//!
//! Each evidence contributes one confidence; a mapping's aggregate combines
//! its evidences with the noisy-or rule `1 − ∏(1 − cᵢ)`, which is monotone
//! under evidence union and bounded in [0, 1]. Aggregates are recomputed on
//! demand from the evidence set and never stored on the mapping, so merging
//! evidence during deduplication can never leave a stale score behind.
//!
//! Reasoned evidence resolves its parents through the index of the current
//! collection. Two degenerate shapes are handled without erroring:
//!
//! - a parent filtered out of the collection makes the evidence contribute
//!   nothing;
//! - mutually-derived triples (possible once deduplication unions derived
//!   evidence into an ancestor of its own parents) are cut by a visiting set
//!   on the resolution path, so resolution always terminates.

use rustc_hash::FxHashSet;

use crate::evidence::{Evidence, ParentCombine};
use crate::index::MappingIndex;
use crate::mapping::TripleKey;

/// Aggregate confidence of the mapping with the given triple.
///
/// Returns 0.0 for triples absent from the index.
pub fn aggregate_confidence(key: TripleKey, index: &MappingIndex<'_>) -> f64 {
    let mut visiting = FxHashSet::default();
    aggregate_guarded(key, index, &mut visiting)
}

/// Confidence contributed by a single evidence, or `None` when it cannot be
/// resolved (missing or cyclic parents).
pub fn evidence_confidence(evidence: &Evidence, index: &MappingIndex<'_>) -> Option<f64> {
    let mut visiting = FxHashSet::default();
    evidence_guarded(evidence, index, &mut visiting)
}

fn aggregate_guarded(
    key: TripleKey,
    index: &MappingIndex<'_>,
    visiting: &mut FxHashSet<TripleKey>,
) -> f64 {
    let Some(mapping) = index.get(key) else {
        return 0.0;
    };
    visiting.insert(key);
    let mut product_of_misses = 1.0;
    for evidence in mapping.evidence() {
        if let Some(confidence) = evidence_guarded(evidence, index, visiting) {
            product_of_misses *= 1.0 - confidence;
        }
    }
    visiting.remove(&key);
    1.0 - product_of_misses
}

fn evidence_guarded(
    evidence: &Evidence,
    index: &MappingIndex<'_>,
    visiting: &mut FxHashSet<TripleKey>,
) -> Option<f64> {
    match evidence {
        Evidence::Simple {
            confidence,
            mapping_set,
            ..
        } => {
            let set_confidence = mapping_set
                .as_ref()
                .and_then(|s| s.confidence)
                .unwrap_or(1.0);
            Some(confidence * set_confidence)
        }
        Evidence::Reasoned {
            factor,
            combine,
            parents,
            ..
        } => {
            if parents.is_empty() {
                return None;
            }
            let mut acc = match combine {
                ParentCombine::Product => 1.0,
                ParentCombine::Minimum => f64::INFINITY,
            };
            for &parent in parents {
                if visiting.contains(&parent) || !index.contains(parent) {
                    return None;
                }
                let parent_confidence = aggregate_guarded(parent, index, visiting);
                match combine {
                    ParentCombine::Product => acc *= parent_confidence,
                    ParentCombine::Minimum => acc = acc.min(parent_confidence),
                }
            }
            Some((factor * acc).clamp(0.0, 1.0))
        }
    }
}
