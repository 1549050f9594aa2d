//! Inference: enriching a mapping collection with entailed mappings.
//!
//! Four rules run in rounds over a consistent snapshot of the collection:
//! inversion, predicate mutation, generalization, and transitive chaining.
//! Every derived mapping carries reasoned evidence citing its parents by
//! triple key, so provenance survives any later merge.

pub mod engine;

pub use engine::InferenceEngine;

use crate::mapping::Mappings;
use crate::reference::RefId;

/// A caller-supplied predicate-mutation rule.
///
/// Promotes mappings whose subject prefix is `source_prefix` (and whose
/// object prefix matches `target_prefix`, when given) from `old_predicate`
/// to `new_predicate` at the stated confidence. The canonical use is turning
/// a resource's database cross-references into exact matches where the
/// resource is known to use xrefs for equivalence.
#[derive(Debug, Clone)]
pub struct MutationRule {
    pub source_prefix: String,
    pub target_prefix: Option<String>,
    pub old_predicate: RefId,
    pub new_predicate: RefId,
    pub confidence: f64,
}

/// Knobs for an inference run.
#[derive(Debug, Clone)]
pub struct InferenceOptions {
    /// Maximum number of rounds before giving up on a fixed point.
    pub max_rounds: usize,
    /// Predicate-mutation rules applied each round.
    pub mutations: Vec<MutationRule>,
}

impl Default for InferenceOptions {
    fn default() -> Self {
        Self {
            max_rounds: 5,
            mutations: Vec::new(),
        }
    }
}

/// What an inference run produced.
#[derive(Debug)]
pub struct InferenceOutcome {
    /// The enriched, deduplicated collection.
    pub mappings: Mappings,
    /// Rounds actually executed.
    pub rounds: usize,
    /// Whether the closure reached a fixed point within the budget.
    pub fixed_point: bool,
    /// New triples produced by the final executed round.
    pub last_round_new: usize,
}
