//! The rule engine: inversion, mutation, generalization, chaining.
//!
//! A round applies all four rules against one consistent snapshot of the
//! collection and merges the candidates at the round boundary, so rule
//! application within a round can fan out across threads without changing
//! the result. Rounds repeat until no new triple appears or the budget runs
//! out; running out is not an error, downstream stages just see the partial
//! closure.

use lasso::Spur;
use rayon::prelude::*;

use crate::cancel::Cancellation;
use crate::error::{InferError, KhipuResult};
use crate::evidence::Evidence;
use crate::index::MappingIndex;
use crate::mapping::{Mapping, Mappings, TripleKey};
use crate::reference::ReferenceStore;
use crate::vocab::{PredicateTable, Vocabulary};

use super::{InferenceOptions, InferenceOutcome, MutationRule};

/// Mappings processed between cancellation checks inside a round.
const CANCEL_CHECK_INTERVAL: usize = 10_000;

/// Mutation rule with its prefixes pre-resolved to interner handles.
struct ResolvedMutation<'r> {
    rule: &'r MutationRule,
    source: Option<Spur>,
    // Outer None: rule matches any object prefix.
    target: Option<Option<Spur>>,
}

/// Stateless inference engine borrowing the shared registries.
pub struct InferenceEngine<'a> {
    store: &'a ReferenceStore,
    table: &'a PredicateTable,
    voc: &'a Vocabulary,
}

impl<'a> InferenceEngine<'a> {
    /// Create an engine over the given registries.
    pub fn new(store: &'a ReferenceStore, table: &'a PredicateTable, voc: &'a Vocabulary) -> Self {
        Self { store, table, voc }
    }

    /// Run inference rounds to a fixed point or until the budget is spent.
    pub fn run(
        &self,
        mappings: Mappings,
        options: &InferenceOptions,
        cancel: &Cancellation,
    ) -> KhipuResult<InferenceOutcome> {
        let mut current = mappings.deduplicate(self.store);
        if options.max_rounds == 0 {
            return Ok(InferenceOutcome {
                mappings: current,
                rounds: 0,
                fixed_point: true,
                last_round_new: 0,
            });
        }

        let resolved: Vec<ResolvedMutation<'_>> = options
            .mutations
            .iter()
            .map(|rule| ResolvedMutation {
                rule,
                source: self.store.prefix_handle(&rule.source_prefix),
                target: rule
                    .target_prefix
                    .as_deref()
                    .map(|p| self.store.prefix_handle(p)),
            })
            .collect();

        let mut rounds = 0;
        let mut fixed_point = false;
        let mut last_round_new = 0;

        for round in 0..options.max_rounds {
            rounds = round + 1;
            let before = current.len();

            let candidates = {
                let index = MappingIndex::build(&current);
                let mut candidates = self.apply_inversion(&current, &index, cancel)?;
                candidates.extend(self.apply_mutations(&current, &resolved, cancel)?);
                candidates.extend(self.apply_generalization(&current, cancel)?);
                candidates.extend(self.apply_chaining(&current, &index, cancel)?);
                candidates
            };

            if candidates.is_empty() {
                fixed_point = true;
                last_round_new = 0;
                break;
            }

            let mut merged = current;
            merged.extend(candidates);
            current = merged.deduplicate(self.store);
            last_round_new = current.len() - before;
            tracing::debug!(
                round = rounds,
                new_triples = last_round_new,
                total = current.len(),
                "inference round complete"
            );

            if last_round_new == 0 {
                fixed_point = true;
                break;
            }
        }

        if !fixed_point {
            tracing::warn!(
                rounds,
                new_in_last_round = last_round_new,
                "inference budget exhausted before fixed point; continuing with partial closure"
            );
        }

        Ok(InferenceOutcome {
            mappings: current,
            rounds,
            fixed_point,
            last_round_new,
        })
    }

    /// Inversion: `(s, p, o)` entails `(o, p⁻¹, s)` for symmetric or
    /// invertible `p`, unless the inverse triple is already present.
    fn apply_inversion(
        &self,
        current: &Mappings,
        index: &MappingIndex<'_>,
        cancel: &Cancellation,
    ) -> KhipuResult<Vec<Mapping>> {
        let mut out = Vec::new();
        for chunk in current.as_slice().chunks(CANCEL_CHECK_INTERVAL) {
            if cancel.is_cancelled() {
                return Err(InferError::Cancelled.into());
            }
            out.extend(
                chunk
                    .par_iter()
                    .filter_map(|mapping| {
                        mapping
                            .inverted(self.table, self.voc, self.store)
                            .filter(|inverse| !index.contains(inverse.key()))
                    })
                    .collect::<Vec<_>>(),
            );
        }
        Ok(out)
    }

    /// Predicate mutation per the caller-supplied rules.
    fn apply_mutations(
        &self,
        current: &Mappings,
        rules: &[ResolvedMutation<'_>],
        cancel: &Cancellation,
    ) -> KhipuResult<Vec<Mapping>> {
        if rules.is_empty() {
            return Ok(Vec::new());
        }
        let mut out = Vec::new();
        for chunk in current.as_slice().chunks(CANCEL_CHECK_INTERVAL) {
            if cancel.is_cancelled() {
                return Err(InferError::Cancelled.into());
            }
            out.extend(
                chunk
                    .par_iter()
                    .flat_map_iter(|mapping| {
                        let subject_prefix = self.store.prefix_of(mapping.subject());
                        let object_prefix = self.store.prefix_of(mapping.object());
                        rules.iter().filter_map(move |resolved| {
                            if Some(subject_prefix) != resolved.source {
                                return None;
                            }
                            if mapping.predicate() != resolved.rule.old_predicate {
                                return None;
                            }
                            if let Some(target) = resolved.target {
                                if Some(object_prefix) != target {
                                    return None;
                                }
                            }
                            let key = TripleKey::new(
                                mapping.subject(),
                                resolved.rule.new_predicate,
                                mapping.object(),
                            );
                            Mapping::with_evidence(
                                key,
                                Evidence::reasoned(
                                    self.voc.mutation,
                                    resolved.rule.confidence,
                                    [mapping.key()],
                                ),
                            )
                            .ok()
                        })
                    })
                    .collect::<Vec<_>>(),
            );
        }
        Ok(out)
    }

    /// Generalization: the same pair under the weaker predicate.
    fn apply_generalization(
        &self,
        current: &Mappings,
        cancel: &Cancellation,
    ) -> KhipuResult<Vec<Mapping>> {
        let mut out = Vec::new();
        for chunk in current.as_slice().chunks(CANCEL_CHECK_INTERVAL) {
            if cancel.is_cancelled() {
                return Err(InferError::Cancelled.into());
            }
            out.extend(
                chunk
                    .par_iter()
                    .filter_map(|mapping| {
                        let general = self
                            .table
                            .spec(mapping.predicate(), self.store)
                            .generalizes_to?;
                        let key =
                            TripleKey::new(mapping.subject(), general, mapping.object());
                        Mapping::with_evidence(
                            key,
                            Evidence::reasoned(self.voc.generalization, 1.0, [mapping.key()]),
                        )
                        .ok()
                    })
                    .collect::<Vec<_>>(),
            );
        }
        Ok(out)
    }

    /// Length-2 transitive chaining; longer chains emerge from iterated rounds.
    fn apply_chaining(
        &self,
        current: &Mappings,
        index: &MappingIndex<'_>,
        cancel: &Cancellation,
    ) -> KhipuResult<Vec<Mapping>> {
        let mut out = Vec::new();
        for chunk in current.as_slice().chunks(CANCEL_CHECK_INTERVAL) {
            if cancel.is_cancelled() {
                return Err(InferError::Cancelled.into());
            }
            out.extend(
                chunk
                    .par_iter()
                    .flat_map_iter(|first| {
                        let transitive =
                            self.table.spec(first.predicate(), self.store).transitive;
                        transitive
                            .then(|| {
                                index
                                    .with_subject_predicate(first.object(), first.predicate())
                                    .filter(|second| second.object() != first.subject())
                                    .filter_map(|second| {
                                        let key = TripleKey::new(
                                            first.subject(),
                                            first.predicate(),
                                            second.object(),
                                        );
                                        Mapping::with_evidence(
                                            key,
                                            Evidence::reasoned(
                                                self.voc.chaining,
                                                1.0,
                                                [first.key(), second.key()],
                                            ),
                                        )
                                        .ok()
                                    })
                                    .collect::<Vec<_>>()
                            })
                            .unwrap_or_default()
                    })
                    .collect::<Vec<_>>(),
            );
        }
        Ok(out)
    }
}
