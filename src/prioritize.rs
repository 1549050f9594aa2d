//! Prioritization: reducing each equivalence class to a star graph.
//!
//! Given a priority list of prefixes, every connected component elects a
//! canonical reference (lowest priority rank, ties broken by ascending
//! CURIE) and every other member maps onto it with a single exact-match
//! mapping. The result is a functional lookup table: each reference appears
//! as subject at most once.

use std::collections::VecDeque;

use rayon::prelude::*;
use rustc_hash::{FxHashMap, FxHashSet};

use crate::evidence::Evidence;
use crate::graph::components::Component;
use crate::graph::{EquivalenceEdge, EquivalenceGraph};
use crate::mapping::{Mapping, Mappings, TripleKey};
use crate::reference::{RefId, ReferenceStore};
use crate::vocab::Vocabulary;

/// Ordered prefix priorities; earlier entries outrank later ones.
#[derive(Debug, Clone, Default)]
pub struct PriorityList {
    prefixes: Vec<String>,
    rank: FxHashMap<String, usize>,
}

impl PriorityList {
    pub fn new(prefixes: impl IntoIterator<Item = impl Into<String>>) -> Self {
        let prefixes: Vec<String> = prefixes.into_iter().map(Into::into).collect();
        let rank = prefixes
            .iter()
            .enumerate()
            .map(|(at, p)| (p.clone(), at))
            .collect();
        Self { prefixes, rank }
    }

    /// The rank of a prefix; unlisted prefixes rank below all listed ones.
    pub fn rank(&self, prefix: &str) -> usize {
        self.rank.get(prefix).copied().unwrap_or(usize::MAX)
    }

    pub fn prefixes(&self) -> &[String] {
        &self.prefixes
    }

    pub fn is_empty(&self) -> bool {
        self.prefixes.is_empty()
    }
}

/// Produce the star-shaped prioritization mapping for every component.
///
/// Components are processed in parallel; each member's mapping carries a
/// path-summary evidence whose confidence resolves to the minimum edge
/// confidence along its path to the canonical node.
pub fn prioritize(
    graph: &EquivalenceGraph,
    components: &[Component],
    priority: &PriorityList,
    voc: &Vocabulary,
    store: &ReferenceStore,
) -> Mappings {
    components
        .par_iter()
        .map(|component| star_for_component(graph, component, priority, voc, store))
        .collect::<Vec<_>>()
        .into_iter()
        .flatten()
        .collect()
}

/// Elect the canonical member of a component.
///
/// Members are already sorted by CURIE, so scanning for the strictly best
/// rank breaks ties toward the smaller CURIE for free.
pub fn choose_canonical(
    component: &Component,
    priority: &PriorityList,
    store: &ReferenceStore,
) -> RefId {
    let mut best = component.members[0];
    let mut best_rank = priority.rank(store.prefix_str(best));
    for &member in &component.members[1..] {
        let rank = priority.rank(store.prefix_str(member));
        if rank < best_rank {
            best = member;
            best_rank = rank;
        }
    }
    best
}

fn star_for_component(
    graph: &EquivalenceGraph,
    component: &Component,
    priority: &PriorityList,
    voc: &Vocabulary,
    store: &ReferenceStore,
) -> Vec<Mapping> {
    let canonical = choose_canonical(component, priority, store);

    // BFS from the canonical node; deterministic by exploring neighbors in
    // CURIE order and keeping the strongest of any parallel edges.
    let mut previous: FxHashMap<RefId, (RefId, TripleKey)> = FxHashMap::default();
    let mut visited: FxHashSet<RefId> = FxHashSet::default();
    visited.insert(canonical);
    let mut queue = VecDeque::from([canonical]);

    while let Some(node) = queue.pop_front() {
        let mut best: FxHashMap<RefId, EquivalenceEdge> = FxHashMap::default();
        for (neighbor, edge) in graph.neighbors(node) {
            best.entry(neighbor)
                .and_modify(|kept| {
                    if edge.confidence > kept.confidence
                        || (edge.confidence == kept.confidence && edge.key < kept.key)
                    {
                        *kept = edge;
                    }
                })
                .or_insert(edge);
        }
        let mut ordered: Vec<(RefId, EquivalenceEdge)> = best.into_iter().collect();
        ordered.sort_by_key(|(neighbor, _)| store.curie(*neighbor));

        for (neighbor, edge) in ordered {
            if visited.insert(neighbor) {
                previous.insert(neighbor, (node, edge.key));
                queue.push_back(neighbor);
            }
        }
    }

    component
        .members
        .iter()
        .copied()
        .filter(|&member| member != canonical)
        .map(|member| {
            let mut path: Vec<TripleKey> = Vec::new();
            let mut at = member;
            while at != canonical {
                let (parent, edge) = previous
                    .get(&at)
                    .copied()
                    .expect("component members are reachable from the canonical node");
                path.push(edge);
                at = parent;
            }
            Mapping::with_evidence(
                TripleKey::new(member, voc.exact_match, canonical),
                Evidence::path_summary(voc.prioritization, path),
            )
            .expect("canonical node differs from every other member")
        })
        .collect()
}
