//! Connected components of the equivalence graph.
//!
//! Union-find with path compression and union by rank, then a deterministic
//! presentation: members of each component sort by CURIE (so the first
//! member is the lexicographic root), and components sort by their root.
//! The same input always yields the same component list, independent of
//! insertion or thread order.

use petgraph::unionfind::UnionFind;
use petgraph::visit::EdgeRef;

use crate::reference::{RefId, ReferenceStore};

use super::EquivalenceGraph;

/// One equivalence class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Component {
    /// Members sorted by ascending CURIE; `members[0]` is the root.
    pub members: Vec<RefId>,
}

impl Component {
    /// The lexicographically smallest member.
    pub fn root(&self) -> RefId {
        self.members[0]
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

/// Compute the connected components of the equivalence graph.
pub fn connected_components(
    graph: &EquivalenceGraph,
    store: &ReferenceStore,
) -> Vec<Component> {
    let inner = graph.petgraph();
    let mut sets: UnionFind<usize> = UnionFind::new(inner.node_count());
    for edge in inner.edge_references() {
        sets.union(edge.source().index(), edge.target().index());
    }

    let mut grouped: Vec<Vec<(String, RefId)>> = Vec::new();
    let mut group_of = vec![usize::MAX; inner.node_count()];
    for at in inner.node_indices() {
        let root = sets.find_mut(at.index());
        let reference = inner[at];
        let slot = if group_of[root] == usize::MAX {
            group_of[root] = grouped.len();
            grouped.push(Vec::new());
            grouped.len() - 1
        } else {
            group_of[root]
        };
        grouped[slot].push((store.curie(reference), reference));
    }

    let mut components: Vec<Component> = grouped
        .into_iter()
        .map(|mut members| {
            members.sort();
            Component {
                members: members.into_iter().map(|(_, id)| id).collect(),
            }
        })
        .collect();
    components.sort_by_key(|c| store.curie(c.root()));
    components
}
