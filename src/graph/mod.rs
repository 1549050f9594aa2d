//! The equivalence graph: an undirected multigraph over equivalence mappings.
//!
//! Nodes are the references appearing as subject or object of any mapping
//! whose predicate is in the configured equivalence set; each such mapping
//! contributes one undirected edge annotated with the mapping's triple key
//! and aggregate confidence.

pub mod components;

use petgraph::graph::{NodeIndex, UnGraph};
use petgraph::visit::EdgeRef;
use rustc_hash::FxHashMap;

use crate::confidence::aggregate_confidence;
use crate::index::MappingIndex;
use crate::mapping::{Mappings, TripleKey};
use crate::reference::RefId;

/// Edge payload: the contributing mapping and its confidence at build time.
#[derive(Debug, Clone, Copy)]
pub struct EquivalenceEdge {
    pub key: TripleKey,
    pub confidence: f64,
}

/// Undirected view over the equivalence subset of a collection.
pub struct EquivalenceGraph {
    graph: UnGraph<RefId, EquivalenceEdge>,
    nodes: FxHashMap<RefId, NodeIndex>,
}

impl EquivalenceGraph {
    /// Build the graph from the mappings whose predicate is in `equivalence`.
    ///
    /// Edge confidences are the mappings' aggregate confidences, resolved
    /// against the collection itself.
    pub fn build(collection: &Mappings, equivalence: &[RefId]) -> Self {
        let index = MappingIndex::build(collection);
        Self::build_with(collection, &index, equivalence)
    }

    /// Build the graph, resolving edge confidences against a wider
    /// collection (typically the full inference closure, which still holds
    /// the parents that post-filters may have dropped).
    pub fn build_with(
        collection: &Mappings,
        resolution: &MappingIndex<'_>,
        equivalence: &[RefId],
    ) -> Self {
        let mut graph = UnGraph::new_undirected();
        let mut nodes: FxHashMap<RefId, NodeIndex> = FxHashMap::default();

        for mapping in collection.iter() {
            if !equivalence.contains(&mapping.predicate()) {
                continue;
            }
            let key = mapping.key();
            let subject = *nodes
                .entry(key.subject)
                .or_insert_with(|| graph.add_node(key.subject));
            let object = *nodes
                .entry(key.object)
                .or_insert_with(|| graph.add_node(key.object));
            let confidence = aggregate_confidence(key, resolution);
            graph.add_edge(subject, object, EquivalenceEdge { key, confidence });
        }

        Self { graph, nodes }
    }

    /// Number of references in the graph.
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Number of equivalence edges.
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Whether a reference participates in any equivalence mapping.
    pub fn contains(&self, reference: RefId) -> bool {
        self.nodes.contains_key(&reference)
    }

    /// All references in the graph.
    pub fn references(&self) -> impl Iterator<Item = RefId> + '_ {
        self.graph.node_weights().copied()
    }

    /// Neighbors of a reference with the connecting edge payloads.
    ///
    /// Parallel edges (one per contributing mapping) are all reported.
    pub fn neighbors(&self, reference: RefId) -> Vec<(RefId, EquivalenceEdge)> {
        let Some(&at) = self.nodes.get(&reference) else {
            return Vec::new();
        };
        self.graph
            .edges(at)
            .map(|edge| {
                let other = if edge.source() == at {
                    edge.target()
                } else {
                    edge.source()
                };
                (self.graph[other], *edge.weight())
            })
            .collect()
    }

    pub(crate) fn petgraph(&self) -> &UnGraph<RefId, EquivalenceEdge> {
        &self.graph
    }
}

impl std::fmt::Debug for EquivalenceGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EquivalenceGraph")
            .field("nodes", &self.node_count())
            .field("edges", &self.edge_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evidence::Evidence;
    use crate::mapping::Mapping;
    use crate::reference::ReferenceStore;
    use crate::vocab::Vocabulary;

    fn setup() -> (ReferenceStore, Vocabulary, Mappings) {
        let store = ReferenceStore::new();
        let voc = Vocabulary::intern(&store).unwrap();
        let a = store.intern_curie("a:1").unwrap();
        let b = store.intern_curie("b:1").unwrap();
        let c = store.intern_curie("c:1").unwrap();
        let collection = Mappings::from_vec(vec![
            Mapping::with_evidence(
                TripleKey::new(a, voc.exact_match, b),
                Evidence::simple(voc.lexical_matching, 0.9),
            )
            .unwrap(),
            Mapping::with_evidence(
                TripleKey::new(b, voc.db_xref, c),
                Evidence::simple(voc.manual_curation, 1.0),
            )
            .unwrap(),
        ]);
        (store, voc, collection)
    }

    #[test]
    fn only_equivalence_predicates_contribute_edges() {
        let (_store, voc, collection) = setup();
        let graph = EquivalenceGraph::build(&collection, &voc.default_equivalence());
        assert_eq!(graph.edge_count(), 1);
        assert_eq!(graph.node_count(), 2);
    }

    #[test]
    fn configurable_equivalence_set() {
        let (_store, voc, collection) = setup();
        let wide = [voc.exact_match, voc.equivalent_class, voc.db_xref];
        let graph = EquivalenceGraph::build(&collection, &wide);
        assert_eq!(graph.edge_count(), 2);
        assert_eq!(graph.node_count(), 3);
    }

    #[test]
    fn edges_carry_aggregate_confidence() {
        let (store, voc, collection) = setup();
        let graph = EquivalenceGraph::build(&collection, &voc.default_equivalence());
        let a = store.get_parts("a", "1").unwrap();
        let neighbors = graph.neighbors(a);
        assert_eq!(neighbors.len(), 1);
        assert!((neighbors[0].1.confidence - 0.9).abs() < 1e-12);
    }

    #[test]
    fn absent_reference_has_no_neighbors() {
        let (store, voc, collection) = setup();
        let graph = EquivalenceGraph::build(&collection, &voc.default_equivalence());
        let ghost = store.intern_curie("z:9").unwrap();
        assert!(!graph.contains(ghost));
        assert!(graph.neighbors(ghost).is_empty());
    }
}
