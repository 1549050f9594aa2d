//! Node and edge tables for a labeled property graph export.
//!
//! Four node tables (concepts, mappings, evidences, mapping sets) and two
//! edge tables (the triple edges of each mapping, and the provenance edges
//! from mappings to evidences and onward to sets and authors). Identifiers
//! are stable: natural for concepts and sets, hash-derived for mappings and
//! evidences.

use rustc_hash::FxHashSet;
use serde::Serialize;

use crate::evidence::Evidence;
use crate::mapping::Mappings;
use crate::reference::{RefId, ReferenceStore};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConceptNode {
    /// The CURIE.
    pub id: String,
    pub prefix: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MappingNode {
    /// Hex triple hash.
    pub id: String,
    pub subject: String,
    pub predicate: String,
    pub object: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvidenceNode {
    /// Hex content hash.
    pub id: String,
    pub kind: &'static str,
    pub justification: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MappingSetNode {
    /// The set name.
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub license: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
}

/// `mapping -> concept` with a role label, one row per triple position.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TripleEdge {
    pub mapping: String,
    pub role: &'static str,
    pub concept: String,
}

/// Provenance edges: mapping → evidence, evidence → set / author.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProvenanceEdge {
    pub source: String,
    pub label: &'static str,
    pub target: String,
}

/// The full export.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PropertyGraph {
    pub concepts: Vec<ConceptNode>,
    pub mappings: Vec<MappingNode>,
    pub evidences: Vec<EvidenceNode>,
    pub mapping_sets: Vec<MappingSetNode>,
    pub triple_edges: Vec<TripleEdge>,
    pub provenance_edges: Vec<ProvenanceEdge>,
}

/// Build the property-graph tables for a collection.
pub fn export(mappings: &Mappings, store: &ReferenceStore) -> PropertyGraph {
    let mut graph = PropertyGraph::default();
    let mut seen_concepts: FxHashSet<RefId> = FxHashSet::default();
    let mut seen_evidence: FxHashSet<String> = FxHashSet::default();
    let mut seen_sets: FxHashSet<String> = FxHashSet::default();

    let mut concept = |graph: &mut PropertyGraph, id: RefId| -> String {
        let curie = store.curie(id);
        if seen_concepts.insert(id) {
            graph.concepts.push(ConceptNode {
                id: curie.clone(),
                prefix: store.prefix_str(id).to_owned(),
                name: store.name_of(id),
            });
        }
        curie
    };

    for mapping in mappings.iter() {
        let key = mapping.key();
        let mapping_id = format!("{:032x}", key.stable_hash(store));

        let subject = concept(&mut graph, key.subject);
        let predicate = concept(&mut graph, key.predicate);
        let object = concept(&mut graph, key.object);
        graph.mappings.push(MappingNode {
            id: mapping_id.clone(),
            subject: subject.clone(),
            predicate: predicate.clone(),
            object: object.clone(),
        });
        for (role, target) in [
            ("subject", subject),
            ("predicate", predicate),
            ("object", object),
        ] {
            graph.triple_edges.push(TripleEdge {
                mapping: mapping_id.clone(),
                role,
                concept: target,
            });
        }

        for evidence in mapping.evidence() {
            let evidence_id = format!("{}", evidence.content_hash(store));
            graph.provenance_edges.push(ProvenanceEdge {
                source: mapping_id.clone(),
                label: "has_evidence",
                target: evidence_id.clone(),
            });
            if !seen_evidence.insert(evidence_id.clone()) {
                continue;
            }

            match evidence {
                Evidence::Simple {
                    justification,
                    confidence,
                    author,
                    mapping_set,
                } => {
                    graph.evidences.push(EvidenceNode {
                        id: evidence_id.clone(),
                        kind: "simple",
                        justification: store.curie(*justification),
                        confidence: Some(*confidence),
                    });
                    if let Some(set) = mapping_set {
                        if seen_sets.insert(set.name.clone()) {
                            graph.mapping_sets.push(MappingSetNode {
                                id: set.name.clone(),
                                version: set.version.clone(),
                                license: set.license.clone(),
                                confidence: set.confidence,
                            });
                        }
                        graph.provenance_edges.push(ProvenanceEdge {
                            source: evidence_id.clone(),
                            label: "from_set",
                            target: set.name.clone(),
                        });
                    }
                    if let Some(author) = author {
                        let author_id = concept(&mut graph, *author);
                        graph.provenance_edges.push(ProvenanceEdge {
                            source: evidence_id.clone(),
                            label: "authored_by",
                            target: author_id,
                        });
                    }
                }
                Evidence::Reasoned { justification, .. } => {
                    graph.evidences.push(EvidenceNode {
                        id: evidence_id,
                        kind: "reasoned",
                        justification: store.curie(*justification),
                        confidence: None,
                    });
                }
            }
        }
    }
    graph
}
