//! Predicate vocabulary and the table-driven predicate metadata registry.
//!
//! Whether a predicate is symmetric, transitive, has an inverse, or
//! generalizes to a weaker predicate is data, not code: the inference rules
//! consult a [`PredicateTable`] and never hardcode predicate behavior.
//! Adding a predicate means adding a table entry.

use dashmap::DashSet;
use rustc_hash::FxHashMap;

use crate::error::KhipuResult;
use crate::reference::{RefId, ReferenceStore};

// ---------------------------------------------------------------------------
// Well-known terms
// ---------------------------------------------------------------------------

/// CURIEs of the match predicates the core knows out of the box.
pub mod curies {
    pub const EXACT_MATCH: &str = "skos:exactMatch";
    pub const BROAD_MATCH: &str = "skos:broadMatch";
    pub const NARROW_MATCH: &str = "skos:narrowMatch";
    pub const CLOSE_MATCH: &str = "skos:closeMatch";
    pub const RELATED_MATCH: &str = "skos:relatedMatch";
    pub const EQUIVALENT_CLASS: &str = "owl:equivalentClass";
    pub const REPLACED_BY: &str = "iao:replacedBy";
    pub const DB_XREF: &str = "oboinowl:hasDbXref";

    pub const MANUAL_CURATION: &str = "semapv:ManualMappingCuration";
    pub const LEXICAL_MATCHING: &str = "semapv:LexicalMatching";
    pub const INVERSION: &str = "semapv:MappingInversion";
    pub const CHAINING: &str = "semapv:MappingChaining";
    pub const GENERALIZATION: &str = "semapv:MappingGeneralization";
    pub const MUTATION: &str = "semapv:MappingMutation";
    pub const PRIORITIZATION: &str = "semapv:MappingPrioritization";
}

/// Interned IDs for the well-known predicates and match-justification terms.
///
/// Resolved once per [`ReferenceStore`] and shared by the inference engine,
/// the prioritizer, and the pipeline driver.
#[derive(Debug, Clone, Copy)]
pub struct Vocabulary {
    pub exact_match: RefId,
    pub broad_match: RefId,
    pub narrow_match: RefId,
    pub close_match: RefId,
    pub related_match: RefId,
    pub equivalent_class: RefId,
    pub replaced_by: RefId,
    pub db_xref: RefId,

    pub manual_curation: RefId,
    pub lexical_matching: RefId,
    pub inversion: RefId,
    pub chaining: RefId,
    pub generalization: RefId,
    pub mutation: RefId,
    pub prioritization: RefId,
}

impl Vocabulary {
    /// Intern all well-known terms into the store.
    pub fn intern(store: &ReferenceStore) -> KhipuResult<Self> {
        Ok(Self {
            exact_match: store.intern_curie(curies::EXACT_MATCH)?,
            broad_match: store.intern_curie(curies::BROAD_MATCH)?,
            narrow_match: store.intern_curie(curies::NARROW_MATCH)?,
            close_match: store.intern_curie(curies::CLOSE_MATCH)?,
            related_match: store.intern_curie(curies::RELATED_MATCH)?,
            equivalent_class: store.intern_curie(curies::EQUIVALENT_CLASS)?,
            replaced_by: store.intern_curie(curies::REPLACED_BY)?,
            db_xref: store.intern_curie(curies::DB_XREF)?,
            manual_curation: store.intern_curie(curies::MANUAL_CURATION)?,
            lexical_matching: store.intern_curie(curies::LEXICAL_MATCHING)?,
            inversion: store.intern_curie(curies::INVERSION)?,
            chaining: store.intern_curie(curies::CHAINING)?,
            generalization: store.intern_curie(curies::GENERALIZATION)?,
            mutation: store.intern_curie(curies::MUTATION)?,
            prioritization: store.intern_curie(curies::PRIORITIZATION)?,
        })
    }

    /// The default equivalence set used to build the equivalence graph.
    pub fn default_equivalence(&self) -> Vec<RefId> {
        vec![self.exact_match, self.equivalent_class]
    }
}

// ---------------------------------------------------------------------------
// Predicate metadata
// ---------------------------------------------------------------------------

/// Logical properties of a single predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PredicateSpec {
    /// `p(a, b)` entails `p(b, a)`.
    pub symmetric: bool,
    /// `p(a, b)` and `p(b, c)` entail `p(a, c)`.
    pub transitive: bool,
    /// Predicate `q` with `p(a, b)` entailing `q(b, a)`.
    pub inverse: Option<RefId>,
    /// Weaker predicate entailed over the same pair.
    pub generalizes_to: Option<RefId>,
}

impl PredicateSpec {
    /// A predicate with none of the three properties.
    pub const OPAQUE: Self = Self {
        symmetric: false,
        transitive: false,
        inverse: None,
        generalizes_to: None,
    };
}

/// Table of predicate metadata keyed by predicate reference.
///
/// Lookups for predicates absent from the table return [`PredicateSpec::OPAQUE`]
/// and log a warning once per distinct predicate.
pub struct PredicateTable {
    specs: FxHashMap<RefId, PredicateSpec>,
    warned: DashSet<RefId>,
}

impl PredicateTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self {
            specs: FxHashMap::default(),
            warned: DashSet::new(),
        }
    }

    /// Build the table for the built-in match vocabulary.
    pub fn builtin(voc: &Vocabulary) -> Self {
        let mut table = Self::new();
        table.register(
            voc.exact_match,
            PredicateSpec {
                symmetric: true,
                transitive: true,
                inverse: None,
                generalizes_to: None,
            },
        );
        table.register(
            voc.broad_match,
            PredicateSpec {
                symmetric: false,
                transitive: false,
                inverse: Some(voc.narrow_match),
                generalizes_to: Some(voc.related_match),
            },
        );
        table.register(
            voc.narrow_match,
            PredicateSpec {
                symmetric: false,
                transitive: false,
                inverse: Some(voc.broad_match),
                generalizes_to: Some(voc.related_match),
            },
        );
        table.register(
            voc.close_match,
            PredicateSpec {
                symmetric: true,
                transitive: false,
                inverse: None,
                generalizes_to: Some(voc.related_match),
            },
        );
        table.register(
            voc.related_match,
            PredicateSpec {
                symmetric: true,
                transitive: false,
                inverse: None,
                generalizes_to: None,
            },
        );
        table.register(
            voc.equivalent_class,
            PredicateSpec {
                symmetric: true,
                transitive: true,
                inverse: None,
                generalizes_to: Some(voc.exact_match),
            },
        );
        table.register(
            voc.replaced_by,
            PredicateSpec {
                symmetric: false,
                transitive: true,
                inverse: None,
                generalizes_to: None,
            },
        );
        // xrefs are undirected in practice: invertible, never chained.
        table.register(
            voc.db_xref,
            PredicateSpec {
                symmetric: true,
                transitive: false,
                inverse: None,
                generalizes_to: None,
            },
        );
        table
    }

    /// Register or replace the metadata for a predicate.
    pub fn register(&mut self, predicate: RefId, spec: PredicateSpec) {
        self.specs.insert(predicate, spec);
    }

    /// Whether the predicate has an explicit table entry.
    pub fn is_known(&self, predicate: RefId) -> bool {
        self.specs.contains_key(&predicate)
    }

    /// Metadata for a predicate.
    ///
    /// Unknown predicates are opaque: not symmetric, not transitive, no
    /// inverse, no generalization. The first lookup of each unknown predicate
    /// logs a warning.
    pub fn spec(&self, predicate: RefId, store: &ReferenceStore) -> PredicateSpec {
        match self.specs.get(&predicate) {
            Some(spec) => *spec,
            None => {
                if self.warned.insert(predicate) {
                    tracing::warn!(
                        predicate = %store.curie(predicate),
                        "unknown predicate, treating as opaque"
                    );
                }
                PredicateSpec::OPAQUE
            }
        }
    }

    /// The inverse direction of a predicate: itself when symmetric, the
    /// declared inverse otherwise, `None` for directed predicates without one.
    pub fn inversion_target(&self, predicate: RefId, store: &ReferenceStore) -> Option<RefId> {
        let spec = self.spec(predicate, store);
        if spec.symmetric {
            Some(predicate)
        } else {
            spec.inverse
        }
    }

    /// Number of registered predicates.
    pub fn len(&self) -> usize {
        self.specs.len()
    }

    /// Whether the table has no entries.
    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }
}

impl Default for PredicateTable {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for PredicateTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PredicateTable")
            .field("predicates", &self.specs.len())
            .finish()
    }
}
