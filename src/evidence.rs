//! Evidence: the justification records attached to mappings.
//!
//! An evidence is either *simple* (curated or produced directly by a source,
//! with its own confidence and provenance) or *reasoned* (derived by an
//! inference rule from parent mappings). Reasoned evidence never stores a
//! confidence of its own; it stores the parent triple keys and a rule factor,
//! and the confidence is resolved live against the current collection.
//!
//! Every evidence has a stable content-addressed identifier, computed by
//! hashing its semantically-significant fields. Hashes deduplicate evidence
//! when mappings are merged and stay equal across re-runs.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use xxhash_rust::xxh3::xxh3_128;

use crate::mapping::TripleKey;
use crate::reference::{RefId, ReferenceStore};

// ---------------------------------------------------------------------------
// Mapping sets
// ---------------------------------------------------------------------------

/// Handle to the mapping set a simple evidence came from.
///
/// Shared via `Arc` across the (typically many) evidences of one source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MappingSetRef {
    /// Name of the set, e.g. a resource key like `doid`.
    pub name: String,
    /// Version of the set, if the source reports one.
    pub version: Option<String>,
    /// License string of the set.
    pub license: Option<String>,
    /// Set-level confidence in [0, 1]; multiplies each member evidence.
    pub confidence: Option<f64>,
}

impl MappingSetRef {
    /// Create a named set with no version, license, or set-level confidence.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: None,
            license: None,
            confidence: None,
        }
    }

    /// Set the set-level confidence.
    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = Some(confidence.clamp(0.0, 1.0));
        self
    }

    /// Set the version.
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }
}

// ---------------------------------------------------------------------------
// Evidence
// ---------------------------------------------------------------------------

/// How a reasoned evidence combines its parents' aggregate confidences.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ParentCombine {
    /// Product of all parent aggregates (chains, inversions, mutations).
    Product,
    /// Minimum over all parent aggregates (path summaries).
    Minimum,
}

/// One justification for a mapping.
#[derive(Debug, Clone, PartialEq)]
pub enum Evidence {
    /// Evidence asserted by a source: a match-type justification, a
    /// confidence in [0, 1], and optional author / mapping-set provenance.
    Simple {
        justification: RefId,
        confidence: f64,
        author: Option<RefId>,
        mapping_set: Option<Arc<MappingSetRef>>,
    },
    /// Evidence derived by a rule from parent mappings, referenced by triple
    /// key. The confidence is `factor` combined with the parents' aggregate
    /// confidences at resolution time.
    Reasoned {
        justification: RefId,
        factor: f64,
        combine: ParentCombine,
        parents: SmallVec<[TripleKey; 2]>,
    },
}

/// Stable 128-bit content address of an evidence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EvidenceHash(pub u128);

impl std::fmt::Display for EvidenceHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:032x}", self.0)
    }
}

impl Evidence {
    /// Simple evidence with just a justification and confidence.
    pub fn simple(justification: RefId, confidence: f64) -> Self {
        Self::Simple {
            justification,
            confidence: confidence.clamp(0.0, 1.0),
            author: None,
            mapping_set: None,
        }
    }

    /// Simple evidence attributed to a mapping set.
    pub fn from_set(justification: RefId, confidence: f64, set: Arc<MappingSetRef>) -> Self {
        Self::Simple {
            justification,
            confidence: confidence.clamp(0.0, 1.0),
            author: None,
            mapping_set: Some(set),
        }
    }

    /// Reasoned evidence multiplying its parents' aggregates.
    pub fn reasoned(
        justification: RefId,
        factor: f64,
        parents: impl IntoIterator<Item = TripleKey>,
    ) -> Self {
        Self::Reasoned {
            justification,
            factor: factor.clamp(0.0, 1.0),
            combine: ParentCombine::Product,
            parents: parents.into_iter().collect(),
        }
    }

    /// Reasoned evidence taking the minimum over its parents' aggregates.
    ///
    /// Used for path summaries, where the weakest link bounds the whole path.
    pub fn path_summary(
        justification: RefId,
        parents: impl IntoIterator<Item = TripleKey>,
    ) -> Self {
        Self::Reasoned {
            justification,
            factor: 1.0,
            combine: ParentCombine::Minimum,
            parents: parents.into_iter().collect(),
        }
    }

    /// The match-type or derivation-rule justification term.
    pub fn justification(&self) -> RefId {
        match self {
            Self::Simple { justification, .. } | Self::Reasoned { justification, .. } => {
                *justification
            }
        }
    }

    /// Whether this evidence was derived by a rule rather than asserted.
    pub fn is_reasoned(&self) -> bool {
        matches!(self, Self::Reasoned { .. })
    }

    /// Parent triple keys, empty for simple evidence.
    pub fn parents(&self) -> &[TripleKey] {
        match self {
            Self::Simple { .. } => &[],
            Self::Reasoned { parents, .. } => parents,
        }
    }

    /// Compute the stable content address of this evidence.
    ///
    /// Hashes the semantically-significant fields only: justification and
    /// author CURIEs, confidence bits, mapping-set identity, and parent
    /// triple hashes. Display names are transient and excluded.
    pub fn content_hash(&self, store: &ReferenceStore) -> EvidenceHash {
        let encoded = match self {
            Self::Simple {
                justification,
                confidence,
                author,
                mapping_set,
            } => {
                let set = mapping_set.as_ref().map(|s| {
                    (
                        s.name.clone(),
                        s.version.clone(),
                        s.license.clone(),
                        s.confidence.map(f64::to_bits),
                    )
                });
                bincode::serialize(&(
                    0u8,
                    store.curie(*justification),
                    confidence.to_bits(),
                    author.map(|a| store.curie(a)),
                    set,
                ))
            }
            Self::Reasoned {
                justification,
                factor,
                combine,
                parents,
            } => {
                let parent_hashes: Vec<u128> =
                    parents.iter().map(|p| p.stable_hash(store)).collect();
                bincode::serialize(&(
                    1u8,
                    store.curie(*justification),
                    factor.to_bits(),
                    *combine as u8,
                    parent_hashes,
                ))
            }
        }
        .expect("evidence fields are always encodable");
        EvidenceHash(xxh3_128(&encoded))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> ReferenceStore {
        ReferenceStore::new()
    }

    #[test]
    fn content_hash_is_stable_and_discriminating() {
        let store = store();
        let lexical = store.intern_curie("semapv:LexicalMatching").unwrap();
        let manual = store.intern_curie("semapv:ManualMappingCuration").unwrap();

        let a = Evidence::simple(lexical, 0.8);
        let b = Evidence::simple(lexical, 0.8);
        let c = Evidence::simple(lexical, 0.9);
        let d = Evidence::simple(manual, 0.8);

        assert_eq!(a.content_hash(&store), b.content_hash(&store));
        assert_ne!(a.content_hash(&store), c.content_hash(&store));
        assert_ne!(a.content_hash(&store), d.content_hash(&store));
    }

    #[test]
    fn mapping_set_participates_in_hash() {
        let store = store();
        let lexical = store.intern_curie("semapv:LexicalMatching").unwrap();
        let set = Arc::new(MappingSetRef::named("doid").with_confidence(0.9));

        let bare = Evidence::simple(lexical, 0.8);
        let attributed = Evidence::from_set(lexical, 0.8, set);
        assert_ne!(bare.content_hash(&store), attributed.content_hash(&store));
    }

    #[test]
    fn reasoned_hash_depends_on_parents() {
        let store = store();
        let chaining = store.intern_curie("semapv:MappingChaining").unwrap();
        let a = store.intern_curie("a:1").unwrap();
        let b = store.intern_curie("b:1").unwrap();
        let c = store.intern_curie("c:1").unwrap();
        let p = store.intern_curie("skos:exactMatch").unwrap();

        let k1 = TripleKey::new(a, p, b);
        let k2 = TripleKey::new(b, p, c);

        let one = Evidence::reasoned(chaining, 1.0, [k1, k2]);
        let other = Evidence::reasoned(chaining, 1.0, [k2, k1]);
        // Parent order is semantically significant for chains.
        assert_ne!(one.content_hash(&store), other.content_hash(&store));
        assert_eq!(
            one.content_hash(&store),
            Evidence::reasoned(chaining, 1.0, [k1, k2]).content_hash(&store)
        );
    }

    #[test]
    fn combine_mode_discriminates() {
        let store = store();
        let just = store.intern_curie("semapv:MappingPrioritization").unwrap();
        let a = store.intern_curie("a:1").unwrap();
        let b = store.intern_curie("b:1").unwrap();
        let p = store.intern_curie("skos:exactMatch").unwrap();
        let k = TripleKey::new(a, p, b);

        let product = Evidence::reasoned(just, 1.0, [k]);
        let minimum = Evidence::path_summary(just, [k]);
        assert_ne!(product.content_hash(&store), minimum.content_hash(&store));
    }

    #[test]
    fn confidence_is_clamped() {
        let store = store();
        let lexical = store.intern_curie("semapv:LexicalMatching").unwrap();
        match Evidence::simple(lexical, 1.7) {
            Evidence::Simple { confidence, .. } => assert_eq!(confidence, 1.0),
            _ => unreachable!(),
        }
    }
}
