//! Mappings: semantic triples with evidence, and collection operations.
//!
//! A mapping asserts `(subject, predicate, object)` between two references
//! and carries a non-empty set of [`Evidence`] records. A mapping's identity
//! *is* its triple: two mappings with the same triple are the same mapping,
//! and merging them unions their evidence sets by content hash. Aggregate
//! confidence is always derived from the evidence set (see
//! [`crate::confidence`]), never stored.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use smallvec::smallvec;
use xxhash_rust::xxh3::xxh3_128;

use crate::error::MappingError;
use crate::evidence::{Evidence, ParentCombine};
use crate::index::MappingIndex;
use crate::reference::{RefId, ReferenceStore};
use crate::vocab::{PredicateTable, Vocabulary};

// ---------------------------------------------------------------------------
// Triple keys
// ---------------------------------------------------------------------------

/// The identity of a mapping: its `(subject, predicate, object)` triple.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct TripleKey {
    pub subject: RefId,
    pub predicate: RefId,
    pub object: RefId,
}

impl TripleKey {
    /// Create a triple key.
    pub fn new(subject: RefId, predicate: RefId, object: RefId) -> Self {
        Self {
            subject,
            predicate,
            object,
        }
    }

    /// The same pair related by `predicate` in the opposite direction.
    pub fn flipped(self, predicate: RefId) -> Self {
        Self {
            subject: self.object,
            predicate,
            object: self.subject,
        }
    }

    /// Stable 128-bit hash of the triple, computed over the CURIE strings so
    /// it survives re-interning across runs.
    pub fn stable_hash(self, store: &ReferenceStore) -> u128 {
        let mut bytes = Vec::with_capacity(64);
        bytes.extend_from_slice(store.curie(self.subject).as_bytes());
        bytes.push(0);
        bytes.extend_from_slice(store.curie(self.predicate).as_bytes());
        bytes.push(0);
        bytes.extend_from_slice(store.curie(self.object).as_bytes());
        xxh3_128(&bytes)
    }
}

// ---------------------------------------------------------------------------
// Mapping
// ---------------------------------------------------------------------------

/// A semantic mapping: a triple plus its non-empty evidence set.
#[derive(Debug, Clone, PartialEq)]
pub struct Mapping {
    key: TripleKey,
    evidence: Vec<Evidence>,
}

impl Mapping {
    /// Create a mapping, enforcing `subject != object` and non-empty evidence.
    pub fn new(key: TripleKey, evidence: Vec<Evidence>) -> Result<Self, MappingError> {
        if key.subject == key.object {
            return Err(MappingError::SelfMapping {
                reference: key.subject.get(),
            });
        }
        if evidence.is_empty() {
            return Err(MappingError::EmptyEvidence {
                subject: key.subject.get(),
                predicate: key.predicate.get(),
                object: key.object.get(),
            });
        }
        Ok(Self { key, evidence })
    }

    /// Create a mapping with a single evidence.
    pub fn with_evidence(key: TripleKey, evidence: Evidence) -> Result<Self, MappingError> {
        Self::new(key, vec![evidence])
    }

    /// The triple identity.
    pub fn key(&self) -> TripleKey {
        self.key
    }

    pub fn subject(&self) -> RefId {
        self.key.subject
    }

    pub fn predicate(&self) -> RefId {
        self.key.predicate
    }

    pub fn object(&self) -> RefId {
        self.key.object
    }

    /// The evidence set. Never empty; treat as unordered.
    pub fn evidence(&self) -> &[Evidence] {
        &self.evidence
    }

    /// Add an evidence unless an identical one (by content hash) is present.
    pub fn push_evidence(&mut self, evidence: Evidence, store: &ReferenceStore) {
        let hash = evidence.content_hash(store);
        if !self.evidence.iter().any(|e| e.content_hash(store) == hash) {
            self.evidence.push(evidence);
        }
    }

    /// Union another mapping's evidence into this one.
    ///
    /// Both mappings must share the same triple; this is only called through
    /// deduplication, which groups by key first.
    pub fn absorb(&mut self, other: Mapping, store: &ReferenceStore) {
        debug_assert_eq!(self.key, other.key);
        let mut seen: Vec<_> = self.evidence.iter().map(|e| e.content_hash(store)).collect();
        for evidence in other.evidence {
            let hash = evidence.content_hash(store);
            if !seen.contains(&hash) {
                seen.push(hash);
                self.evidence.push(evidence);
            }
        }
    }

    /// The inverse of this mapping, when its predicate is symmetric or has a
    /// declared inverse. Carries a single reasoned inversion evidence citing
    /// this mapping as parent.
    pub fn inverted(
        &self,
        table: &PredicateTable,
        voc: &Vocabulary,
        store: &ReferenceStore,
    ) -> Option<Mapping> {
        let predicate = table.inversion_target(self.key.predicate, store)?;
        let evidence = Evidence::Reasoned {
            justification: voc.inversion,
            factor: 1.0,
            combine: ParentCombine::Product,
            parents: smallvec![self.key],
        };
        Mapping::with_evidence(self.key.flipped(predicate), evidence).ok()
    }
}

// ---------------------------------------------------------------------------
// Collections
// ---------------------------------------------------------------------------

/// Prefix-based keep/remove filter applied to one or both sides of a mapping.
#[derive(Debug, Clone, Default)]
pub struct PrefixFilter {
    /// When non-empty, the applied side's prefix must be in this set.
    pub keep: Vec<String>,
    /// The applied side's prefix must not be in this set.
    pub remove: Vec<String>,
    /// Apply to subject prefixes.
    pub subjects: bool,
    /// Apply to object prefixes.
    pub objects: bool,
}

impl PrefixFilter {
    /// Filter on both sides.
    pub fn both() -> Self {
        Self {
            keep: Vec::new(),
            remove: Vec::new(),
            subjects: true,
            objects: true,
        }
    }

    pub fn keeping(mut self, prefixes: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.keep.extend(prefixes.into_iter().map(Into::into));
        self
    }

    pub fn removing(mut self, prefixes: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.remove.extend(prefixes.into_iter().map(Into::into));
        self
    }

    /// Restrict to subject side only.
    pub fn subjects_only(mut self) -> Self {
        self.subjects = true;
        self.objects = false;
        self
    }

    /// Restrict to object side only.
    pub fn objects_only(mut self) -> Self {
        self.subjects = false;
        self.objects = true;
        self
    }

    fn is_noop(&self) -> bool {
        self.keep.is_empty() && self.remove.is_empty()
    }
}

/// An owned collection of mappings.
///
/// Collections are consumed by bulk transformations and produce new
/// collections; stages never mutate a collection in place.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Mappings(Vec<Mapping>);

impl Mappings {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn from_vec(mappings: Vec<Mapping>) -> Self {
        Self(mappings)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn push(&mut self, mapping: Mapping) {
        self.0.push(mapping);
    }

    pub fn extend(&mut self, other: impl IntoIterator<Item = Mapping>) {
        self.0.extend(other);
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Mapping> {
        self.0.iter()
    }

    pub fn as_slice(&self) -> &[Mapping] {
        &self.0
    }

    pub fn into_vec(self) -> Vec<Mapping> {
        self.0
    }

    /// Whether a triple is present.
    pub fn contains_key(&self, key: TripleKey) -> bool {
        self.0.iter().any(|m| m.key() == key)
    }

    /// Collapse mappings with identical triples, unioning evidence by hash.
    ///
    /// Keeps first-seen order, so deduplication is deterministic and
    /// idempotent, and commutes with concatenation up to ordering.
    pub fn deduplicate(self, store: &ReferenceStore) -> Self {
        let mut position: FxHashMap<TripleKey, usize> = FxHashMap::default();
        let mut out: Vec<Mapping> = Vec::with_capacity(self.0.len());
        for mapping in self.0 {
            match position.get(&mapping.key()) {
                Some(&at) => out[at].absorb(mapping, store),
                None => {
                    position.insert(mapping.key(), out.len());
                    out.push(mapping);
                }
            }
        }
        Self(out)
    }

    /// Keep mappings whose predicate is in `allowed`.
    pub fn filter_predicates(self, allowed: &[RefId]) -> Self {
        Self(
            self.0
                .into_iter()
                .filter(|m| allowed.contains(&m.predicate()))
                .collect(),
        )
    }

    /// Keep/remove mappings by subject and/or object prefix.
    pub fn filter_prefixes(self, filter: &PrefixFilter, store: &ReferenceStore) -> Self {
        if filter.is_noop() {
            return self;
        }
        // Prefixes never interned cannot match any reference.
        let keep: Vec<_> = filter
            .keep
            .iter()
            .filter_map(|p| store.prefix_handle(p))
            .collect();
        let keep_unmatchable = !filter.keep.is_empty() && keep.is_empty();
        let remove: Vec<_> = filter
            .remove
            .iter()
            .filter_map(|p| store.prefix_handle(p))
            .collect();

        let side_ok = |id: RefId| {
            let prefix = store.prefix_of(id);
            if keep_unmatchable {
                return false;
            }
            if !keep.is_empty() && !keep.contains(&prefix) {
                return false;
            }
            !remove.contains(&prefix)
        };

        Self(
            self.0
                .into_iter()
                .filter(|m| {
                    (!filter.subjects || side_ok(m.subject()))
                        && (!filter.objects || side_ok(m.object()))
                })
                .collect(),
        )
    }

    /// Drop `subject == object` mappings. These should already be absent.
    pub fn filter_self_mappings(self) -> Self {
        Self(
            self.0
                .into_iter()
                .filter(|m| m.subject() != m.object())
                .collect(),
        )
    }

    /// Drop mappings whose aggregate confidence is below `threshold`,
    /// resolving evidence parents against this collection itself.
    pub fn filter_min_confidence(self, threshold: f64) -> Self {
        let keep: Vec<bool> = {
            let index = MappingIndex::build(&self);
            self.0
                .iter()
                .map(|m| crate::confidence::aggregate_confidence(m.key(), &index) >= threshold)
                .collect()
        };
        Self(
            self.0
                .into_iter()
                .zip(keep)
                .filter_map(|(m, keep)| keep.then_some(m))
                .collect(),
        )
    }

    /// Like [`filter_min_confidence`](Self::filter_min_confidence), but
    /// resolving evidence parents against a wider collection, typically the
    /// full inference closure, so that filtering a parent out of this
    /// collection does not zero its children.
    pub fn filter_min_confidence_with(
        self,
        threshold: f64,
        resolution: &MappingIndex<'_>,
    ) -> Self {
        Self(
            self.0
                .into_iter()
                .filter(|m| {
                    crate::confidence::aggregate_confidence(m.key(), resolution) >= threshold
                })
                .collect(),
        )
    }

    /// Mappings from `source_prefix` subjects to `target_prefix` objects,
    /// inverting reversible mappings that point the other way.
    pub fn project(
        self,
        source_prefix: &str,
        target_prefix: &str,
        table: &PredicateTable,
        voc: &Vocabulary,
        store: &ReferenceStore,
    ) -> Self {
        let (Some(source), Some(target)) = (
            store.prefix_handle(source_prefix),
            store.prefix_handle(target_prefix),
        ) else {
            return Self::new();
        };

        let mut out = Vec::new();
        for mapping in self.0 {
            let sp = store.prefix_of(mapping.subject());
            let op = store.prefix_of(mapping.object());
            if sp == source && op == target {
                out.push(mapping);
            } else if sp == target && op == source {
                if let Some(inverse) = mapping.inverted(table, voc, store) {
                    out.push(inverse);
                }
            }
        }
        Self(out).deduplicate(store)
    }
}

impl IntoIterator for Mappings {
    type Item = Mapping;
    type IntoIter = std::vec::IntoIter<Mapping>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a Mappings {
    type Item = &'a Mapping;
    type IntoIter = std::slice::Iter<'a, Mapping>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl FromIterator<Mapping> for Mappings {
    fn from_iter<T: IntoIterator<Item = Mapping>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}
