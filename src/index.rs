//! In-memory indexes over a mapping collection.
//!
//! A [`MappingIndex`] borrows a collection and provides O(1) lookups by
//! triple key, subject, object, and `(subject, predicate)`. Indexes are
//! built at the start of a stage, read during it, and discarded with it;
//! they are never carried across bulk transformations.

use rustc_hash::FxHashMap;

use crate::mapping::{Mapping, Mappings, TripleKey};
use crate::reference::RefId;

/// Borrowed index over a mapping collection.
pub struct MappingIndex<'a> {
    mappings: &'a [Mapping],
    by_key: FxHashMap<TripleKey, usize>,
    by_subject: FxHashMap<RefId, Vec<usize>>,
    by_object: FxHashMap<RefId, Vec<usize>>,
    by_subject_predicate: FxHashMap<(RefId, RefId), Vec<usize>>,
}

impl<'a> MappingIndex<'a> {
    /// Build all indexes in a single pass.
    ///
    /// Duplicate triples (in a not-yet-deduplicated collection) resolve to
    /// the first occurrence.
    pub fn build(collection: &'a Mappings) -> Self {
        let mappings = collection.as_slice();
        let mut by_key = FxHashMap::default();
        let mut by_subject: FxHashMap<RefId, Vec<usize>> = FxHashMap::default();
        let mut by_object: FxHashMap<RefId, Vec<usize>> = FxHashMap::default();
        let mut by_subject_predicate: FxHashMap<(RefId, RefId), Vec<usize>> =
            FxHashMap::default();

        for (at, mapping) in mappings.iter().enumerate() {
            by_key.entry(mapping.key()).or_insert(at);
            by_subject.entry(mapping.subject()).or_default().push(at);
            by_object.entry(mapping.object()).or_default().push(at);
            by_subject_predicate
                .entry((mapping.subject(), mapping.predicate()))
                .or_default()
                .push(at);
        }

        Self {
            mappings,
            by_key,
            by_subject,
            by_object,
            by_subject_predicate,
        }
    }

    /// The mapping with the given triple, if present.
    pub fn get(&self, key: TripleKey) -> Option<&'a Mapping> {
        self.by_key.get(&key).map(|&at| &self.mappings[at])
    }

    /// Whether a triple is present.
    pub fn contains(&self, key: TripleKey) -> bool {
        self.by_key.contains_key(&key)
    }

    /// All mappings with the given subject.
    pub fn with_subject(&self, subject: RefId) -> impl Iterator<Item = &'a Mapping> + '_ {
        self.by_subject
            .get(&subject)
            .into_iter()
            .flatten()
            .map(|&at| &self.mappings[at])
    }

    /// All mappings with the given object.
    pub fn with_object(&self, object: RefId) -> impl Iterator<Item = &'a Mapping> + '_ {
        self.by_object
            .get(&object)
            .into_iter()
            .flatten()
            .map(|&at| &self.mappings[at])
    }

    /// All mappings with the given subject and predicate.
    pub fn with_subject_predicate(
        &self,
        subject: RefId,
        predicate: RefId,
    ) -> impl Iterator<Item = &'a Mapping> + '_ {
        self.by_subject_predicate
            .get(&(subject, predicate))
            .into_iter()
            .flatten()
            .map(|&at| &self.mappings[at])
    }

    /// Number of distinct triples.
    pub fn len(&self) -> usize {
        self.by_key.len()
    }

    /// Whether the index is empty.
    pub fn is_empty(&self) -> bool {
        self.by_key.is_empty()
    }
}

impl std::fmt::Debug for MappingIndex<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MappingIndex")
            .field("triples", &self.by_key.len())
            .field("subjects", &self.by_subject.len())
            .field("objects", &self.by_object.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evidence::Evidence;
    use crate::reference::ReferenceStore;
    use crate::vocab::Vocabulary;

    fn collection() -> (ReferenceStore, Vocabulary, Mappings) {
        let store = ReferenceStore::new();
        let voc = Vocabulary::intern(&store).unwrap();
        let a = store.intern_curie("a:1").unwrap();
        let b = store.intern_curie("b:1").unwrap();
        let c = store.intern_curie("c:1").unwrap();

        let mappings = Mappings::from_vec(vec![
            Mapping::with_evidence(
                TripleKey::new(a, voc.exact_match, b),
                Evidence::simple(voc.lexical_matching, 0.9),
            )
            .unwrap(),
            Mapping::with_evidence(
                TripleKey::new(a, voc.exact_match, c),
                Evidence::simple(voc.lexical_matching, 0.8),
            )
            .unwrap(),
            Mapping::with_evidence(
                TripleKey::new(b, voc.db_xref, c),
                Evidence::simple(voc.manual_curation, 1.0),
            )
            .unwrap(),
        ]);
        (store, voc, mappings)
    }

    #[test]
    fn lookup_by_key() {
        let (_store, voc, mappings) = collection();
        let index = MappingIndex::build(&mappings);
        let first = mappings.as_slice()[0].key();
        assert!(index.contains(first));
        assert_eq!(index.get(first).unwrap().predicate(), voc.exact_match);
        assert_eq!(index.len(), 3);
    }

    #[test]
    fn lookup_by_subject_and_pair() {
        let (_store, voc, mappings) = collection();
        let index = MappingIndex::build(&mappings);
        let a = mappings.as_slice()[0].subject();
        assert_eq!(index.with_subject(a).count(), 2);
        assert_eq!(index.with_subject_predicate(a, voc.exact_match).count(), 2);
        assert_eq!(index.with_subject_predicate(a, voc.db_xref).count(), 0);
    }

    #[test]
    fn lookup_by_object() {
        let (_store, _voc, mappings) = collection();
        let index = MappingIndex::build(&mappings);
        let c = mappings.as_slice()[1].object();
        assert_eq!(index.with_object(c).count(), 2);
    }

    #[test]
    fn empty_collection() {
        let mappings = Mappings::new();
        let index = MappingIndex::build(&mappings);
        assert!(index.is_empty());
    }
}
