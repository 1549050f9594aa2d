//! Source adapters: where raw mappings come from.
//!
//! The core never performs I/O. An adapter turns a source descriptor into a
//! fully-materialized mapping collection; the registry dispatches on the
//! descriptor's `source_kind`. Transient adapter failures surface as
//! [`SourceError::Unavailable`] and may be skipped per configuration;
//! ill-formed data is [`SourceError::Malformed`] and always fatal.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::SourceError;
use crate::evidence::{Evidence, MappingSetRef};
use crate::mapping::{Mapping, Mappings, TripleKey};
use crate::reference::{Reference, ReferenceStore};

// ---------------------------------------------------------------------------
// Descriptors
// ---------------------------------------------------------------------------

/// Declarative description of one input source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceDescriptor {
    /// Which adapter handles this source.
    pub source_kind: String,
    /// The vocabulary this source covers, when it covers exactly one.
    #[serde(default)]
    pub prefix: Option<String>,
    /// Set-level confidence attached to every mapping from this source.
    #[serde(default = "default_confidence")]
    pub confidence: f64,
    /// Adapter-specific settings.
    #[serde(default)]
    pub extras: BTreeMap<String, String>,
}

fn default_confidence() -> f64 {
    1.0
}

impl SourceDescriptor {
    pub fn new(source_kind: impl Into<String>) -> Self {
        Self {
            source_kind: source_kind.into(),
            prefix: None,
            confidence: 1.0,
            extras: BTreeMap::new(),
        }
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = confidence.clamp(0.0, 1.0);
        self
    }

    /// The mapping-set handle every evidence from this source carries.
    pub fn mapping_set(&self) -> MappingSetRef {
        let name = self
            .prefix
            .clone()
            .unwrap_or_else(|| self.source_kind.clone());
        MappingSetRef::named(name).with_confidence(self.confidence)
    }
}

// ---------------------------------------------------------------------------
// Adapter contract
// ---------------------------------------------------------------------------

/// A source adapter resolves a descriptor into a mapping collection.
///
/// `roots`, when non-empty, restricts the source vocabulary to the
/// sub-hierarchies under the given term CURIEs; adapters without hierarchy
/// information may ignore it.
pub trait SourceAdapter: Send + Sync {
    fn read(
        &self,
        descriptor: &SourceDescriptor,
        roots: &[String],
        store: &ReferenceStore,
    ) -> Result<Mappings, SourceError>;
}

/// Dispatch table from `source_kind` to adapter.
#[derive(Default)]
pub struct SourceRegistry {
    adapters: HashMap<String, Box<dyn SourceAdapter>>,
}

impl SourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an adapter for a source kind, replacing any previous one.
    pub fn register(&mut self, kind: impl Into<String>, adapter: Box<dyn SourceAdapter>) {
        self.adapters.insert(kind.into(), adapter);
    }

    /// Look up the adapter for a kind.
    pub fn get(&self, kind: &str) -> Result<&dyn SourceAdapter, SourceError> {
        self.adapters
            .get(kind)
            .map(|a| a.as_ref())
            .ok_or_else(|| SourceError::UnknownKind { kind: kind.into() })
    }

    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }
}

impl std::fmt::Debug for SourceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceRegistry")
            .field("kinds", &self.adapters.len())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// In-memory adapter
// ---------------------------------------------------------------------------

/// One raw assertion handed to the in-memory adapter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawAssertion {
    pub subject: String,
    pub predicate: String,
    pub object: String,
    /// Match-type justification CURIE; defaults to manual curation.
    #[serde(default)]
    pub justification: Option<String>,
    /// Row-level confidence; defaults to 1.0.
    #[serde(default)]
    pub confidence: Option<f64>,
}

/// Deterministic adapter over pre-loaded assertions.
///
/// The reference implementation of the adapter contract, and the workhorse
/// for tests. In lenient mode malformed rows are skipped with a warning;
/// in strict mode they fail the whole source.
pub struct MemoryAdapter {
    assertions: Vec<RawAssertion>,
    lenient: bool,
}

impl MemoryAdapter {
    pub fn new(assertions: Vec<RawAssertion>) -> Self {
        Self {
            assertions,
            lenient: false,
        }
    }

    /// Skip malformed rows instead of failing the source.
    pub fn lenient(mut self) -> Self {
        self.lenient = true;
        self
    }
}

impl SourceAdapter for MemoryAdapter {
    fn read(
        &self,
        descriptor: &SourceDescriptor,
        _roots: &[String],
        store: &ReferenceStore,
    ) -> Result<Mappings, SourceError> {
        let set = Arc::new(descriptor.mapping_set());
        let malformed = |message: String| SourceError::Malformed {
            kind: descriptor.source_kind.clone(),
            message,
        };

        let mut out = Mappings::new();
        for assertion in &self.assertions {
            let parsed = (|| -> Result<Mapping, String> {
                let subject = Reference::parse(&assertion.subject).map_err(|e| e.to_string())?;
                let predicate =
                    Reference::parse(&assertion.predicate).map_err(|e| e.to_string())?;
                let object = Reference::parse(&assertion.object).map_err(|e| e.to_string())?;
                let justification = assertion
                    .justification
                    .as_deref()
                    .unwrap_or(crate::vocab::curies::MANUAL_CURATION);

                let key = TripleKey::new(
                    store.intern(&subject).map_err(|e| e.to_string())?,
                    store.intern(&predicate).map_err(|e| e.to_string())?,
                    store.intern(&object).map_err(|e| e.to_string())?,
                );
                let evidence = Evidence::from_set(
                    store.intern_curie(justification).map_err(|e| e.to_string())?,
                    assertion.confidence.unwrap_or(1.0),
                    set.clone(),
                );
                Mapping::with_evidence(key, evidence).map_err(|e| e.to_string())
            })();

            match parsed {
                Ok(mapping) => out.push(mapping),
                Err(message) if self.lenient => {
                    tracing::warn!(
                        source = %descriptor.source_kind,
                        error = %message,
                        "skipping malformed assertion"
                    );
                }
                Err(message) => return Err(malformed(message)),
            }
        }
        Ok(out.deduplicate(store))
    }
}

/// Adapter that always reports a transient failure. Exercises the
/// skip-unavailable path.
pub struct UnavailableAdapter {
    pub message: String,
}

impl SourceAdapter for UnavailableAdapter {
    fn read(
        &self,
        descriptor: &SourceDescriptor,
        _roots: &[String],
        _store: &ReferenceStore,
    ) -> Result<Mappings, SourceError> {
        Err(SourceError::Unavailable {
            kind: descriptor.source_kind.clone(),
            message: self.message.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assertion(s: &str, p: &str, o: &str) -> RawAssertion {
        RawAssertion {
            subject: s.into(),
            predicate: p.into(),
            object: o.into(),
            justification: None,
            confidence: None,
        }
    }

    #[test]
    fn memory_adapter_builds_attributed_mappings() {
        let store = ReferenceStore::new();
        let adapter = MemoryAdapter::new(vec![assertion(
            "doid:1",
            "skos:exactMatch",
            "mesh:C1",
        )]);
        let descriptor = SourceDescriptor::new("memory")
            .with_prefix("doid")
            .with_confidence(0.9);

        let mappings = adapter.read(&descriptor, &[], &store).unwrap();
        assert_eq!(mappings.len(), 1);
        let evidence = &mappings.as_slice()[0].evidence()[0];
        match evidence {
            Evidence::Simple { mapping_set, .. } => {
                let set = mapping_set.as_ref().unwrap();
                assert_eq!(set.name, "doid");
                assert_eq!(set.confidence, Some(0.9));
            }
            _ => unreachable!("memory adapter only emits simple evidence"),
        }
    }

    #[test]
    fn strict_adapter_fails_on_malformed_curie() {
        let store = ReferenceStore::new();
        let adapter = MemoryAdapter::new(vec![assertion("nocolon", "skos:exactMatch", "b:1")]);
        let err = adapter
            .read(&SourceDescriptor::new("memory"), &[], &store)
            .unwrap_err();
        assert!(matches!(err, SourceError::Malformed { .. }));
    }

    #[test]
    fn lenient_adapter_skips_malformed_rows() {
        let store = ReferenceStore::new();
        let adapter = MemoryAdapter::new(vec![
            assertion("nocolon", "skos:exactMatch", "b:1"),
            assertion("a:1", "skos:exactMatch", "b:1"),
        ])
        .lenient();
        let mappings = adapter
            .read(&SourceDescriptor::new("memory"), &[], &store)
            .unwrap();
        assert_eq!(mappings.len(), 1);
    }

    #[test]
    fn lenient_adapter_skips_self_mappings() {
        let store = ReferenceStore::new();
        let adapter =
            MemoryAdapter::new(vec![assertion("a:1", "skos:exactMatch", "a:1")]).lenient();
        let mappings = adapter
            .read(&SourceDescriptor::new("memory"), &[], &store)
            .unwrap();
        assert!(mappings.is_empty());
    }

    #[test]
    fn registry_dispatches_and_rejects_unknown_kinds() {
        let mut registry = SourceRegistry::new();
        registry.register("memory", Box::new(MemoryAdapter::new(vec![])));
        assert!(registry.get("memory").is_ok());
        assert!(matches!(
            registry.get("sssom"),
            Err(SourceError::UnknownKind { .. })
        ));
    }
}
