//! The assembly pipeline: read → infer → filter → prioritize → summarize.
//!
//! The driver executes a [`Configuration`] against a [`SourceRegistry`],
//! materializing the raw, processed, and priority collections in turn. Each
//! stage is a pure function of its input collection plus the configuration;
//! artifacts already handed to the sink stay valid even when a later stage
//! is cancelled.

pub mod config;

pub use config::{Configuration, MutationConfig, PredicateConfig};

use std::path::{Path, PathBuf};

use crate::cancel::Cancellation;
use crate::error::{KhipuResult, PipelineError, SourceError};
use crate::graph::EquivalenceGraph;
use crate::graph::components::connected_components;
use crate::infer::{InferenceEngine, InferenceOptions, MutationRule};
use crate::index::MappingIndex;
use crate::landscape::{LandscapeSummary, TermProvider, analyze};
use crate::mapping::{Mappings, PrefixFilter};
use crate::prioritize::{PriorityList, prioritize};
use crate::reference::{RefId, ReferenceStore};
use crate::source::SourceRegistry;
use crate::vocab::{PredicateSpec, PredicateTable, Vocabulary};

// ---------------------------------------------------------------------------
// Artifacts & sinks
// ---------------------------------------------------------------------------

/// Which materialized collection a sink is receiving.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Raw,
    Processed,
    Priority,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Raw => "raw",
            Stage::Processed => "processed",
            Stage::Priority => "priority",
        }
    }
}

/// Receives materialized collections as stages complete.
///
/// Serializers implement this; the core hands over each collection exactly
/// once, together with the artifact path resolved from the configuration.
pub trait ArtifactSink {
    fn write(
        &self,
        stage: Stage,
        path: Option<&Path>,
        mappings: &Mappings,
        store: &ReferenceStore,
    ) -> KhipuResult<()>;
}

/// Everything an assembly run produces.
#[derive(Debug)]
pub struct AssemblyArtifacts {
    /// Concatenated, deduplicated, pre-filtered input mappings.
    pub raw: Mappings,
    /// The inferred and post-filtered collection.
    pub processed: Mappings,
    /// The star-shaped prioritization mapping.
    pub priority: Mappings,
    /// Landscape summary, when a term provider was supplied.
    pub landscape: Option<LandscapeSummary>,
    /// Inference rounds executed.
    pub inference_rounds: usize,
    /// Whether inference reached a fixed point within its budget.
    pub inference_fixed_point: bool,
}

// ---------------------------------------------------------------------------
// Assembler
// ---------------------------------------------------------------------------

/// Drives one configuration through all stages.
pub struct Assembler<'a> {
    config: &'a Configuration,
    registry: &'a SourceRegistry,
    store: &'a ReferenceStore,
    terms: Option<&'a dyn TermProvider>,
    sink: Option<&'a dyn ArtifactSink>,
}

impl<'a> Assembler<'a> {
    pub fn new(
        config: &'a Configuration,
        registry: &'a SourceRegistry,
        store: &'a ReferenceStore,
    ) -> Self {
        Self {
            config,
            registry,
            store,
            terms: None,
            sink: None,
        }
    }

    /// Enable the landscape stage with the given term provider.
    pub fn with_terms(mut self, terms: &'a dyn TermProvider) -> Self {
        self.terms = Some(terms);
        self
    }

    /// Stream materialized artifacts into a sink.
    pub fn with_sink(mut self, sink: &'a dyn ArtifactSink) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Run every stage, returning all materialized artifacts.
    pub fn run(&self, cancel: &Cancellation) -> KhipuResult<AssemblyArtifacts> {
        self.config.validate()?;

        let voc = Vocabulary::intern(self.store)?;
        let mut table = PredicateTable::builtin(&voc);
        self.register_config_predicates(&mut table)?;
        let mutations = self.resolve_mutations(&table)?;
        let equivalence = self.resolve_equivalence(&voc)?;

        // --- read ---
        self.checkpoint(cancel, Stage::Raw)?;
        let raw = self.read_sources()?;
        let raw = raw
            .deduplicate(self.store)
            .filter_self_mappings()
            .filter_prefixes(
                &PrefixFilter::both()
                    .keeping(self.config.keep_prefixes.iter().cloned())
                    .removing(self.config.remove_prefixes.iter().cloned()),
                self.store,
            );
        tracing::info!(mappings = raw.len(), "raw collection materialized");
        self.emit(Stage::Raw, self.config.raw_path.as_deref(), &raw)?;

        // --- infer ---
        self.checkpoint(cancel, Stage::Processed)?;
        let engine = InferenceEngine::new(self.store, &table, &voc);
        let options = InferenceOptions {
            max_rounds: self.config.max_rounds,
            mutations,
        };
        let outcome = engine.run(raw.clone(), &options, cancel)?;

        // --- post-filter ---
        // The full closure stays around for confidence resolution, so that
        // dropping a parent from the processed set does not zero its children.
        let closure = outcome.mappings.clone();
        let closure_index = MappingIndex::build(&closure);
        let mut processed = outcome.mappings.filter_prefixes(
            &PrefixFilter::both()
                .keeping(self.config.post_keep_prefixes.iter().cloned())
                .removing(self.config.post_remove_prefixes.iter().cloned()),
            self.store,
        );
        if self.config.remove_imprecise {
            processed = processed
                .into_iter()
                .filter(|m| m.predicate() != voc.db_xref)
                .collect();
        }
        if let Some(threshold) = self.config.min_confidence {
            processed = processed.filter_min_confidence_with(threshold, &closure_index);
        }
        tracing::info!(
            mappings = processed.len(),
            rounds = outcome.rounds,
            fixed_point = outcome.fixed_point,
            "processed collection materialized"
        );
        self.emit(
            Stage::Processed,
            self.config.processed_path.as_deref(),
            &processed,
        )?;

        // --- prioritize ---
        self.checkpoint(cancel, Stage::Priority)?;
        let graph = EquivalenceGraph::build_with(&processed, &closure_index, &equivalence);
        let components = connected_components(&graph, self.store);
        let priority_list = PriorityList::new(self.config.priority.iter().cloned());
        let priority = prioritize(&graph, &components, &priority_list, &voc, self.store);
        tracing::info!(
            components = components.len(),
            mappings = priority.len(),
            "priority collection materialized"
        );
        self.emit(
            Stage::Priority,
            self.config.priority_path.as_deref(),
            &priority,
        )?;

        // --- landscape ---
        let landscape = self.terms.map(|terms| {
            let prefixes = self.landscape_prefixes();
            analyze(
                &raw,
                &processed,
                &prefixes,
                voc.exact_match,
                &equivalence,
                terms,
                self.store,
            )
        });

        Ok(AssemblyArtifacts {
            raw,
            processed,
            priority,
            landscape,
            inference_rounds: outcome.rounds,
            inference_fixed_point: outcome.fixed_point,
        })
    }

    fn checkpoint(&self, cancel: &Cancellation, stage: Stage) -> KhipuResult<()> {
        if cancel.is_cancelled() {
            return Err(PipelineError::Cancelled {
                stage: stage.as_str().to_owned(),
            }
            .into());
        }
        Ok(())
    }

    fn emit(&self, stage: Stage, path: Option<&Path>, mappings: &Mappings) -> KhipuResult<()> {
        if let Some(sink) = self.sink {
            let resolved: Option<PathBuf> = path.map(|p| self.config.resolve_artifact_path(p));
            sink.write(stage, resolved.as_deref(), mappings, self.store)?;
        }
        Ok(())
    }

    fn read_sources(&self) -> KhipuResult<Mappings> {
        let mut all = Mappings::new();
        for descriptor in &self.config.inputs {
            let adapter = self.registry.get(&descriptor.source_kind)?;
            let roots = descriptor
                .prefix
                .as_deref()
                .and_then(|p| self.config.subsets.get(p))
                .map(Vec::as_slice)
                .unwrap_or(&[]);
            match adapter.read(descriptor, roots, self.store) {
                Ok(mappings) => {
                    tracing::debug!(
                        source = %descriptor.source_kind,
                        prefix = descriptor.prefix.as_deref().unwrap_or("-"),
                        mappings = mappings.len(),
                        "source read"
                    );
                    all.extend(mappings);
                }
                Err(SourceError::Unavailable { kind, message })
                    if self.config.skip_unavailable_sources =>
                {
                    tracing::warn!(source = %kind, error = %message, "skipping unavailable source");
                }
                Err(error) => return Err(error.into()),
            }
        }
        Ok(all)
    }

    fn register_config_predicates(&self, table: &mut PredicateTable) -> KhipuResult<()> {
        for declared in &self.config.predicates {
            let predicate = self.store.intern_curie(&declared.curie)?;
            let inverse = declared
                .inverse
                .as_deref()
                .map(|c| self.store.intern_curie(c))
                .transpose()?;
            let generalizes_to = declared
                .generalizes_to
                .as_deref()
                .map(|c| self.store.intern_curie(c))
                .transpose()?;
            table.register(
                predicate,
                PredicateSpec {
                    symmetric: declared.symmetric,
                    transitive: declared.transitive,
                    inverse,
                    generalizes_to,
                },
            );
        }
        Ok(())
    }

    fn resolve_mutations(&self, table: &PredicateTable) -> KhipuResult<Vec<MutationRule>> {
        self.config
            .mutations
            .iter()
            .map(|declared| {
                let old_predicate = self.store.intern_curie(&declared.old_predicate)?;
                let new_predicate = self.store.intern_curie(&declared.new_predicate)?;
                for (curie, predicate) in [
                    (&declared.old_predicate, old_predicate),
                    (&declared.new_predicate, new_predicate),
                ] {
                    if !table.is_known(predicate) {
                        return Err(PipelineError::InvalidConfiguration {
                            message: format!("mutation references unknown predicate {curie:?}"),
                        }
                        .into());
                    }
                }
                Ok(MutationRule {
                    source_prefix: declared.source_prefix.clone(),
                    target_prefix: declared.target_prefix.clone(),
                    old_predicate,
                    new_predicate,
                    confidence: declared.confidence,
                })
            })
            .collect()
    }

    fn resolve_equivalence(&self, voc: &Vocabulary) -> KhipuResult<Vec<RefId>> {
        if self.config.equivalence_predicates.is_empty() {
            return Ok(voc.default_equivalence());
        }
        self.config
            .equivalence_predicates
            .iter()
            .map(|curie| self.store.intern_curie(curie))
            .collect()
    }

    fn landscape_prefixes(&self) -> Vec<String> {
        if !self.config.priority.is_empty() {
            return self.config.priority.clone();
        }
        let mut prefixes: Vec<String> = Vec::new();
        for input in &self.config.inputs {
            if let Some(prefix) = &input.prefix {
                if !prefixes.contains(prefix) {
                    prefixes.push(prefix.clone());
                }
            }
        }
        prefixes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{MemoryAdapter, RawAssertion, SourceDescriptor, UnavailableAdapter};

    fn assertion(s: &str, p: &str, o: &str) -> RawAssertion {
        RawAssertion {
            subject: s.into(),
            predicate: p.into(),
            object: o.into(),
            justification: None,
            confidence: None,
        }
    }

    fn registry_with_memory(assertions: Vec<RawAssertion>) -> SourceRegistry {
        let mut registry = SourceRegistry::new();
        registry.register("memory", Box::new(MemoryAdapter::new(assertions)));
        registry
    }

    #[test]
    fn end_to_end_assembly() {
        let store = ReferenceStore::new();
        let registry = registry_with_memory(vec![
            assertion("doid:1", "skos:exactMatch", "mesh:C1"),
            assertion("mesh:C1", "skos:exactMatch", "umls:9"),
        ]);
        let mut config = Configuration::new("test", "test");
        config
            .inputs
            .push(SourceDescriptor::new("memory").with_prefix("doid"));
        config.priority = vec!["doid".into(), "mesh".into(), "umls".into()];

        let artifacts = Assembler::new(&config, &registry, &store)
            .run(&Cancellation::new())
            .unwrap();

        assert_eq!(artifacts.raw.len(), 2);
        assert!(artifacts.inference_fixed_point);
        // Closure over the three-node chain, both directions.
        assert_eq!(artifacts.processed.len(), 6);
        // Two spokes onto doid:1.
        assert_eq!(artifacts.priority.len(), 2);
        let canonical = store.get_parts("doid", "1").unwrap();
        assert!(artifacts.priority.iter().all(|m| m.object() == canonical));
        assert!(artifacts.landscape.is_none());
    }

    #[test]
    fn unknown_source_kind_fails() {
        let store = ReferenceStore::new();
        let registry = SourceRegistry::new();
        let mut config = Configuration::new("test", "test");
        config.inputs.push(SourceDescriptor::new("sssom"));

        let error = Assembler::new(&config, &registry, &store)
            .run(&Cancellation::new())
            .unwrap_err();
        assert!(format!("{error}").contains("sssom"));
    }

    #[test]
    fn unavailable_sources_skip_when_configured() {
        let store = ReferenceStore::new();
        let mut registry = registry_with_memory(vec![assertion(
            "a:1",
            "skos:exactMatch",
            "b:1",
        )]);
        registry.register(
            "flaky",
            Box::new(UnavailableAdapter {
                message: "connection reset".into(),
            }),
        );

        let mut config = Configuration::new("test", "test");
        config.inputs.push(SourceDescriptor::new("flaky"));
        config.inputs.push(SourceDescriptor::new("memory"));

        // Without the flag the failure is fatal.
        let strict = Assembler::new(&config, &registry, &store).run(&Cancellation::new());
        assert!(strict.is_err());

        config.skip_unavailable_sources = true;
        let artifacts = Assembler::new(&config, &registry, &store)
            .run(&Cancellation::new())
            .unwrap();
        assert_eq!(artifacts.raw.len(), 1);
    }

    #[test]
    fn unknown_mutation_predicate_is_invalid_configuration() {
        let store = ReferenceStore::new();
        let registry = registry_with_memory(vec![]);
        let mut config = Configuration::new("test", "test");
        config.mutations.push(MutationConfig {
            source_prefix: "doid".into(),
            target_prefix: None,
            old_predicate: "ex:neverHeardOfIt".into(),
            new_predicate: "skos:exactMatch".into(),
            confidence: 0.9,
        });

        let error = Assembler::new(&config, &registry, &store)
            .run(&Cancellation::new())
            .unwrap_err();
        assert!(format!("{error}").contains("neverHeardOfIt"));
    }

    #[test]
    fn remove_imprecise_drops_xrefs_after_inference() {
        let store = ReferenceStore::new();
        let registry = registry_with_memory(vec![assertion(
            "doid:1",
            "oboinowl:hasDbXref",
            "mesh:C1",
        )]);
        let mut config = Configuration::new("test", "test");
        config.inputs.push(SourceDescriptor::new("memory"));
        config.remove_imprecise = true;
        config.mutations.push(MutationConfig {
            source_prefix: "doid".into(),
            target_prefix: None,
            old_predicate: "oboinowl:hasDbXref".into(),
            new_predicate: "skos:exactMatch".into(),
            confidence: 0.99,
        });

        let artifacts = Assembler::new(&config, &registry, &store)
            .run(&Cancellation::new())
            .unwrap();
        let voc = Vocabulary::intern(&store).unwrap();
        assert!(artifacts
            .processed
            .iter()
            .all(|m| m.predicate() != voc.db_xref));
        // The promoted exact matches survive.
        assert!(artifacts
            .processed
            .iter()
            .any(|m| m.predicate() == voc.exact_match));
    }

    #[test]
    fn cancellation_before_any_stage() {
        let store = ReferenceStore::new();
        let registry = registry_with_memory(vec![]);
        let config = Configuration::new("test", "test");
        let cancel = Cancellation::new();
        cancel.cancel();

        let error = Assembler::new(&config, &registry, &store)
            .run(&cancel)
            .unwrap_err();
        assert!(format!("{error}").contains("cancelled"));
    }
}
