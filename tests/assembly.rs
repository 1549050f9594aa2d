//! End-to-end tests for the khipu assembly pipeline.
//!
//! These exercise the full path from raw source assertions through
//! inference, filtering, prioritization, and the landscape summary,
//! validating the documented behaviors the unit tests only cover piecewise.

use std::path::{Path, PathBuf};

use khipu::cancel::Cancellation;
use khipu::error::KhipuResult;
use khipu::index::MappingIndex;
use khipu::io::{archive, tabular};
use khipu::landscape::StaticTermCounts;
use khipu::mapping::Mappings;
use khipu::pipeline::{ArtifactSink, Assembler, Configuration, MutationConfig, Stage};
use khipu::reference::ReferenceStore;
use khipu::source::{MemoryAdapter, RawAssertion, SourceDescriptor, SourceRegistry};
use khipu::vocab::Vocabulary;

fn assertion(s: &str, p: &str, o: &str) -> RawAssertion {
    RawAssertion {
        subject: s.into(),
        predicate: p.into(),
        object: o.into(),
        justification: None,
        confidence: None,
    }
}

fn memory_registry(assertions: Vec<RawAssertion>) -> SourceRegistry {
    let mut registry = SourceRegistry::new();
    registry.register("memory", Box::new(MemoryAdapter::new(assertions)));
    registry
}

fn basic_config() -> Configuration {
    let mut config = Configuration::new("integration", "integration");
    config.inputs.push(SourceDescriptor::new("memory"));
    config
}

#[test]
fn empty_input_produces_empty_artifacts() {
    let store = ReferenceStore::new();
    let registry = memory_registry(vec![]);
    let config = basic_config();

    let artifacts = Assembler::new(&config, &registry, &store)
        .run(&Cancellation::new())
        .unwrap();

    assert!(artifacts.raw.is_empty());
    assert!(artifacts.processed.is_empty());
    assert!(artifacts.priority.is_empty());
    assert!(artifacts.inference_fixed_point);
}

#[test]
fn shared_subject_closes_to_six_mappings() {
    let store = ReferenceStore::new();
    let registry = memory_registry(vec![
        assertion("a:1", "skos:exactMatch", "b:9"),
        assertion("a:1", "skos:exactMatch", "c:6"),
    ]);
    let config = basic_config();

    let artifacts = Assembler::new(&config, &registry, &store)
        .run(&Cancellation::new())
        .unwrap();

    assert_eq!(artifacts.raw.len(), 2);
    assert_eq!(artifacts.processed.len(), 6);

    // The chained pair is present in both directions, with reasoned
    // evidence citing its parents.
    let voc = Vocabulary::intern(&store).unwrap();
    let b9 = store.get_parts("b", "9").unwrap();
    let c6 = store.get_parts("c", "6").unwrap();
    let chained: Vec<_> = artifacts
        .processed
        .iter()
        .filter(|m| {
            (m.subject() == b9 && m.object() == c6) || (m.subject() == c6 && m.object() == b9)
        })
        .collect();
    assert_eq!(chained.len(), 2);
    for mapping in chained {
        assert_eq!(mapping.predicate(), voc.exact_match);
        assert!(mapping
            .evidence()
            .iter()
            .all(|e| e.is_reasoned() && !e.parents().is_empty()));
    }
}

#[test]
fn xref_mutation_promotes_to_exact_match() {
    let store = ReferenceStore::new();
    let registry = memory_registry(vec![assertion(
        "doid:0050577",
        "oboinowl:hasDbXref",
        "mesh:C562966",
    )]);
    let mut config = basic_config();
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
    let doid = store.get_parts("doid", "0050577").unwrap();
    let mesh = store.get_parts("mesh", "C562966").unwrap();

    let promoted = artifacts
        .processed
        .iter()
        .find(|m| {
            m.subject() == doid && m.predicate() == voc.exact_match && m.object() == mesh
        })
        .expect("promoted mapping present");
    assert!(promoted.evidence().iter().any(|e| e.is_reasoned()));

    // Its inverse is present too.
    assert!(artifacts.processed.iter().any(|m| {
        m.subject() == mesh && m.predicate() == voc.exact_match && m.object() == doid
    }));

    // The promoted mapping resolves to the rule's confidence.
    let index = MappingIndex::build(&artifacts.processed);
    let confidence = khipu::confidence::aggregate_confidence(promoted.key(), &index);
    assert!((confidence - 0.99).abs() < 1e-9);
}

#[test]
fn triangle_prioritizes_onto_highest_priority_prefix() {
    let store = ReferenceStore::new();
    let registry = memory_registry(vec![
        assertion("uberon:X", "skos:exactMatch", "mesh:Y"),
        assertion("mesh:Y", "skos:exactMatch", "ncit:Z"),
        assertion("ncit:Z", "skos:exactMatch", "uberon:X"),
    ]);
    let mut config = basic_config();
    config.priority = vec!["uberon".into(), "mesh".into(), "ncit".into()];

    let artifacts = Assembler::new(&config, &registry, &store)
        .run(&Cancellation::new())
        .unwrap();

    let canonical = store.get_parts("uberon", "X").unwrap();
    assert_eq!(artifacts.priority.len(), 2);
    for mapping in artifacts.priority.iter() {
        assert_eq!(mapping.object(), canonical);
        assert_ne!(mapping.subject(), canonical);
    }

    // Star-graph property: every subject appears at most once.
    let mut subjects: Vec<_> = artifacts.priority.iter().map(|m| m.subject()).collect();
    subjects.sort();
    subjects.dedup();
    assert_eq!(subjects.len(), artifacts.priority.len());
}

#[test]
fn landscape_counts_unique_entities() {
    let store = ReferenceStore::new();
    let registry = memory_registry(vec![
        assertion("a:1", "skos:exactMatch", "b:1"),
        assertion("b:1", "skos:exactMatch", "c:1"),
    ]);
    let mut config = basic_config();
    config.priority = vec!["a".into(), "b".into(), "c".into()];
    // Priority prefixes are only checked against inputs when all inputs
    // declare a prefix; this input spans several.
    let terms = StaticTermCounts::new([("a", 10), ("b", 10), ("c", 10)]);

    let artifacts = Assembler::new(&config, &registry, &store)
        .with_terms(&terms)
        .run(&Cancellation::new())
        .unwrap();

    let landscape = artifacts.landscape.expect("landscape requested");
    assert_eq!(landscape.total_terms, 30);
    assert_eq!(landscape.unique_entities, 28);
    assert!((landscape.reduction_ratio - 2.0 / 30.0).abs() < 1e-12);
    assert_eq!(
        landscape
            .combination_counts
            .get(&vec!["a".to_string(), "b".to_string(), "c".to_string()]),
        Some(&1)
    );
    // After inference, b gains an exact match into a.
    let b = landscape.prefixes.iter().position(|p| p == "b").unwrap();
    let a = landscape.prefixes.iter().position(|p| p == "a").unwrap();
    assert!(landscape.processed_overlap[b][a] >= 1);
}

#[test]
fn min_confidence_filters_weak_mappings() {
    let store = ReferenceStore::new();
    let mut weak = assertion("a:1", "skos:exactMatch", "b:1");
    weak.confidence = Some(0.2);
    let strong = assertion("a:2", "skos:exactMatch", "b:2");
    let registry = memory_registry(vec![weak, strong]);

    let mut config = basic_config();
    config.min_confidence = Some(0.5);

    let artifacts = Assembler::new(&config, &registry, &store)
        .run(&Cancellation::new())
        .unwrap();

    assert_eq!(artifacts.raw.len(), 2);
    let a1 = store.get_parts("a", "1").unwrap();
    assert!(artifacts.processed.iter().all(|m| m.subject() != a1 && m.object() != a1));
    let a2 = store.get_parts("a", "2").unwrap();
    assert!(artifacts.processed.iter().any(|m| m.subject() == a2));
}

// ---------------------------------------------------------------------------
// Serialization round trips
// ---------------------------------------------------------------------------

#[test]
fn tabular_round_trip_preserves_simple_evidence() {
    let store = ReferenceStore::new();
    let registry = memory_registry(vec![
        assertion("doid:1", "skos:exactMatch", "mesh:C1"),
        assertion("doid:2", "oboinowl:hasDbXref", "mesh:C2"),
    ]);
    let config = basic_config();
    let artifacts = Assembler::new(&config, &registry, &store)
        .run(&Cancellation::new())
        .unwrap();

    let rows = tabular::rows_from_mappings(&artifacts.raw, &store);
    let rebuilt = tabular::mappings_from_rows(rows, &store).unwrap();
    assert_eq!(rebuilt.len(), artifacts.raw.len());
    for (a, b) in artifacts.raw.iter().zip(rebuilt.iter()) {
        assert_eq!(a.key(), b.key());
        assert_eq!(a.evidence().len(), b.evidence().len());
    }
}

#[test]
fn archive_round_trip_preserves_reasoned_evidence() {
    let store = ReferenceStore::new();
    let registry = memory_registry(vec![
        assertion("a:1", "skos:exactMatch", "b:9"),
        assertion("a:1", "skos:exactMatch", "c:6"),
    ]);
    let config = basic_config();
    let artifacts = Assembler::new(&config, &registry, &store)
        .run(&Cancellation::new())
        .unwrap();

    let mut buffer = Vec::new();
    archive::write_archive(&mut buffer, &artifacts.processed, &store).unwrap();
    let rebuilt = archive::read_archive(buffer.as_slice(), &store).unwrap();

    assert_eq!(rebuilt.len(), artifacts.processed.len());
    let hashes = |mappings: &Mappings| {
        let mut all: Vec<_> = mappings
            .iter()
            .flat_map(|m| m.evidence().iter().map(|e| e.content_hash(&store)))
            .collect();
        all.sort();
        all
    };
    assert_eq!(hashes(&artifacts.processed), hashes(&rebuilt));
}

// ---------------------------------------------------------------------------
// Cancellation
// ---------------------------------------------------------------------------

/// Sink that writes each artifact as an archive file and fires the
/// cancellation token right after the raw artifact lands.
struct CancelAfterRawSink {
    directory: PathBuf,
    token: Cancellation,
}

impl ArtifactSink for CancelAfterRawSink {
    fn write(
        &self,
        stage: Stage,
        _path: Option<&Path>,
        mappings: &Mappings,
        store: &ReferenceStore,
    ) -> KhipuResult<()> {
        let target = self.directory.join(format!("{}.jsonl", stage.as_str()));
        let file = std::fs::File::create(&target)
            .map_err(|source| khipu::error::ExportError::Io { source })?;
        archive::write_archive(std::io::BufWriter::new(file), mappings, store)?;
        if stage == Stage::Raw {
            self.token.cancel();
        }
        Ok(())
    }
}

#[test]
fn cancellation_during_inference_keeps_raw_artifact_only() {
    let directory = tempfile::TempDir::new().unwrap();
    let store = ReferenceStore::new();
    let registry = memory_registry(vec![
        assertion("a:1", "skos:exactMatch", "b:1"),
        assertion("b:1", "skos:exactMatch", "c:1"),
    ]);
    let config = basic_config();

    let token = Cancellation::new();
    let sink = CancelAfterRawSink {
        directory: directory.path().to_path_buf(),
        token: token.clone(),
    };

    let result = Assembler::new(&config, &registry, &store)
        .with_sink(&sink)
        .run(&token);
    assert!(result.is_err());

    let raw_path = directory.path().join("raw.jsonl");
    assert!(raw_path.exists());
    assert!(!directory.path().join("processed.jsonl").exists());
    assert!(!directory.path().join("priority.jsonl").exists());

    // The materialized raw artifact is valid and loadable.
    let file = std::fs::File::open(raw_path).unwrap();
    let rebuilt = archive::read_archive(std::io::BufReader::new(file), &store).unwrap();
    assert_eq!(rebuilt.len(), 2);
}
