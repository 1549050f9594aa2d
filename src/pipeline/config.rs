//! The declarative assembly configuration document.
//!
//! A configuration names its inputs, the prefix priority order, predicate
//! mutations, filters, and output artifact paths. It deserializes from TOML
//! and is validated in full before any stage runs.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{KhipuResult, PipelineError};
use crate::source::SourceDescriptor;
use crate::vocab::curies;

/// One predicate-mutation rule, with predicates named by CURIE.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MutationConfig {
    /// Subject prefix the rule applies to.
    pub source_prefix: String,
    /// Object prefix the rule applies to; any prefix when omitted.
    #[serde(default)]
    pub target_prefix: Option<String>,
    /// Predicate to rewrite; defaults to the database cross-reference.
    #[serde(default = "default_old_predicate")]
    pub old_predicate: String,
    /// Replacement predicate; defaults to exact match.
    #[serde(default = "default_new_predicate")]
    pub new_predicate: String,
    /// Rule confidence factor.
    #[serde(default = "default_mutation_confidence")]
    pub confidence: f64,
}

fn default_old_predicate() -> String {
    curies::DB_XREF.to_owned()
}

fn default_new_predicate() -> String {
    curies::EXACT_MATCH.to_owned()
}

fn default_mutation_confidence() -> f64 {
    0.7
}

/// Metadata for a predicate declared by the configuration.
///
/// Undeclared flags default to an opaque predicate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredicateConfig {
    pub curie: String,
    #[serde(default)]
    pub symmetric: bool,
    #[serde(default)]
    pub transitive: bool,
    #[serde(default)]
    pub inverse: Option<String>,
    #[serde(default)]
    pub generalizes_to: Option<String>,
}

/// A full assembly configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Configuration {
    /// Human-readable name.
    pub name: String,
    /// Identifier used in output paths.
    pub key: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub creators: Vec<String>,

    /// Input sources, in read order.
    #[serde(default)]
    pub inputs: Vec<SourceDescriptor>,
    /// Prefix priority order, highest first.
    #[serde(default)]
    pub priority: Vec<String>,
    /// Predicate-mutation rules.
    #[serde(default)]
    pub mutations: Vec<MutationConfig>,
    /// Per-prefix hierarchy roots restricting each source vocabulary.
    #[serde(default)]
    pub subsets: BTreeMap<String, Vec<String>>,

    /// Pre-inference prefix filters (applied to both sides).
    #[serde(default)]
    pub keep_prefixes: Vec<String>,
    #[serde(default)]
    pub remove_prefixes: Vec<String>,
    /// Post-inference prefix filters.
    #[serde(default)]
    pub post_keep_prefixes: Vec<String>,
    #[serde(default)]
    pub post_remove_prefixes: Vec<String>,

    /// Drop database cross-references after inference.
    #[serde(default)]
    pub remove_imprecise: bool,
    /// Drop mappings with aggregate confidence below this after inference.
    #[serde(default)]
    pub min_confidence: Option<f64>,
    /// Inference round budget.
    #[serde(default = "default_max_rounds")]
    pub max_rounds: usize,
    /// Continue when a source reports a transient failure.
    #[serde(default)]
    pub skip_unavailable_sources: bool,

    /// Equivalence predicate CURIEs; empty means the built-in default set.
    #[serde(default)]
    pub equivalence_predicates: Vec<String>,
    /// Extra predicates with explicit metadata.
    #[serde(default)]
    pub predicates: Vec<PredicateConfig>,

    /// Root against which artifact paths resolve.
    #[serde(default)]
    pub data_root: Option<PathBuf>,
    #[serde(default)]
    pub raw_path: Option<PathBuf>,
    #[serde(default)]
    pub processed_path: Option<PathBuf>,
    #[serde(default)]
    pub priority_path: Option<PathBuf>,
}

fn default_max_rounds() -> usize {
    5
}

impl Configuration {
    /// A minimal configuration with the given name and key.
    pub fn new(name: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            key: key.into(),
            description: String::new(),
            creators: Vec::new(),
            inputs: Vec::new(),
            priority: Vec::new(),
            mutations: Vec::new(),
            subsets: BTreeMap::new(),
            keep_prefixes: Vec::new(),
            remove_prefixes: Vec::new(),
            post_keep_prefixes: Vec::new(),
            post_remove_prefixes: Vec::new(),
            remove_imprecise: false,
            min_confidence: None,
            max_rounds: default_max_rounds(),
            skip_unavailable_sources: false,
            equivalence_predicates: Vec::new(),
            predicates: Vec::new(),
            data_root: None,
            raw_path: None,
            processed_path: None,
            priority_path: None,
        }
    }

    /// Parse a configuration from a TOML document.
    pub fn from_toml_str(document: &str) -> KhipuResult<Self> {
        toml::from_str(document).map_err(|e| {
            PipelineError::InvalidConfiguration {
                message: format!("TOML parse error: {e}"),
            }
            .into()
        })
    }

    /// Resolve an artifact path against the data root.
    ///
    /// Configured absolute paths are treated as hints: only the file name is
    /// kept and re-rooted when a data root is set.
    pub fn resolve_artifact_path(&self, path: &Path) -> PathBuf {
        match &self.data_root {
            None => path.to_path_buf(),
            Some(root) => {
                if path.is_absolute() {
                    match path.file_name() {
                        Some(name) => root.join(name),
                        None => root.clone(),
                    }
                } else {
                    root.join(path)
                }
            }
        }
    }

    /// Structural validation, run before any stage.
    pub fn validate(&self) -> KhipuResult<()> {
        let invalid = |message: String| -> KhipuResult<()> {
            Err(PipelineError::InvalidConfiguration { message }.into())
        };

        if self.key.is_empty() {
            return invalid("key must not be empty".into());
        }
        if self.key.contains(['/', '\\']) || self.key.contains(char::is_whitespace) {
            return invalid(format!(
                "key {:?} must be usable in output paths (no separators or whitespace)",
                self.key
            ));
        }

        if let Some(threshold) = self.min_confidence {
            if !(0.0..=1.0).contains(&threshold) {
                return invalid(format!("min_confidence {threshold} outside [0, 1]"));
            }
        }

        for input in &self.inputs {
            if !(0.0..=1.0).contains(&input.confidence) {
                return invalid(format!(
                    "input {:?} confidence {} outside [0, 1]",
                    input.source_kind, input.confidence
                ));
            }
        }

        for mutation in &self.mutations {
            if !(0.0..=1.0).contains(&mutation.confidence) {
                return invalid(format!(
                    "mutation on {:?} confidence {} outside [0, 1]",
                    mutation.source_prefix, mutation.confidence
                ));
            }
        }

        for prefix in &self.keep_prefixes {
            if self.remove_prefixes.contains(prefix) {
                return invalid(format!(
                    "prefix {prefix:?} appears in both keep_prefixes and remove_prefixes"
                ));
            }
        }
        for prefix in &self.post_keep_prefixes {
            if self.post_remove_prefixes.contains(prefix) {
                return invalid(format!(
                    "prefix {prefix:?} appears in both post_keep_prefixes and post_remove_prefixes"
                ));
            }
        }

        // When every input declares its prefix, priority entries must be
        // covered by some input or mutation target.
        if !self.inputs.is_empty() && self.inputs.iter().all(|i| i.prefix.is_some()) {
            for prefix in &self.priority {
                let declared = self
                    .inputs
                    .iter()
                    .any(|i| i.prefix.as_deref() == Some(prefix.as_str()));
                let mutated = self
                    .mutations
                    .iter()
                    .any(|m| m.target_prefix.as_deref() == Some(prefix.as_str()));
                if !declared && !mutated {
                    return invalid(format!(
                        "priority prefix {prefix:?} is not covered by any input"
                    ));
                }
            }
        }

        Ok(())
    }
}
