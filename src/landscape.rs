//! Landscape analysis: joint coverage of a set of vocabularies.
//!
//! Counts how many distinct entities each vocabulary maps into each other
//! vocabulary (before and after processing), estimates the number of unique
//! entities once equivalent terms are merged, and tallies components per
//! prefix combination for UpSet-style plots.

use std::collections::BTreeMap;

use petgraph::unionfind::UnionFind;
use rustc_hash::{FxHashMap, FxHashSet};

use crate::mapping::Mappings;
use crate::reference::{RefId, ReferenceStore};

// ---------------------------------------------------------------------------
// Term providers
// ---------------------------------------------------------------------------

/// Read-only source of per-prefix term-count estimates.
///
/// Shared across threads; the analyzer only ever reads.
pub trait TermProvider: Sync {
    /// Total number of terms in the vocabulary, or `None` if unknown.
    fn term_count(&self, prefix: &str) -> Option<u64>;
}

/// Fixed term counts supplied up front.
#[derive(Debug, Clone, Default)]
pub struct StaticTermCounts(FxHashMap<String, u64>);

impl StaticTermCounts {
    pub fn new(counts: impl IntoIterator<Item = (impl Into<String>, u64)>) -> Self {
        Self(counts.into_iter().map(|(p, n)| (p.into(), n)).collect())
    }
}

impl TermProvider for StaticTermCounts {
    fn term_count(&self, prefix: &str) -> Option<u64> {
        self.0.get(prefix).copied()
    }
}

// ---------------------------------------------------------------------------
// Summary
// ---------------------------------------------------------------------------

/// Everything the landscape analysis produces.
///
/// Matrices are indexed by position in `prefixes`.
#[derive(Debug, Clone)]
pub struct LandscapeSummary {
    /// The analyzed prefixes, in input order.
    pub prefixes: Vec<String>,
    /// Term-count estimate per prefix; falls back to the number of observed
    /// participating terms when the provider has no estimate.
    pub term_counts: Vec<u64>,
    /// `raw_overlap[p][q]`: distinct subjects of prefix `p` with at least one
    /// exact match into prefix `q`, before inference. Diagonal = term count.
    pub raw_overlap: Vec<Vec<u64>>,
    /// Same, after inference and filtering.
    pub processed_overlap: Vec<Vec<u64>>,
    /// Element-wise `processed_overlap − raw_overlap`.
    pub gains: Vec<Vec<i64>>,
    /// `100 × gains / raw`, with `+∞` for 0 → nonzero and `NaN` for 0 → 0.
    pub percent_gains: Vec<Vec<f64>>,
    /// Estimated number of distinct entities across all analyzed prefixes.
    pub unique_entities: u64,
    /// Sum of term counts.
    pub total_terms: u64,
    /// `(total_terms − unique_entities) / total_terms`; 0 for empty input.
    pub reduction_ratio: f64,
    /// For each set of prefixes, the number of equivalence components whose
    /// members span exactly those prefixes. Keys are sorted prefix lists.
    pub combination_counts: BTreeMap<Vec<String>, u64>,
}

// ---------------------------------------------------------------------------
// Analysis
// ---------------------------------------------------------------------------

/// Analyze the landscape over `prefixes`.
///
/// `exact` is the overlap predicate (exact match); `equivalence` is the
/// predicate set defining the merge graph.
pub fn analyze(
    raw: &Mappings,
    processed: &Mappings,
    prefixes: &[String],
    exact: RefId,
    equivalence: &[RefId],
    terms: &dyn TermProvider,
    store: &ReferenceStore,
) -> LandscapeSummary {
    let n = prefixes.len();
    let prefix_index: FxHashMap<&str, usize> = prefixes
        .iter()
        .enumerate()
        .map(|(at, p)| (p.as_str(), at))
        .collect();

    // --- Merge graph over the processed equivalence mappings ---
    let mut node_index: FxHashMap<RefId, usize> = FxHashMap::default();
    let mut node_prefix: Vec<usize> = Vec::new();
    let mut edges: Vec<(usize, usize)> = Vec::new();
    for mapping in processed.iter() {
        if !equivalence.contains(&mapping.predicate()) {
            continue;
        }
        let Some(&sp) = prefix_index.get(store.prefix_str(mapping.subject())) else {
            continue;
        };
        let Some(&op) = prefix_index.get(store.prefix_str(mapping.object())) else {
            continue;
        };
        let mut local = |id: RefId, prefix_at: usize| -> usize {
            *node_index.entry(id).or_insert_with(|| {
                node_prefix.push(prefix_at);
                node_prefix.len() - 1
            })
        };
        let s = local(mapping.subject(), sp);
        let o = local(mapping.object(), op);
        edges.push((s, o));
    }

    let mut sets: UnionFind<usize> = UnionFind::new(node_prefix.len());
    for &(s, o) in &edges {
        sets.union(s, o);
    }

    let mut participating = vec![0u64; n];
    for &prefix_at in &node_prefix {
        participating[prefix_at] += 1;
    }

    let term_counts: Vec<u64> = prefixes
        .iter()
        .enumerate()
        .map(|(at, prefix)| terms.term_count(prefix).unwrap_or(participating[at]))
        .collect();

    // --- Components and per-combination counts ---
    let mut component_prefixes: FxHashMap<usize, FxHashSet<usize>> = FxHashMap::default();
    for (node, &prefix_at) in node_prefix.iter().enumerate() {
        let root = sets.find_mut(node);
        component_prefixes.entry(root).or_default().insert(prefix_at);
    }
    let component_count = component_prefixes.len() as u64;

    let mut combination_counts: BTreeMap<Vec<String>, u64> = BTreeMap::new();
    for present in component_prefixes.values() {
        let mut combo: Vec<String> = present.iter().map(|&at| prefixes[at].clone()).collect();
        combo.sort();
        *combination_counts.entry(combo).or_insert(0) += 1;
    }

    // --- Unique entities and reduction ---
    let singletons: u64 = (0..n)
        .map(|at| term_counts[at].saturating_sub(participating[at]))
        .sum();
    let unique_entities = component_count + singletons;
    let total_terms: u64 = term_counts.iter().sum();
    let reduction_ratio = if total_terms == 0 {
        0.0
    } else {
        (total_terms - unique_entities.min(total_terms)) as f64 / total_terms as f64
    };

    // --- Overlap matrices ---
    let raw_overlap = overlap_matrix(raw, &prefix_index, &term_counts, n, exact, store);
    let processed_overlap =
        overlap_matrix(processed, &prefix_index, &term_counts, n, exact, store);

    let mut gains = vec![vec![0i64; n]; n];
    let mut percent_gains = vec![vec![0f64; n]; n];
    for p in 0..n {
        for q in 0..n {
            let gain = processed_overlap[p][q] as i64 - raw_overlap[p][q] as i64;
            gains[p][q] = gain;
            percent_gains[p][q] = match (raw_overlap[p][q], gain) {
                (0, 0) => f64::NAN,
                (0, _) => f64::INFINITY,
                (base, _) => 100.0 * gain as f64 / base as f64,
            };
        }
    }

    LandscapeSummary {
        prefixes: prefixes.to_vec(),
        term_counts,
        raw_overlap,
        processed_overlap,
        gains,
        percent_gains,
        unique_entities,
        total_terms,
        reduction_ratio,
        combination_counts,
    }
}

fn overlap_matrix(
    collection: &Mappings,
    prefix_index: &FxHashMap<&str, usize>,
    term_counts: &[u64],
    n: usize,
    exact: RefId,
    store: &ReferenceStore,
) -> Vec<Vec<u64>> {
    let mut subjects: Vec<Vec<FxHashSet<RefId>>> = vec![vec![FxHashSet::default(); n]; n];
    for mapping in collection.iter() {
        if mapping.predicate() != exact {
            continue;
        }
        let Some(&p) = prefix_index.get(store.prefix_str(mapping.subject())) else {
            continue;
        };
        let Some(&q) = prefix_index.get(store.prefix_str(mapping.object())) else {
            continue;
        };
        subjects[p][q].insert(mapping.subject());
    }

    let mut matrix = vec![vec![0u64; n]; n];
    for p in 0..n {
        for q in 0..n {
            matrix[p][q] = if p == q {
                term_counts[p]
            } else {
                subjects[p][q].len() as u64
            };
        }
    }
    matrix
}
