//! # khipu
//!
//! A semantic mapping assembly engine: gathers `(subject, predicate, object)`
//! mappings between controlled vocabularies from many sources, enriches them
//! with logically entailed mappings, propagates confidence across alternative
//! derivations, and collapses each equivalence class onto a canonical
//! reference for downstream identifier standardization.
//!
//! ## Architecture
//!
//! - **References** (`reference`): interned `prefix:identifier` identities
//! - **Evidence & mappings** (`evidence`, `mapping`): triples with
//!   content-addressed justification records
//! - **Inference** (`infer`): inversion, mutation, generalization, and
//!   transitive chaining to a fixed point
//! - **Confidence** (`confidence`): noisy-or aggregation, resolved live
//!   against the collection
//! - **Graph core** (`graph`): equivalence components via union-find
//! - **Prioritization** (`prioritize`): star-shaped canonical mappings
//! - **Landscape** (`landscape`): coverage and unique-entity analysis
//! - **Pipeline** (`pipeline`): declarative configuration driving
//!   read → infer → filter → prioritize → summarize
//!
//! ## Library usage
//!
//! ```
//! use khipu::cancel::Cancellation;
//! use khipu::evidence::Evidence;
//! use khipu::infer::{InferenceEngine, InferenceOptions};
//! use khipu::mapping::{Mapping, Mappings, TripleKey};
//! use khipu::reference::ReferenceStore;
//! use khipu::vocab::{PredicateTable, Vocabulary};
//!
//! let store = ReferenceStore::new();
//! let voc = Vocabulary::intern(&store).unwrap();
//! let table = PredicateTable::builtin(&voc);
//!
//! let doid = store.intern_curie("doid:0050577").unwrap();
//! let mesh = store.intern_curie("mesh:C562966").unwrap();
//! let mapping = Mapping::with_evidence(
//!     TripleKey::new(doid, voc.exact_match, mesh),
//!     Evidence::simple(voc.manual_curation, 0.95),
//! )
//! .unwrap();
//!
//! let engine = InferenceEngine::new(&store, &table, &voc);
//! let outcome = engine
//!     .run(
//!         Mappings::from_vec(vec![mapping]),
//!         &InferenceOptions::default(),
//!         &Cancellation::new(),
//!     )
//!     .unwrap();
//! assert_eq!(outcome.mappings.len(), 2); // the original and its inverse
//! ```

pub mod cancel;
pub mod confidence;
pub mod error;
pub mod evidence;
pub mod graph;
pub mod index;
pub mod infer;
pub mod io;
pub mod landscape;
pub mod mapping;
pub mod pipeline;
pub mod prioritize;
pub mod reference;
pub mod source;
pub mod vocab;
