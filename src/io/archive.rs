//! Line-delimited JSON archive records.
//!
//! One JSON object per line, each a full mapping with all evidences. A
//! reasoned evidence's parents are written as bare triple hashes when the
//! parent mapping appeared earlier in the stream, and inline otherwise, so
//! any split of the stream remains loadable on its own.

use std::io::{BufRead, Write};

use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::error::{ExportError, KhipuResult};
use crate::evidence::{Evidence, MappingSetRef, ParentCombine};
use crate::mapping::{Mapping, Mappings, TripleKey};
use crate::reference::{Reference, ReferenceStore};

/// One archive line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiveRecord {
    pub subject: String,
    pub predicate: String,
    pub object: String,
    pub evidence: Vec<ArchiveEvidence>,
}

/// Serialized evidence.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ArchiveEvidence {
    Simple {
        justification: String,
        confidence: f64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        author: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        mapping_set: Option<MappingSetRef>,
    },
    Reasoned {
        justification: String,
        factor: f64,
        combine: ParentCombine,
        parents: Vec<ArchiveParent>,
    },
}

/// A parent mapping, by back-reference or inline.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ArchiveParent {
    Hash {
        hash: String,
    },
    Inline {
        subject: String,
        predicate: String,
        object: String,
    },
}

/// Stream a collection as line-delimited JSON.
pub fn write_archive<W: Write>(
    mut writer: W,
    mappings: &Mappings,
    store: &ReferenceStore,
) -> KhipuResult<()> {
    let mut emitted: FxHashSet<TripleKey> = FxHashSet::default();
    for mapping in mappings.iter() {
        let record = ArchiveRecord {
            subject: store.curie(mapping.subject()),
            predicate: store.curie(mapping.predicate()),
            object: store.curie(mapping.object()),
            evidence: mapping
                .evidence()
                .iter()
                .map(|evidence| archive_evidence(evidence, &emitted, store))
                .collect(),
        };
        let line = serde_json::to_string(&record).map_err(|e| ExportError::Serialize {
            message: e.to_string(),
        })?;
        writeln!(writer, "{line}").map_err(|source| ExportError::Io { source })?;
        emitted.insert(mapping.key());
    }
    Ok(())
}

fn archive_evidence(
    evidence: &Evidence,
    emitted: &FxHashSet<TripleKey>,
    store: &ReferenceStore,
) -> ArchiveEvidence {
    match evidence {
        Evidence::Simple {
            justification,
            confidence,
            author,
            mapping_set,
        } => ArchiveEvidence::Simple {
            justification: store.curie(*justification),
            confidence: *confidence,
            author: author.map(|a| store.curie(a)),
            mapping_set: mapping_set.as_ref().map(|s| (**s).clone()),
        },
        Evidence::Reasoned {
            justification,
            factor,
            combine,
            parents,
        } => ArchiveEvidence::Reasoned {
            justification: store.curie(*justification),
            factor: *factor,
            combine: *combine,
            parents: parents
                .iter()
                .map(|&parent| {
                    if emitted.contains(&parent) {
                        ArchiveParent::Hash {
                            hash: format!("{:032x}", parent.stable_hash(store)),
                        }
                    } else {
                        ArchiveParent::Inline {
                            subject: store.curie(parent.subject),
                            predicate: store.curie(parent.predicate),
                            object: store.curie(parent.object),
                        }
                    }
                })
                .collect(),
        },
    }
}

/// Load an archive stream back into a deduplicated collection.
pub fn read_archive<R: BufRead>(reader: R, store: &ReferenceStore) -> KhipuResult<Mappings> {
    let mut by_hash: FxHashMap<String, TripleKey> = FxHashMap::default();
    let mut out = Mappings::new();

    for (at, line) in reader.lines().enumerate() {
        let line_number = at + 1;
        let archive_error = |message: String| ExportError::Archive {
            line: line_number,
            message,
        };
        let line = line.map_err(|source| ExportError::Io { source })?;
        if line.trim().is_empty() {
            continue;
        }
        let record: ArchiveRecord =
            serde_json::from_str(&line).map_err(|e| archive_error(e.to_string()))?;

        let key = intern_triple(&record.subject, &record.predicate, &record.object, store)?;
        by_hash.insert(format!("{:032x}", key.stable_hash(store)), key);

        let mut evidence = Vec::with_capacity(record.evidence.len());
        for archived in record.evidence {
            evidence.push(match archived {
                ArchiveEvidence::Simple {
                    justification,
                    confidence,
                    author,
                    mapping_set,
                } => Evidence::Simple {
                    justification: store.intern_curie(&justification)?,
                    confidence,
                    author: author.as_deref().map(|a| store.intern_curie(a)).transpose()?,
                    mapping_set: mapping_set.map(std::sync::Arc::new),
                },
                ArchiveEvidence::Reasoned {
                    justification,
                    factor,
                    combine,
                    parents,
                } => {
                    let mut keys: SmallVec<[TripleKey; 2]> =
                        SmallVec::with_capacity(parents.len());
                    for parent in parents {
                        keys.push(match parent {
                            ArchiveParent::Hash { hash } => {
                                *by_hash.get(&hash).ok_or_else(|| {
                                    archive_error(format!(
                                        "parent hash {hash} not previously emitted"
                                    ))
                                })?
                            }
                            ArchiveParent::Inline {
                                subject,
                                predicate,
                                object,
                            } => intern_triple(&subject, &predicate, &object, store)?,
                        });
                    }
                    Evidence::Reasoned {
                        justification: store.intern_curie(&justification)?,
                        factor,
                        combine,
                        parents: keys,
                    }
                }
            });
        }

        match Mapping::new(key, evidence) {
            Ok(mapping) => out.push(mapping),
            Err(e) => return Err(archive_error(e.to_string()).into()),
        }
    }
    Ok(out.deduplicate(store))
}

fn intern_triple(
    subject: &str,
    predicate: &str,
    object: &str,
    store: &ReferenceStore,
) -> KhipuResult<TripleKey> {
    Ok(TripleKey::new(
        store.intern(&Reference::parse(subject)?)?,
        store.intern(&Reference::parse(predicate)?)?,
        store.intern(&Reference::parse(object)?)?,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vocab::Vocabulary;

    fn collection(store: &ReferenceStore, voc: &Vocabulary) -> Mappings {
        let a = store.intern_curie("a:1").unwrap();
        let b = store.intern_curie("b:1").unwrap();
        let c = store.intern_curie("c:1").unwrap();
        let k_ab = TripleKey::new(a, voc.exact_match, b);
        let k_bc = TripleKey::new(b, voc.exact_match, c);
        let k_ac = TripleKey::new(a, voc.exact_match, c);
        Mappings::from_vec(vec![
            Mapping::with_evidence(k_ab, Evidence::simple(voc.lexical_matching, 0.9)).unwrap(),
            Mapping::with_evidence(k_bc, Evidence::simple(voc.manual_curation, 1.0)).unwrap(),
            Mapping::with_evidence(k_ac, Evidence::reasoned(voc.chaining, 1.0, [k_ab, k_bc]))
                .unwrap(),
        ])
    }

    #[test]
    fn round_trip_preserves_evidence() {
        let store = ReferenceStore::new();
        let voc = Vocabulary::intern(&store).unwrap();
        let original = collection(&store, &voc);

        let mut buffer = Vec::new();
        write_archive(&mut buffer, &original, &store).unwrap();
        assert_eq!(buffer.iter().filter(|&&b| b == b'\n').count(), 3);

        let rebuilt = read_archive(buffer.as_slice(), &store).unwrap();
        assert_eq!(rebuilt.len(), original.len());
        for (a, b) in original.iter().zip(rebuilt.iter()) {
            assert_eq!(a.key(), b.key());
            let hash = |m: &Mapping| {
                let mut h: Vec<_> =
                    m.evidence().iter().map(|e| e.content_hash(&store)).collect();
                h.sort();
                h
            };
            assert_eq!(hash(a), hash(b));
        }
    }

    #[test]
    fn emitted_parents_are_referenced_by_hash() {
        let store = ReferenceStore::new();
        let voc = Vocabulary::intern(&store).unwrap();
        let original = collection(&store, &voc);

        let mut buffer = Vec::new();
        write_archive(&mut buffer, &original, &store).unwrap();
        let text = String::from_utf8(buffer).unwrap();
        let last_line = text.lines().last().unwrap();
        // Both parents appeared earlier in the stream.
        assert!(last_line.contains("\"hash\""));
        assert!(!last_line.contains("\"subject\":\"b:1\""));
    }

    #[test]
    fn forward_references_fall_back_to_inline() {
        let store = ReferenceStore::new();
        let voc = Vocabulary::intern(&store).unwrap();
        let a = store.intern_curie("a:1").unwrap();
        let b = store.intern_curie("b:1").unwrap();
        let c = store.intern_curie("c:1").unwrap();
        let k_ab = TripleKey::new(a, voc.exact_match, b);
        let k_bc = TripleKey::new(b, voc.exact_match, c);
        let k_ac = TripleKey::new(a, voc.exact_match, c);
        // Derived mapping first: parents not yet emitted.
        let scrambled = Mappings::from_vec(vec![
            Mapping::with_evidence(k_ac, Evidence::reasoned(voc.chaining, 1.0, [k_ab, k_bc]))
                .unwrap(),
            Mapping::with_evidence(k_ab, Evidence::simple(voc.lexical_matching, 0.9)).unwrap(),
            Mapping::with_evidence(k_bc, Evidence::simple(voc.manual_curation, 1.0)).unwrap(),
        ]);

        let mut buffer = Vec::new();
        write_archive(&mut buffer, &scrambled, &store).unwrap();
        let rebuilt = read_archive(buffer.as_slice(), &store).unwrap();
        assert_eq!(rebuilt.len(), 3);
        assert_eq!(rebuilt.as_slice()[0].evidence()[0].parents().len(), 2);
    }

    #[test]
    fn garbage_line_reports_its_number() {
        let store = ReferenceStore::new();
        let bytes = b"{\"not\": \"a record\"}\n".to_vec();
        let err = read_archive(bytes.as_slice(), &store).unwrap_err();
        assert!(format!("{err}").contains("line 1"));
    }

    #[test]
    fn blank_lines_are_tolerated() {
        let store = ReferenceStore::new();
        let voc = Vocabulary::intern(&store).unwrap();
        let original = collection(&store, &voc);
        let mut buffer = Vec::new();
        write_archive(&mut buffer, &original, &store).unwrap();
        buffer.extend_from_slice(b"\n\n");
        let rebuilt = read_archive(buffer.as_slice(), &store).unwrap();
        assert_eq!(rebuilt.len(), 3);
    }
}
