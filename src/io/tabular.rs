//! Row model for the tabular mapping interchange format.
//!
//! One row per evidence: a mapping with three evidences serializes to three
//! rows sharing the same triple columns. Loading deduplicates by triple, so
//! a round trip through rows reassembles the original collection.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::KhipuResult;
use crate::evidence::{Evidence, MappingSetRef};
use crate::mapping::{Mapping, Mappings, TripleKey};
use crate::reference::{Reference, ReferenceStore};

/// One row of the tabular format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MappingRow {
    pub subject_id: String,
    pub predicate_id: String,
    pub object_id: String,
    pub mapping_justification: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mapping_set: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mapping_set_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mapping_set_license: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mapping_set_confidence: Option<f64>,
}

/// Flatten a collection into rows, one per evidence.
///
/// Reasoned evidence flattens to its justification only; parent provenance
/// does not fit the tabular shape and lives in the archive format instead.
pub fn rows_from_mappings(mappings: &Mappings, store: &ReferenceStore) -> Vec<MappingRow> {
    let mut rows = Vec::new();
    for mapping in mappings.iter() {
        let subject_id = store.curie(mapping.subject());
        let predicate_id = store.curie(mapping.predicate());
        let object_id = store.curie(mapping.object());
        for evidence in mapping.evidence() {
            let mut row = MappingRow {
                subject_id: subject_id.clone(),
                predicate_id: predicate_id.clone(),
                object_id: object_id.clone(),
                mapping_justification: store.curie(evidence.justification()),
                confidence: None,
                author_id: None,
                mapping_set: None,
                mapping_set_version: None,
                mapping_set_license: None,
                mapping_set_confidence: None,
            };
            if let Evidence::Simple {
                confidence,
                author,
                mapping_set,
                ..
            } = evidence
            {
                row.confidence = Some(*confidence);
                row.author_id = author.map(|a| store.curie(a));
                if let Some(set) = mapping_set {
                    row.mapping_set = Some(set.name.clone());
                    row.mapping_set_version = set.version.clone();
                    row.mapping_set_license = set.license.clone();
                    row.mapping_set_confidence = set.confidence;
                }
            }
            rows.push(row);
        }
    }
    rows
}

/// Assemble rows back into a deduplicated collection.
///
/// Every row becomes a simple evidence on its triple; rows sharing a triple
/// merge into one mapping.
pub fn mappings_from_rows(
    rows: impl IntoIterator<Item = MappingRow>,
    store: &ReferenceStore,
) -> KhipuResult<Mappings> {
    let mut out = Mappings::new();
    for row in rows {
        let subject = store.intern(&Reference::parse(&row.subject_id)?)?;
        let predicate = store.intern(&Reference::parse(&row.predicate_id)?)?;
        let object = store.intern(&Reference::parse(&row.object_id)?)?;
        let justification = store.intern_curie(&row.mapping_justification)?;
        let author = row
            .author_id
            .as_deref()
            .map(|a| store.intern_curie(a))
            .transpose()?;

        let mapping_set = row.mapping_set.as_ref().map(|name| {
            Arc::new(MappingSetRef {
                name: name.clone(),
                version: row.mapping_set_version.clone(),
                license: row.mapping_set_license.clone(),
                confidence: row.mapping_set_confidence,
            })
        });

        let evidence = Evidence::Simple {
            justification,
            confidence: row.confidence.unwrap_or(1.0).clamp(0.0, 1.0),
            author,
            mapping_set,
        };
        if let Ok(mapping) =
            Mapping::with_evidence(TripleKey::new(subject, predicate, object), evidence)
        {
            out.push(mapping);
        }
    }
    Ok(out.deduplicate(store))
}
