//! Reconcile source-tagged partial records into one flat field map.
//!
//! Scalar fields take the first meaningful value in the field's precedence
//! order. Union fields (genres, tags) collect every contributing source's
//! items, deduplicated case-insensitively in first-seen order.

mod precedence;

pub use precedence::PrecedenceRules;

use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use tracing::debug;

use crate::error::{Error, Result};
use crate::metadata::{is_meaningful, PartialRecord, SourceKind};
use crate::normalize::tags::canonical_key;

/// Merge output: values without markers, plus the winning source per field
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MergedFields {
    pub values: Map<String, Value>,
    /// For union fields, the highest-ranked source that contributed items
    pub sources: BTreeMap<String, SourceKind>,
}

#[derive(Debug, Clone, Default)]
pub struct FieldMerger {
    rules: PrecedenceRules,
}

impl FieldMerger {
    pub fn new(rules: PrecedenceRules) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &PrecedenceRules {
        &self.rules
    }

    /// Merge partial records. Every record must carry a `_src` tag.
    pub fn merge(&self, records: &[PartialRecord]) -> Result<MergedFields> {
        let mut tagged = Vec::with_capacity(records.len());
        for (index, record) in records.iter().enumerate() {
            let tag = record.tag().ok_or(Error::MissingSourceTag { index })?;
            let source: SourceKind = tag.parse()?;
            tagged.push((source, record));
        }

        let field_names: BTreeSet<&str> = tagged
            .iter()
            .flat_map(|(_, r)| r.fields())
            .filter(|(_, v)| is_meaningful(v))
            .map(|(k, _)| k.as_str())
            .collect();

        let mut merged = MergedFields::default();

        for field in field_names {
            let winner = if self.rules.is_union(field) {
                self.union(field, &tagged)
            } else if let Some(order) = self.rules.order(field) {
                first_meaningful(field, order, &tagged)
            } else {
                unranked(field, &tagged)?
            };

            if let Some((source, value)) = winner {
                debug!(field, source = %source, "merged field");
                merged.values.insert(field.to_string(), value);
                merged.sources.insert(field.to_string(), source);
            }
        }

        Ok(merged)
    }

    fn union(
        &self,
        field: &str,
        tagged: &[(SourceKind, &PartialRecord)],
    ) -> Option<(SourceKind, Value)> {
        let order: Vec<SourceKind> = match self.rules.order(field) {
            Some(order) => order.to_vec(),
            None => {
                let mut seen = Vec::new();
                for (source, _) in tagged {
                    if !seen.contains(source) {
                        seen.push(*source);
                    }
                }
                seen
            }
        };

        let mut seen_keys = HashSet::new();
        let mut items = Vec::new();
        let mut lead = None;

        for source in order {
            for (_, record) in tagged.iter().filter(|(s, _)| *s == source) {
                let Some(value) = record.get(field).filter(|v| is_meaningful(v)) else {
                    continue;
                };
                let candidates: Vec<&Value> = match value {
                    Value::Array(list) => list.iter().collect(),
                    other => vec![other],
                };
                for item in candidates.into_iter().filter(|v| is_meaningful(v)) {
                    let key = match item {
                        Value::String(s) => canonical_key(s),
                        other => other.to_string(),
                    };
                    if seen_keys.insert(key) {
                        items.push(item.clone());
                        lead.get_or_insert(source);
                    }
                }
            }
        }

        lead.map(|source| (source, Value::Array(items)))
    }
}

fn first_meaningful(
    field: &str,
    order: &[SourceKind],
    tagged: &[(SourceKind, &PartialRecord)],
) -> Option<(SourceKind, Value)> {
    order.iter().find_map(|source| {
        tagged
            .iter()
            .filter(|(s, _)| s == source)
            .find_map(|(_, record)| record.get(field).filter(|v| is_meaningful(v)))
            .map(|value| (*source, value.clone()))
    })
}

/// A field with no rule: fine while every provider agrees, a conflict otherwise
fn unranked(
    field: &str,
    tagged: &[(SourceKind, &PartialRecord)],
) -> Result<Option<(SourceKind, Value)>> {
    let providers: Vec<(SourceKind, &Value)> = tagged
        .iter()
        .filter_map(|(s, r)| r.get(field).filter(|v| is_meaningful(v)).map(|v| (*s, v)))
        .collect();

    let Some((first_source, first_value)) = providers.first().copied() else {
        return Ok(None);
    };

    if providers.iter().any(|(_, v)| *v != first_value) {
        let mut sources = Vec::new();
        for (source, _) in &providers {
            if !sources.contains(source) {
                sources.push(*source);
            }
        }
        return Err(Error::MetadataConflict {
            field: field.to_string(),
            sources,
        });
    }

    Ok(Some((first_source, first_value.clone())))
}
