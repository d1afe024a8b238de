//! Normalization and deduplication of intervention records.
//!
//! Four sources describe interventions with different field names. Each raw
//! record is normalized into one canonical [`Intervention`] at this boundary;
//! nothing downstream knows about the aliases.

use crate::models::{Intervention, InterventionSource};
use crate::temporal::DateNormalizer;
use serde_json::Value;
use std::collections::hash_map::DefaultHasher;
use std::collections::{BTreeSet, HashMap};
use std::hash::{Hash, Hasher};

const TITLE_FIELDS: &[&str] = &["title", "interventionTitle"];
const AREA_FIELDS: &[&str] = &["area", "areaOfSupport"];
const CONSULTANT_FIELDS: &[&str] = &["consultantEmail", "consultantName", "consultant", "consultantId"];
const PROGRAM_FIELDS: &[&str] = &["programId", "programmeId"];

/// Merges intervention sources into one canonical collection.
#[derive(Debug, Clone, Copy)]
pub struct InterventionMerger<'a> {
    normalizer: &'a DateNormalizer,
}

impl<'a> InterventionMerger<'a> {
    pub fn new(normalizer: &'a DateNormalizer) -> Self {
        Self { normalizer }
    }

    /// Normalizes one raw record. Non-object values are dropped.
    pub fn normalize(&self, raw: &Value, source: InterventionSource) -> Option<Intervention> {
        if !raw.is_object() {
            return None;
        }

        let title = text(raw, TITLE_FIELDS);
        let key = text(raw, &["interventionId"])
            .or_else(|| text(raw, &["id"]))
            .or_else(|| title.clone())
            .unwrap_or_else(|| structural_key(raw));

        let date = |field: &str| raw.get(field).and_then(|v| self.normalizer.normalize(v));

        Some(Intervention {
            key,
            title: title.unwrap_or_default(),
            area: text(raw, AREA_FIELDS).unwrap_or_default(),
            status: text(raw, &["status"]).unwrap_or_else(|| source.default_status().to_string()),
            consultant_ref: text(raw, CONSULTANT_FIELDS),
            completed_at: date("completedAt"),
            intervention_date: date("interventionDate"),
            date: date("date"),
            program_id: text(raw, PROGRAM_FIELDS),
            company_code: text(raw, &["companyCode"]),
            sources: BTreeSet::from([source]),
        })
    }

    /// Normalizes and merges raw source batches.
    ///
    /// Batches are applied in source precedence order; a later source
    /// replaces an earlier record with the same key, while the output keeps
    /// the position of the key's first appearance.
    pub fn merge(&self, sources: &[(InterventionSource, Vec<Value>)]) -> Vec<Intervention> {
        let mut ordered: Vec<&(InterventionSource, Vec<Value>)> = sources.iter().collect();
        ordered.sort_by_key(|(source, _)| *source);

        merge_canonical(ordered.into_iter().map(|(source, records)| {
            records
                .iter()
                .filter_map(|raw| self.normalize(raw, *source))
                .collect::<Vec<_>>()
        }))
    }
}

/// Deduplicates already-canonical batches; later batches win.
///
/// Merging an output with itself yields the same records.
pub fn merge_canonical<I>(batches: I) -> Vec<Intervention>
where
    I: IntoIterator<Item = Vec<Intervention>>,
{
    let mut merged: Vec<Intervention> = Vec::new();
    let mut positions: HashMap<String, usize> = HashMap::new();

    for intervention in batches.into_iter().flatten() {
        match positions.get(&intervention.key) {
            Some(&index) => {
                let mut sources = std::mem::take(&mut merged[index].sources);
                sources.extend(intervention.sources.iter().copied());
                merged[index] = Intervention {
                    sources,
                    ..intervention
                };
            }
            None => {
                positions.insert(intervention.key.clone(), merged.len());
                merged.push(intervention);
            }
        }
    }

    merged
}

/// Fills a missing program id with the participant's own program.
pub fn with_default_program(mut interventions: Vec<Intervention>, program: Option<&str>) -> Vec<Intervention> {
    if let Some(program) = program {
        for intervention in interventions.iter_mut().filter(|i| i.program_id.is_none()) {
            intervention.program_id = Some(program.to_string());
        }
    }
    interventions
}

/// First non-blank string (or number) among `fields`.
fn text(raw: &Value, fields: &[&str]) -> Option<String> {
    fields.iter().find_map(|field| match raw.get(*field)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

/// Key for records with no id and no title.
///
/// Field-identical records collapse into one; this is a known limitation.
fn structural_key(raw: &Value) -> String {
    let mut hasher = DefaultHasher::new();
    raw.to_string().hash(&mut hasher);
    format!("#{:016x}", hasher.finish())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use serde_json::json;

    fn normalizer() -> DateNormalizer {
        DateNormalizer::new(NaiveDate::from_ymd_opt(2025, 1, 1).unwrap())
    }

    #[test]
    fn test_alias_resolution() {
        let normalizer = normalizer();
        let merger = InterventionMerger::new(&normalizer);
        let iv = merger
            .normalize(
                &json!({
                    "interventionTitle": "Pitch Coaching",
                    "areaOfSupport": "Marketing",
                    "consultantEmail": "ana@example.com",
                    "interventionDate": "2024-05-02"
                }),
                InterventionSource::Assigned,
            )
            .unwrap();

        assert_eq!(iv.key, "Pitch Coaching");
        assert_eq!(iv.title, "Pitch Coaching");
        assert_eq!(iv.area, "Marketing");
        assert_eq!(iv.status, "assigned");
        assert_eq!(iv.consultant_ref.as_deref(), Some("ana@example.com"));
        assert_eq!(iv.best_date(), NaiveDate::from_ymd_opt(2024, 5, 2));
    }

    #[test]
    fn test_key_precedence() {
        let normalizer = normalizer();
        let merger = InterventionMerger::new(&normalizer);
        let key = |raw: Value| {
            merger
                .normalize(&raw, InterventionSource::Required)
                .unwrap()
                .key
        };

        assert_eq!(key(json!({ "interventionId": 7, "id": "x", "title": "t" })), "7");
        assert_eq!(key(json!({ "id": "x", "title": "t" })), "x");
        assert_eq!(key(json!({ "title": "t" })), "t");
        assert!(key(json!({ "area": "Finance" })).starts_with('#'));
        assert!(merger.normalize(&json!("str"), InterventionSource::Required).is_none());
    }

    #[test]
    fn test_later_source_wins_first_position_kept() {
        let normalizer = normalizer();
        let merger = InterventionMerger::new(&normalizer);
        let merged = merger.merge(&[
            (
                InterventionSource::Database,
                vec![json!({ "interventionId": "a", "title": "A", "status": "completed" })],
            ),
            (
                InterventionSource::Required,
                vec![
                    json!({ "interventionId": "a", "title": "A" }),
                    json!({ "interventionId": "b", "title": "B" }),
                ],
            ),
            (
                InterventionSource::Completed,
                vec![json!({ "interventionId": "b", "interventionTitle": "B2" })],
            ),
        ]);

        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].key, "a");
        assert_eq!(merged[0].status, "completed");
        assert_eq!(
            merged[0].sources,
            BTreeSet::from([InterventionSource::Required, InterventionSource::Database])
        );
        assert_eq!(merged[1].key, "b");
        assert_eq!(merged[1].title, "B2");
        assert!(merged[1].is_completed());
    }

    #[test]
    fn test_merge_is_idempotent() {
        let normalizer = normalizer();
        let merger = InterventionMerger::new(&normalizer);
        let once = merger.merge(&[
            (
                InterventionSource::Required,
                vec![json!({ "title": "X" }), json!({ "area": "Ops" })],
            ),
            (
                InterventionSource::Assigned,
                vec![json!({ "id": "9", "title": "Y" }), json!({ "title": "X" })],
            ),
        ]);
        let twice = merge_canonical(vec![once.clone(), once.clone()]);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_structurally_identical_titleless_records_collapse() {
        let normalizer = normalizer();
        let merger = InterventionMerger::new(&normalizer);
        let merged = merger.merge(&[(
            InterventionSource::Required,
            vec![json!({ "area": "Ops" }), json!({ "area": "Ops" })],
        )]);
        assert_eq!(merged.len(), 1);
    }

    #[test]
    fn test_default_program_fill() {
        let normalizer = normalizer();
        let merger = InterventionMerger::new(&normalizer);
        let merged = merger.merge(&[(
            InterventionSource::Assigned,
            vec![
                json!({ "title": "A", "programId": "P9" }),
                json!({ "title": "B" }),
            ],
        )]);
        let filled = with_default_program(merged, Some("P1"));
        assert_eq!(filled[0].program_id.as_deref(), Some("P9"));
        assert_eq!(filled[1].program_id.as_deref(), Some("P1"));
    }
}
