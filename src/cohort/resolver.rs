//! Resolution of a bounded peer set for a subject participant.

use super::batch::chunk;
use crate::analysis::FilterEngine;
use crate::engine::EngineConfig;
use crate::error::StoreError;
use crate::models::{CohortDimension, FilterCriteria, Participant};
use crate::store::{Predicate, Records};
use tracing::{debug, info, warn};

/// Outcome of peer resolution. Failures never escape as errors; they leave
/// `peers` empty and explain why in `warnings`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PeerResolution {
    pub peers: Vec<String>,
    pub warnings: Vec<String>,
}

enum Unresolved {
    /// No field value or program to compare on.
    MissingLinkage(String),
    Store(StoreError),
}

impl From<StoreError> for Unresolved {
    fn from(err: StoreError) -> Self {
        Unresolved::Store(err)
    }
}

pub struct CohortResolver<'a> {
    records: Records<'a>,
    config: &'a EngineConfig,
}

impl<'a> CohortResolver<'a> {
    pub fn new(records: Records<'a>, config: &'a EngineConfig) -> Self {
        Self { records, config }
    }

    /// Peer ids for `subject` along `dimension`, excluding the subject and
    /// capped at `max_peers`. Order is stable (sorted by id).
    pub async fn resolve_peers(
        &self,
        subject: &Participant,
        subject_program: Option<&str>,
        dimension: CohortDimension,
        filters: &FilterCriteria,
    ) -> PeerResolution {
        match self
            .try_resolve(subject, subject_program, dimension, filters)
            .await
        {
            Ok(peers) => {
                info!(
                    "Resolved {} peers for {} by {}",
                    peers.len(),
                    subject.id,
                    dimension
                );
                PeerResolution {
                    peers,
                    warnings: Vec::new(),
                }
            }
            Err(Unresolved::MissingLinkage(reason)) => {
                warn!("No peer cohort for {}: {}", subject.id, reason);
                PeerResolution {
                    peers: Vec::new(),
                    warnings: vec![reason],
                }
            }
            Err(Unresolved::Store(err)) => {
                warn!("Peer lookup failed for {}: {}", subject.id, err);
                PeerResolution {
                    peers: Vec::new(),
                    warnings: vec![format!("Peer comparison unavailable: {}", err)],
                }
            }
        }
    }

    async fn try_resolve(
        &self,
        subject: &Participant,
        subject_program: Option<&str>,
        dimension: CohortDimension,
        filters: &FilterCriteria,
    ) -> Result<Vec<String>, Unresolved> {
        let scope = filters
            .company_code
            .as_deref()
            .or(subject.company_code.as_deref());
        let in_scope = |code: Option<&str>| match (scope, code) {
            (Some(wanted), Some(actual)) => wanted == actual,
            _ => true,
        };

        let mut candidates: Vec<String> = match dimension {
            CohortDimension::Gender | CohortDimension::Sector => {
                let (field, value) = match dimension {
                    CohortDimension::Gender => ("gender", subject.gender.as_deref()),
                    _ => ("sector", subject.sector.as_deref()),
                };
                let value = value
                    .map(str::trim)
                    .filter(|v| !v.is_empty())
                    .ok_or_else(|| {
                        Unresolved::MissingLinkage(format!(
                            "No {} recorded for this participant; peer comparison skipped",
                            field
                        ))
                    })?;

                let mut predicates = vec![Predicate::eq(field, value)];
                if let Some(code) = scope {
                    predicates.push(Predicate::eq("companyCode", code));
                }

                self.records
                    .participants_where(&predicates)
                    .await?
                    .into_iter()
                    .filter(|p| in_scope(p.company_code.as_deref()))
                    .map(|p| p.id)
                    .collect()
            }
            CohortDimension::Program => {
                let program = filters.program.as_deref().or(subject_program).ok_or_else(|| {
                    Unresolved::MissingLinkage(
                        "No program could be determined; peer comparison skipped".to_string(),
                    )
                })?;
                debug!("Resolving program cohort against {}", program);

                self.records
                    .applications_where(&[Predicate::eq("programId", program)])
                    .await?
                    .into_iter()
                    .filter(|a| in_scope(a.company_code.as_deref()))
                    .map(|a| a.participant_id)
                    .collect()
            }
        };

        candidates.retain(|id| !id.is_empty() && *id != subject.id);
        candidates.sort();
        candidates.dedup();

        if let Some(program) = filters.program.as_deref() {
            if dimension != CohortDimension::Program {
                candidates = self.enrolled_in(program, &candidates).await?;
            }
        }

        candidates.truncate(self.config.max_peers);
        Ok(candidates)
    }

    /// Keeps the ids with an application to `program`, one batched read per
    /// chunk, stopping once enough peers are found.
    async fn enrolled_in(&self, program: &str, ids: &[String]) -> Result<Vec<String>, StoreError> {
        let engine_filters = FilterCriteria {
            program: Some(program.to_string()),
            ..Default::default()
        };
        let engine = FilterEngine::new(&engine_filters);
        let mut enrolled = Vec::new();

        for batch in chunk(ids, self.config.batch_size) {
            let apps = self.records.applications_for(&batch).await?;
            enrolled.extend(batch.into_iter().filter(|id| {
                apps.iter().any(|a| {
                    a.participant_id == *id && engine.matches_program(a.program_id.as_deref())
                })
            }));
            if enrolled.len() >= self.config.max_peers {
                break;
            }
        }

        Ok(enrolled)
    }
}
