//! The analytics facade.

use super::{CancellationToken, EngineConfig};
use crate::analysis::ParticipantMetrics;
use crate::cohort::{CohortResolver, PeerAverager, PeerAverages};
use crate::error::AnalyticsError;
use crate::models::{
    AnalyticsBundle, CategoryCount, CohortDefinition, CohortDimension, FilterCriteria,
    Participant, PeerOverlay,
};
use crate::store::{DocumentStore, Records};
use crate::temporal::DateNormalizer;
use chrono::{NaiveDate, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Computes analytics bundles over a shared record store.
///
/// Every call is an independent, read-only computation; the facade holds no
/// per-request state.
#[derive(Clone)]
pub struct AnalyticsFacade {
    store: Arc<dyn DocumentStore>,
    config: EngineConfig,
    reference_date: Option<NaiveDate>,
}

impl AnalyticsFacade {
    pub fn new(store: Arc<dyn DocumentStore>, config: EngineConfig) -> Self {
        Self {
            store,
            config,
            reference_date: None,
        }
    }

    /// Pins the date year-less month labels resolve against.
    pub fn with_reference_date(mut self, date: NaiveDate) -> Self {
        self.reference_date = Some(date);
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    fn normalizer(&self) -> DateNormalizer {
        self.reference_date
            .map(DateNormalizer::new)
            .unwrap_or_else(DateNormalizer::current)
    }

    /// Builds the bundle for `participant_id`.
    ///
    /// Returns [`AnalyticsError::NotFound`] when the participant does not
    /// exist and [`AnalyticsError::Cancelled`] when `cancel` fires first.
    /// Every other problem is reported in the bundle's `warnings`.
    pub async fn compute_analytics(
        &self,
        participant_id: &str,
        filters: &FilterCriteria,
        cohort: CohortDefinition,
        cancel: &CancellationToken,
    ) -> Result<AnalyticsBundle, AnalyticsError> {
        if cancel.is_cancelled() {
            return Err(AnalyticsError::Cancelled);
        }

        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                info!("Analytics for {} cancelled", participant_id);
                Err(AnalyticsError::Cancelled)
            }
            result = self.compute(participant_id, filters, cohort) => result,
        }
    }

    async fn compute(
        &self,
        participant_id: &str,
        filters: &FilterCriteria,
        cohort: CohortDefinition,
    ) -> Result<AnalyticsBundle, AnalyticsError> {
        info!("Computing analytics for {}", participant_id);
        let records = Records::new(self.store.as_ref());
        let normalizer = self.normalizer();

        let (participant, application, activity) = futures::join!(
            records.participant(participant_id),
            records.application(participant_id),
            records.activity(participant_id),
        );

        let participant = participant?
            .ok_or_else(|| AnalyticsError::NotFound(participant_id.to_string()))?;

        let mut warnings = Vec::new();
        let application = application.unwrap_or_else(|e| {
            warn!("Could not load application for {}: {}", participant_id, e);
            warnings.push(format!("Program enrollment unavailable: {}", e));
            None
        });
        let program_id = application.and_then(|a| a.program_id);
        let activity = activity.into_lenient(&mut warnings);

        let metrics = ParticipantMetrics::compute(
            &participant,
            program_id.as_deref(),
            &activity,
            filters,
            &normalizer,
        );
        debug!(
            "Subject {}: {} interventions, {} revenue months, {} headcount months",
            participant_id,
            metrics.interventions.len(),
            metrics.revenue_monthly.len(),
            metrics.headcount_monthly.len()
        );

        let peers = if cohort.enabled {
            Some(
                self.peer_overlay(
                    &records,
                    &participant,
                    program_id.as_deref(),
                    cohort.dimension,
                    filters,
                    &normalizer,
                    &metrics,
                    &mut warnings,
                )
                .await,
            )
        } else {
            None
        };

        info!(
            "Analytics for {} ready ({} warnings)",
            participant_id,
            warnings.len()
        );

        Ok(AnalyticsBundle {
            participant_id: participant.id.clone(),
            participant_name: participant.name.clone(),
            program_id,
            generated_at: Utc::now(),
            kpis: metrics.kpis(),
            revenue: metrics.revenue_view(),
            headcount: metrics.headcount_view(),
            interventions: metrics.intervention_view(),
            compliance: metrics.compliance,
            peers,
            warnings,
        })
    }

    #[allow(clippy::too_many_arguments)]
    async fn peer_overlay(
        &self,
        records: &Records<'_>,
        participant: &Participant,
        program_id: Option<&str>,
        dimension: CohortDimension,
        filters: &FilterCriteria,
        normalizer: &DateNormalizer,
        subject: &ParticipantMetrics,
        warnings: &mut Vec<String>,
    ) -> PeerOverlay {
        let resolution = CohortResolver::new(*records, &self.config)
            .resolve_peers(participant, program_id, dimension, filters)
            .await;
        warnings.extend(resolution.warnings);

        let averages = if resolution.peers.is_empty() {
            PeerAverages::default()
        } else {
            match PeerAverager::new(*records, &self.config, normalizer)
                .average_peers(&resolution.peers, filters)
                .await
            {
                Ok(averages) => averages,
                Err(e) => {
                    warn!("Peer averaging failed for {}: {}", participant.id, e);
                    warnings.push(format!("Peer averages unavailable: {}", e));
                    PeerAverages::default()
                }
            }
        };

        PeerOverlay {
            dimension: Some(dimension),
            peer_count: averages.peer_count,
            revenue_monthly: averages.revenue.align_to(&subject.revenue_monthly.categories),
            revenue_annual: averages
                .revenue_annual
                .align_to(&subject.revenue_annual.categories),
            headcount_monthly: averages
                .headcount
                .align_to(&subject.headcount_monthly.categories),
            interventions_by_area: align_counts(
                &averages.interventions_by_area,
                &subject.interventions_by_area,
            ),
            compliance_by_status: align_counts(
                &averages.compliance_by_status,
                &subject.compliance,
            ),
        }
    }
}

/// Peer counts in the subject's category order, peer-only categories after.
fn align_counts(peer: &[CategoryCount], subject: &[CategoryCount]) -> Vec<CategoryCount> {
    let values: HashMap<&str, f64> = peer.iter().map(|c| (c.name.as_str(), c.count)).collect();

    let mut aligned: Vec<CategoryCount> = subject
        .iter()
        .map(|c| CategoryCount::new(c.name.clone(), values.get(c.name.as_str()).copied().unwrap_or(0.0)))
        .collect();
    aligned.extend(
        peer.iter()
            .filter(|p| !subject.iter().any(|s| s.name == p.name))
            .cloned(),
    );
    aligned
}
