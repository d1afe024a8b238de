//! Averaging a peer cohort's metrics.
//!
//! Peer coverage is sparse, so every bucket keeps its own `(sum, count)` and
//! divides only at the end. A bucket no peer contributed to averages to `0`.

use super::batch::chunk;
use crate::analysis::{FilterEngine, ParticipantMetrics};
use crate::engine::EngineConfig;
use crate::error::StoreError;
use crate::models::{CategoryCount, FilterCriteria, Participant, Series};
use crate::store::Records;
use crate::temporal::DateNormalizer;
use futures::future::join_all;
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, Default)]
struct Mean {
    sum: f64,
    count: u32,
}

/// Per-key running means.
#[derive(Debug, Clone, Default)]
pub struct MeanAccumulator {
    buckets: BTreeMap<String, Mean>,
}

impl MeanAccumulator {
    pub fn add(&mut self, key: &str, value: f64) {
        let bucket = self.buckets.entry(key.to_string()).or_default();
        bucket.sum += value;
        bucket.count += 1;
    }

    pub fn add_series(&mut self, series: &Series) {
        for (key, value) in series.categories.iter().zip(&series.data) {
            self.add(key, *value);
        }
    }

    pub fn add_counts(&mut self, counts: &[CategoryCount]) {
        for count in counts {
            self.add(&count.name, count.count);
        }
    }

    /// Mean of the contributions to `key`; `0` when there were none.
    pub fn mean(&self, key: &str) -> f64 {
        match self.buckets.get(key) {
            Some(m) if m.count > 0 => m.sum / m.count as f64,
            _ => 0.0,
        }
    }

    pub fn to_series(&self) -> Series {
        let means: BTreeMap<String, f64> = self
            .buckets
            .keys()
            .map(|k| (k.clone(), self.mean(k)))
            .collect();
        Series::from_map(&means)
    }

    pub fn to_counts(&self) -> Vec<CategoryCount> {
        self.buckets
            .keys()
            .map(|k| CategoryCount::new(k.clone(), self.mean(k)))
            .collect()
    }
}

/// Averaged peer metrics, before alignment to the subject's axes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PeerAverages {
    /// Peers whose records were folded in.
    pub peer_count: usize,
    pub revenue: Series,
    pub revenue_annual: Series,
    pub headcount: Series,
    pub interventions_by_area: Vec<CategoryCount>,
    pub compliance_by_status: Vec<CategoryCount>,
}

pub struct PeerAverager<'a> {
    records: Records<'a>,
    config: &'a EngineConfig,
    normalizer: &'a DateNormalizer,
}

impl<'a> PeerAverager<'a> {
    pub fn new(records: Records<'a>, config: &'a EngineConfig, normalizer: &'a DateNormalizer) -> Self {
        Self {
            records,
            config,
            normalizer,
        }
    }

    /// Fetches and averages the peers' metrics under the subject's filters.
    ///
    /// Participant and application lookups are batched; a failure there
    /// fails the whole computation. Per-peer activity reads that fail only
    /// drop that peer.
    pub async fn average_peers(
        &self,
        peer_ids: &[String],
        filters: &FilterCriteria,
    ) -> Result<PeerAverages, StoreError> {
        let ids: Vec<String> = peer_ids.iter().take(self.config.max_peers).cloned().collect();
        if ids.is_empty() {
            return Ok(PeerAverages::default());
        }

        let batches = chunk(&ids, self.config.batch_size);
        debug!("Fetching {} peers in {} batches", ids.len(), batches.len());

        let lookups = join_all(batches.iter().map(|batch| async move {
            futures::try_join!(
                self.records.participants_by_ids(batch),
                self.records.applications_for(batch),
            )
        }))
        .await;

        let scope = FilterEngine::new(filters);
        let mut participants: Vec<Participant> = Vec::new();
        let mut programs: HashMap<String, String> = HashMap::new();
        for lookup in lookups {
            let (found, applications) = lookup?;
            participants.extend(
                found
                    .into_iter()
                    .filter(|p| scope.matches_scope(p.company_code.as_deref())),
            );
            for app in applications {
                if let Some(program) = app.program_id {
                    programs.entry(app.participant_id).or_insert(program);
                }
            }
        }

        let activities = join_all(
            participants
                .iter()
                .map(|p| async move { (p, self.records.activity(&p.id).await.into_complete()) }),
        )
        .await;

        let mut revenue = MeanAccumulator::default();
        let mut revenue_annual = MeanAccumulator::default();
        let mut headcount = MeanAccumulator::default();
        let mut areas = MeanAccumulator::default();
        let mut compliance = MeanAccumulator::default();
        let mut peer_count = 0usize;

        for (peer, activity) in activities {
            let activity = match activity {
                Ok(activity) => activity,
                Err(e) => {
                    warn!("Skipping peer {}: {}", peer.id, e);
                    continue;
                }
            };

            let metrics = ParticipantMetrics::compute(
                peer,
                programs.get(&peer.id).map(String::as_str),
                &activity,
                filters,
                self.normalizer,
            );

            revenue.add_series(&metrics.revenue_monthly);
            revenue_annual.add_series(&metrics.revenue_annual);
            headcount.add_series(&metrics.headcount_monthly);
            areas.add_counts(&metrics.interventions_by_area);
            compliance.add_counts(&metrics.compliance);
            peer_count += 1;
        }

        debug!("Averaged {} of {} peers", peer_count, ids.len());

        Ok(PeerAverages {
            peer_count,
            revenue: revenue.to_series(),
            revenue_annual: revenue_annual.to_series(),
            headcount: headcount.to_series(),
            interventions_by_area: areas.to_counts(),
            compliance_by_status: compliance.to_counts(),
        })
    }
}
