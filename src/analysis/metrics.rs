//! Per-participant metric computation.

use super::aggregator::{compliance_distribution, compute_kpis, current_headcount, interventions_by_area};
use super::filters::FilterEngine;
use super::interventions::{with_default_program, InterventionMerger};
use super::series::{split_drilldown, totals, year_drilldown, Metric, MonthlyParts, SeriesAggregator};
use crate::models::{
    CategoryCount, DrillSeries, FilterCriteria, HeadcountView, Intervention, InterventionView,
    Kpis, Participant, RevenueView, Series,
};
use crate::store::records::Activity;
use crate::temporal::DateNormalizer;

/// Everything derived from one participant's records under one filter set.
#[derive(Debug, Clone, Default)]
pub struct ParticipantMetrics {
    /// Canonical interventions that passed the filters.
    pub interventions: Vec<Intervention>,
    pub revenue_monthly: Series,
    pub revenue_annual: Series,
    pub revenue_drilldown: Vec<DrillSeries>,
    pub headcount_parts: MonthlyParts,
    pub headcount_monthly: Series,
    pub interventions_by_area: Vec<CategoryCount>,
    pub intervention_drilldown: Vec<DrillSeries>,
    pub compliance: Vec<CategoryCount>,
    pub current_headcount: f64,
}

impl ParticipantMetrics {
    /// Merges, filters and folds a participant's records.
    ///
    /// `program` is the participant's own program; interventions without a
    /// program id inherit it before the program filter runs.
    pub fn compute(
        participant: &Participant,
        program: Option<&str>,
        activity: &Activity,
        filters: &FilterCriteria,
        normalizer: &DateNormalizer,
    ) -> Self {
        let engine = FilterEngine::new(filters);
        let range = filters.date_range.as_ref();
        let series = SeriesAggregator::new(normalizer);

        let merged = InterventionMerger::new(normalizer).merge(&activity.interventions);
        let interventions = engine.retain_interventions(with_default_program(merged, program));
        let (interventions_by_area, intervention_drilldown) = interventions_by_area(&interventions);

        let revenue_monthly = series.aggregate_monthly(
            &activity.monthly,
            &participant.revenue_history.monthly,
            Metric::Revenue,
            range,
        );
        let covered = series.covered_years(&activity.monthly, &participant.revenue_history.monthly);
        let revenue_annual = series.aggregate_annual(
            &revenue_monthly,
            &covered,
            &participant.revenue_history.annual,
            range,
        );
        let revenue_drilldown = year_drilldown(&revenue_monthly);

        let headcount_parts = series.monthly_parts(
            &activity.monthly,
            &participant.headcount_history.monthly,
            Metric::Headcount,
            range,
        );
        let headcount_monthly = totals(&headcount_parts);

        let current_headcount = current_headcount(&activity.monthly, |record| {
            series
                .record_date(record)
                .filter(|d| engine.matches_date(Some(*d)))
        });

        Self {
            interventions,
            revenue_monthly,
            revenue_annual,
            revenue_drilldown,
            headcount_parts,
            headcount_monthly,
            interventions_by_area,
            intervention_drilldown,
            compliance: compliance_distribution(&activity.compliance),
            current_headcount,
        }
    }

    pub fn kpis(&self) -> Kpis {
        compute_kpis(
            &self.interventions,
            self.current_headcount,
            self.revenue_annual.total(),
        )
    }

    pub fn revenue_view(&self) -> RevenueView {
        RevenueView {
            monthly: self.revenue_monthly.clone(),
            annual: self.revenue_annual.clone(),
            drilldown: self.revenue_drilldown.clone(),
        }
    }

    pub fn headcount_view(&self) -> HeadcountView {
        HeadcountView {
            monthly: self.headcount_monthly.clone(),
            drilldown: split_drilldown(&self.headcount_parts),
        }
    }

    pub fn intervention_view(&self) -> InterventionView {
        InterventionView {
            by_area: self.interventions_by_area.clone(),
            drilldown: self.intervention_drilldown.clone(),
        }
    }
}
