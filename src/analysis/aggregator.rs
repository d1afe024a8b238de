//! Category distributions and KPI arithmetic.
//!
//! This module groups canonical interventions and compliance documents into
//! the category counts the renderer charts, and computes headline KPIs.

use crate::models::{
    CategoryCount, ComplianceDocument, ComplianceStatus, DrillSeries, Intervention, Kpis,
    MonthlyPerformanceRecord,
};
use chrono::NaiveDate;
use std::collections::BTreeMap;

const UNSPECIFIED_AREA: &str = "Unspecified";
const UNTITLED: &str = "Untitled";

/// Group completed interventions by area, then by title within each area.
pub fn group_completed_by_area(
    interventions: &[Intervention],
) -> BTreeMap<String, BTreeMap<String, usize>> {
    let mut grouped: BTreeMap<String, BTreeMap<String, usize>> = BTreeMap::new();

    for intervention in interventions.iter().filter(|i| i.is_completed()) {
        let area = label_or(&intervention.area, UNSPECIFIED_AREA);
        let title = label_or(&intervention.title, UNTITLED);
        *grouped
            .entry(area)
            .or_default()
            .entry(title)
            .or_default() += 1;
    }

    grouped
}

/// Completed counts per area, with per-title drill-downs keyed by area.
pub fn interventions_by_area(interventions: &[Intervention]) -> (Vec<CategoryCount>, Vec<DrillSeries>) {
    let grouped = group_completed_by_area(interventions);

    let by_area = grouped
        .iter()
        .map(|(area, titles)| CategoryCount::new(area.clone(), titles.values().sum::<usize>() as f64))
        .collect();

    let drilldown = grouped
        .into_iter()
        .map(|(area, titles)| {
            let (categories, data) = titles.into_iter().map(|(t, n)| (t, n as f64)).unzip();
            DrillSeries {
                id: area.clone(),
                name: area,
                categories,
                data,
            }
        })
        .collect();

    (by_area, drilldown)
}

/// Count documents per status.
pub fn count_by_status(documents: &[ComplianceDocument]) -> BTreeMap<ComplianceStatus, usize> {
    let mut counts: BTreeMap<ComplianceStatus, usize> = BTreeMap::new();
    for doc in documents {
        *counts.entry(doc.status()).or_default() += 1;
    }
    counts
}

/// Status distribution in fixed order, omitting zero counts.
pub fn compliance_distribution(documents: &[ComplianceDocument]) -> Vec<CategoryCount> {
    let counts = count_by_status(documents);
    ComplianceStatus::ALL
        .iter()
        .filter_map(|status| {
            counts
                .get(status)
                .filter(|n| **n > 0)
                .map(|n| CategoryCount::new(status.to_string(), *n as f64))
        })
        .collect()
}

/// `min(100, round(completed / required * 100))`, or 0 with nothing required.
pub fn participation_rate(required: usize, completed: usize) -> u32 {
    if required == 0 {
        return 0;
    }
    let rate = (completed as f64 / required as f64 * 100.0).round();
    rate.min(100.0) as u32
}

/// Headcount on the latest dated monthly record.
pub fn current_headcount<F>(records: &[MonthlyPerformanceRecord], date_of: F) -> f64
where
    F: Fn(&MonthlyPerformanceRecord) -> Option<NaiveDate>,
{
    records
        .iter()
        .filter_map(|r| date_of(r).map(|d| (d, r)))
        .max_by_key(|(d, _)| *d)
        .map(|(_, r)| r.headcount())
        .unwrap_or(0.0)
}

/// Headline numbers for filtered interventions and monthly data.
///
/// Only interventions seen in the required source count as required.
/// Completed counts every completed intervention, so the rate is capped.
pub fn compute_kpis(
    interventions: &[Intervention],
    current_headcount: f64,
    total_revenue: f64,
) -> Kpis {
    let required = interventions.iter().filter(|i| i.is_required()).count();
    let completed = interventions.iter().filter(|i| i.is_completed()).count();

    Kpis {
        required_interventions: required,
        completed_interventions: completed,
        participation_rate: participation_rate(required, completed),
        current_headcount,
        total_revenue,
    }
}

fn label_or(value: &str, fallback: &str) -> String {
    if value.trim().is_empty() {
        fallback.to_string()
    } else {
        value.to_string()
    }
}
