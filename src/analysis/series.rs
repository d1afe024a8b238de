//! Monthly and annual folds over the two storage shapes of performance data.
//!
//! A participant's revenue and headcount live both in the monthly
//! performance sub-collection and in the participant's own history maps.
//! The two are complementary: both are always added into the same
//! month-keyed accumulator, never one chosen over the other.

use crate::models::{DateRange, DrillSeries, HistoryValue, MonthlyPerformanceRecord, Series};
use crate::temporal::{month_key, month_key_to_year, year_key, DateNormalizer};
use chrono::{Datelike, NaiveDate};
use std::collections::{BTreeMap, BTreeSet};

/// Metric folded from monthly records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    Revenue,
    Headcount,
}

impl Metric {
    /// `(permanent, temporary)` parts; revenue has no split.
    fn record_parts(&self, record: &MonthlyPerformanceRecord) -> (f64, f64) {
        match self {
            Metric::Revenue => (record.revenue, 0.0),
            Metric::Headcount => (record.head_permanent, record.head_temporary),
        }
    }
}

/// Month-keyed `(permanent, temporary)` sums.
pub type MonthlyParts = BTreeMap<String, (f64, f64)>;

#[derive(Debug, Clone, Copy)]
pub struct SeriesAggregator<'a> {
    normalizer: &'a DateNormalizer,
}

impl<'a> SeriesAggregator<'a> {
    pub fn new(normalizer: &'a DateNormalizer) -> Self {
        Self { normalizer }
    }

    /// `createdAt`, falling back to the record's month label.
    pub fn record_date(&self, record: &MonthlyPerformanceRecord) -> Option<NaiveDate> {
        self.normalizer
            .normalize(&record.created_at)
            .or_else(|| self.normalizer.normalize(&record.month))
    }

    /// Sums both shapes into one accumulator of split values.
    pub fn monthly_parts(
        &self,
        records: &[MonthlyPerformanceRecord],
        history: &BTreeMap<String, HistoryValue>,
        metric: Metric,
        range: Option<&DateRange>,
    ) -> MonthlyParts {
        let in_range = |date: NaiveDate| range.map_or(true, |r| r.contains(date));
        let mut acc = MonthlyParts::new();
        let mut add = |date: NaiveDate, (permanent, temporary): (f64, f64)| {
            let slot = acc.entry(month_key(date)).or_insert((0.0, 0.0));
            slot.0 += permanent;
            slot.1 += temporary;
        };

        for record in records {
            if let Some(date) = self.record_date(record).filter(|d| in_range(*d)) {
                add(date, metric.record_parts(record));
            }
        }

        for (label, value) in history {
            let Some(date) = self.normalizer.normalize_month_str(label).filter(|d| in_range(*d)) else {
                continue;
            };
            if let Some(parts) = value.parts() {
                add(date, parts);
            }
        }

        acc
    }

    /// Month series of summed values from records and history.
    pub fn aggregate_monthly(
        &self,
        records: &[MonthlyPerformanceRecord],
        history: &BTreeMap<String, HistoryValue>,
        metric: Metric,
        range: Option<&DateRange>,
    ) -> Series {
        totals(&self.monthly_parts(records, history, metric, range))
    }

    /// Years holding any monthly value, whatever the date range.
    pub fn covered_years(
        &self,
        records: &[MonthlyPerformanceRecord],
        history: &BTreeMap<String, HistoryValue>,
    ) -> BTreeSet<String> {
        self.monthly_parts(records, history, Metric::Revenue, None)
            .keys()
            .filter_map(|key| month_key_to_year(key))
            .map(str::to_string)
            .collect()
    }

    /// Year series: monthly values summed per year, plus fallback annual
    /// values for years with no monthly coverage at all.
    ///
    /// `covered` holds the years with unfiltered monthly data. A year covered
    /// outside the date range never takes its whole-year fallback.
    pub fn aggregate_annual(
        &self,
        monthly: &Series,
        covered: &BTreeSet<String>,
        annual_fallback: &BTreeMap<String, HistoryValue>,
        range: Option<&DateRange>,
    ) -> Series {
        let mut years: BTreeMap<String, f64> = BTreeMap::new();
        for (key, value) in monthly.categories.iter().zip(&monthly.data) {
            if let Some(year) = month_key_to_year(key) {
                *years.entry(year.to_string()).or_default() += value;
            }
        }
        let covered: BTreeSet<String> = years.keys().chain(covered).cloned().collect();

        for (label, value) in annual_fallback {
            let Some(date) = self.normalizer.normalize_str(label) else {
                continue;
            };
            if range.is_some_and(|r| !year_overlaps(date.year(), r)) {
                continue;
            }
            let year = year_key(date);
            if covered.contains(&year) {
                continue;
            }
            if let Some(total) = value.total() {
                *years.entry(year).or_default() += total;
            }
        }

        Series::from_map(&years)
    }
}

/// Collapses split parts into one total per month.
pub fn totals(parts: &MonthlyParts) -> Series {
    let map: BTreeMap<String, f64> = parts.iter().map(|(k, (p, t))| (k.clone(), p + t)).collect();
    Series::from_map(&map)
}

/// Year category to its months.
pub fn year_drilldown(monthly: &Series) -> Vec<DrillSeries> {
    let mut by_year: BTreeMap<String, DrillSeries> = BTreeMap::new();
    for (key, value) in monthly.categories.iter().zip(&monthly.data) {
        let Some(year) = month_key_to_year(key) else {
            continue;
        };
        let drill = by_year.entry(year.to_string()).or_insert_with(|| DrillSeries {
            id: year.to_string(),
            name: year.to_string(),
            ..Default::default()
        });
        drill.categories.push(key.clone());
        drill.data.push(*value);
    }
    by_year.into_values().collect()
}

/// Month category to `{Permanent, Temporary}`.
pub fn split_drilldown(parts: &MonthlyParts) -> Vec<DrillSeries> {
    parts
        .iter()
        .map(|(key, (permanent, temporary))| DrillSeries {
            id: key.clone(),
            name: key.clone(),
            categories: vec!["Permanent".to_string(), "Temporary".to_string()],
            data: vec![*permanent, *temporary],
        })
        .collect()
}

fn year_overlaps(year: i32, range: &DateRange) -> bool {
    range.start.year() <= year && year <= range.end.year()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn normalizer() -> DateNormalizer {
        DateNormalizer::new(NaiveDate::from_ymd_opt(2024, 8, 1).unwrap())
    }

    fn record(month: &str, revenue: f64, permanent: f64, temporary: f64) -> MonthlyPerformanceRecord {
        MonthlyPerformanceRecord {
            created_at: serde_json::Value::Null,
            month: json!(month),
            revenue,
            head_permanent: permanent,
            head_temporary: temporary,
        }
    }

    fn history(entries: &[(&str, HistoryValue)]) -> BTreeMap<String, HistoryValue> {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_both_shapes_are_additive() {
        let normalizer = normalizer();
        let agg = SeriesAggregator::new(&normalizer);
        let records = vec![record("2024-01", 100.0, 0.0, 0.0), record("March", 50.0, 0.0, 0.0)];
        let hist = history(&[
            ("2024-01", HistoryValue::Amount(25.0)),
            ("February", HistoryValue::Amount(10.0)),
            ("garbage", HistoryValue::Amount(999.0)),
        ]);

        let series = agg.aggregate_monthly(&records, &hist, Metric::Revenue, None);
        assert_eq!(series.categories, vec!["2024-01", "2024-02", "2024-03"]);
        assert_eq!(series.data, vec![125.0, 10.0, 50.0]);
    }

    #[test]
    fn test_bare_year_in_monthly_history_is_skipped() {
        let normalizer = normalizer();
        let agg = SeriesAggregator::new(&normalizer);
        let hist = history(&[
            ("2024", HistoryValue::Amount(900.0)),
            ("2024-01", HistoryValue::Amount(10.0)),
        ]);

        let series = agg.aggregate_monthly(&[], &hist, Metric::Revenue, None);
        assert_eq!(series.categories, vec!["2024-01"]);
        assert_eq!(series.data, vec![10.0]);
    }

    #[test]
    fn test_created_at_takes_precedence_and_range_applies() {
        let normalizer = normalizer();
        let agg = SeriesAggregator::new(&normalizer);
        let mut rec = record("January", 40.0, 0.0, 0.0);
        rec.created_at = json!({ "seconds": 1_709_251_200 }); // 2024-03-01
        let range = DateRange::new(
            NaiveDate::from_ymd_opt(2024, 2, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 3, 31).unwrap(),
        );

        let series = agg.aggregate_monthly(
            &[rec, record("2024-06", 5.0, 0.0, 0.0)],
            &BTreeMap::new(),
            Metric::Revenue,
            Some(&range),
        );
        assert_eq!(series.categories, vec!["2024-03"]);
        assert_eq!(series.data, vec![40.0]);
    }

    #[test]
    fn test_annual_never_double_counts() {
        let normalizer = normalizer();
        let agg = SeriesAggregator::new(&normalizer);
        let monthly = agg.aggregate_monthly(
            &[record("2024-01", 100.0, 0.0, 0.0)],
            &BTreeMap::new(),
            Metric::Revenue,
            None,
        );
        let annual = agg.aggregate_annual(
            &monthly,
            &BTreeSet::new(),
            &history(&[
                ("2024", HistoryValue::Amount(500.0)),
                ("2023", HistoryValue::Amount(300.0)),
            ]),
            None,
        );

        assert_eq!(annual.categories, vec!["2023", "2024"]);
        assert_eq!(annual.value_at("2024"), Some(100.0));
        assert_eq!(annual.value_at("2023"), Some(300.0));
    }

    #[test]
    fn test_annual_fallback_skips_years_covered_outside_range() {
        let normalizer = normalizer();
        let agg = SeriesAggregator::new(&normalizer);
        let records = vec![record("2024-01", 100.0, 0.0, 0.0)];
        let fallback = history(&[
            ("2024", HistoryValue::Amount(500.0)),
            ("2025", HistoryValue::Amount(900.0)),
        ]);
        let range = DateRange::new(
            NaiveDate::from_ymd_opt(2024, 2, 1).unwrap(),
            NaiveDate::from_ymd_opt(2025, 12, 31).unwrap(),
        );

        let covered = agg.covered_years(&records, &BTreeMap::new());
        assert_eq!(covered, BTreeSet::from(["2024".to_string()]));

        let monthly = agg.aggregate_monthly(&records, &BTreeMap::new(), Metric::Revenue, Some(&range));
        assert!(monthly.is_empty());

        let annual = agg.aggregate_annual(&monthly, &covered, &fallback, Some(&range));
        assert_eq!(annual.categories, vec!["2025"]);
        assert_eq!(annual.data, vec![900.0]);
    }

    #[test]
    fn test_headcount_split_drilldown() {
        let normalizer = normalizer();
        let agg = SeriesAggregator::new(&normalizer);
        let parts = agg.monthly_parts(
            &[record("2024-05", 0.0, 3.0, 1.0)],
            &history(&[
                (
                    "2024-05",
                    HistoryValue::Split {
                        permanent: 2.0,
                        temporary: 4.0,
                    },
                ),
                ("2024-06", HistoryValue::Amount(7.0)),
            ]),
            Metric::Headcount,
            None,
        );

        let drill = split_drilldown(&parts);
        assert_eq!(drill.len(), 2);
        assert_eq!(drill[0].id, "2024-05");
        assert_eq!(drill[0].data, vec![5.0, 5.0]);
        assert_eq!(drill[1].data, vec![7.0, 0.0]);
        assert_eq!(totals(&parts).data, vec![10.0, 7.0]);
    }

    #[test]
    fn test_year_drilldown_groups_months() {
        let mut map = BTreeMap::new();
        map.insert("2023-12".to_string(), 1.0);
        map.insert("2024-01".to_string(), 2.0);
        map.insert("2024-02".to_string(), 3.0);
        let drill = year_drilldown(&Series::from_map(&map));

        assert_eq!(drill.len(), 2);
        assert_eq!(drill[1].id, "2024");
        assert_eq!(drill[1].categories, vec!["2024-01", "2024-02"]);
        assert_eq!(drill[1].data, vec![2.0, 3.0]);
    }
}
