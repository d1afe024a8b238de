//! Data models for the analytics engine.
//!
//! Input records (participants, applications, monthly performance rows,
//! compliance documents) are read-only snapshots decoded from the record
//! store. Output types describe the analytics bundle handed to a renderer.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

// ---------------------------------------------------------------------------
// Input records
// ---------------------------------------------------------------------------

/// A historical value: either a plain amount or a permanent/temporary split.
///
/// An object is a split only when it names at least one of the two parts.
/// Anything else decodes as `Other` and carries no value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum HistoryValue {
    Amount(f64),
    Split { permanent: f64, temporary: f64 },
    Text(String),
    Other(Value),
}

impl From<Value> for HistoryValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Number(n) => match n.as_f64() {
                Some(v) => HistoryValue::Amount(v),
                None => HistoryValue::Other(Value::Number(n)),
            },
            Value::String(s) => HistoryValue::Text(s),
            Value::Object(ref map) if map.contains_key("permanent") || map.contains_key("temporary") => {
                HistoryValue::Split {
                    permanent: map.get("permanent").map_or(0.0, lenient_number),
                    temporary: map.get("temporary").map_or(0.0, lenient_number),
                }
            }
            other => HistoryValue::Other(other),
        }
    }
}

impl<'de> Deserialize<'de> for HistoryValue {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        Value::deserialize(deserializer).map(HistoryValue::from)
    }
}

impl HistoryValue {
    /// Returns the `(permanent, temporary)` parts. Plain amounts count as permanent.
    pub fn parts(&self) -> Option<(f64, f64)> {
        match self {
            HistoryValue::Amount(v) if v.is_finite() => Some((*v, 0.0)),
            HistoryValue::Split {
                permanent,
                temporary,
            } => Some((*permanent, *temporary)),
            HistoryValue::Text(s) => s
                .trim()
                .replace(',', "")
                .parse::<f64>()
                .ok()
                .filter(|v| v.is_finite())
                .map(|v| (v, 0.0)),
            _ => None,
        }
    }

    /// Returns the summed value, or `None` when it is not numeric.
    pub fn total(&self) -> Option<f64> {
        self.parts().map(|(p, t)| p + t)
    }
}

/// Label-keyed monthly and annual history stored on a participant.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct History {
    #[serde(default)]
    pub monthly: BTreeMap<String, HistoryValue>,
    #[serde(default)]
    pub annual: BTreeMap<String, HistoryValue>,
}

/// An incubation participant.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    /// Store document id.
    #[serde(default)]
    pub id: String,
    pub name: Option<String>,
    pub company_code: Option<String>,
    pub gender: Option<String>,
    pub sector: Option<String>,
    #[serde(default)]
    pub revenue_history: History,
    #[serde(default)]
    pub headcount_history: History,
}

/// A participant's application to a program.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Application {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub participant_id: String,
    pub program_id: Option<String>,
    pub company_code: Option<String>,
    pub status: Option<String>,
}

/// One row of the per-participant monthly performance sub-collection.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyPerformanceRecord {
    /// Raw timestamp; may be a structured timestamp object or a string.
    #[serde(default)]
    pub created_at: Value,
    /// Raw period label, e.g. `"April"` or `"2024-04"`.
    #[serde(default)]
    pub month: Value,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub revenue: f64,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub head_permanent: f64,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub head_temporary: f64,
}

impl MonthlyPerformanceRecord {
    pub fn headcount(&self) -> f64 {
        self.head_permanent + self.head_temporary
    }
}

/// Status of a compliance document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ComplianceStatus {
    Valid,
    Missing,
    Expired,
    /// Catch-all for any other value.
    Other,
}

impl ComplianceStatus {
    /// Distribution order used in every output.
    pub const ALL: [ComplianceStatus; 4] = [
        ComplianceStatus::Valid,
        ComplianceStatus::Missing,
        ComplianceStatus::Expired,
        ComplianceStatus::Other,
    ];
}

impl fmt::Display for ComplianceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ComplianceStatus::Valid => write!(f, "Valid"),
            ComplianceStatus::Missing => write!(f, "Missing"),
            ComplianceStatus::Expired => write!(f, "Expired"),
            ComplianceStatus::Other => write!(f, "Other"),
        }
    }
}

impl From<&str> for ComplianceStatus {
    fn from(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "valid" => ComplianceStatus::Valid,
            "missing" => ComplianceStatus::Missing,
            "expired" => ComplianceStatus::Expired,
            _ => ComplianceStatus::Other,
        }
    }
}

/// A compliance document attached to a participant.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComplianceDocument {
    #[serde(default)]
    pub id: String,
    pub status: Option<String>,
}

impl ComplianceDocument {
    pub fn status(&self) -> ComplianceStatus {
        self.status
            .as_deref()
            .map(ComplianceStatus::from)
            .unwrap_or(ComplianceStatus::Other)
    }
}

/// The four intervention sources, in increasing order of authority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InterventionSource {
    Required,
    Completed,
    Assigned,
    Database,
}

impl InterventionSource {
    /// Merge order: later entries overwrite earlier ones at the same key.
    pub const ALL: [InterventionSource; 4] = [
        InterventionSource::Required,
        InterventionSource::Completed,
        InterventionSource::Assigned,
        InterventionSource::Database,
    ];

    /// Store collection holding this source's records.
    pub fn collection(&self) -> &'static str {
        match self {
            InterventionSource::Required => "requiredInterventions",
            InterventionSource::Completed => "completedInterventions",
            InterventionSource::Assigned => "assignedInterventions",
            InterventionSource::Database => "interventionsDatabase",
        }
    }

    /// Status used when a record carries none.
    pub fn default_status(&self) -> &'static str {
        match self {
            InterventionSource::Required | InterventionSource::Database => "pending",
            InterventionSource::Completed => "completed",
            InterventionSource::Assigned => "assigned",
        }
    }
}

impl fmt::Display for InterventionSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.collection())
    }
}

/// Canonical intervention produced by the merger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Intervention {
    pub key: String,
    pub title: String,
    pub area: String,
    pub status: String,
    pub consultant_ref: Option<String>,
    pub completed_at: Option<NaiveDate>,
    pub intervention_date: Option<NaiveDate>,
    pub date: Option<NaiveDate>,
    pub program_id: Option<String>,
    pub company_code: Option<String>,
    /// Every source this key was seen in.
    pub sources: BTreeSet<InterventionSource>,
}

impl Intervention {
    /// `completedAt ?? interventionDate ?? date`.
    pub fn best_date(&self) -> Option<NaiveDate> {
        self.completed_at.or(self.intervention_date).or(self.date)
    }

    pub fn is_completed(&self) -> bool {
        self.status.eq_ignore_ascii_case("completed") || self.status.eq_ignore_ascii_case("done")
    }

    /// Seen in the required source, whichever source won the merge.
    pub fn is_required(&self) -> bool {
        self.sources.contains(&InterventionSource::Required)
    }
}

// ---------------------------------------------------------------------------
// Request parameters
// ---------------------------------------------------------------------------

/// Inclusive calendar-day range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }
}

/// Scoping applied uniformly to the subject and its peers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterCriteria {
    /// Caller's organization code.
    pub company_code: Option<String>,
    /// `None` means all programs.
    pub program: Option<String>,
    /// `None` means all consultants.
    pub consultant: Option<String>,
    pub date_range: Option<DateRange>,
}

impl FilterCriteria {
    /// Maps the UI sentinel `"all"` (and blank input) to `None`.
    pub fn selection(value: &str) -> Option<String> {
        let trimmed = value.trim();
        if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("all") {
            None
        } else {
            Some(trimmed.to_string())
        }
    }
}

/// Field the peer cohort is drawn on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CohortDimension {
    Gender,
    Sector,
    Program,
}

impl fmt::Display for CohortDimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CohortDimension::Gender => write!(f, "gender"),
            CohortDimension::Sector => write!(f, "sector"),
            CohortDimension::Program => write!(f, "program"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CohortDefinition {
    pub enabled: bool,
    pub dimension: CohortDimension,
}

impl CohortDefinition {
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            dimension: CohortDimension::Program,
        }
    }

    pub fn on(dimension: CohortDimension) -> Self {
        Self {
            enabled: true,
            dimension,
        }
    }
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

/// Ordered categories with one value each.
///
/// `categories` are unique and sorted ascending; `categories.len() == data.len()`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Series {
    pub categories: Vec<String>,
    pub data: Vec<f64>,
}

impl Series {
    /// Builds a series from a key-sorted accumulator.
    pub fn from_map(map: &BTreeMap<String, f64>) -> Self {
        let (categories, data) = map.iter().map(|(k, v)| (k.clone(), *v)).unzip();
        Self { categories, data }
    }

    pub fn len(&self) -> usize {
        self.categories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }

    pub fn value_at(&self, category: &str) -> Option<f64> {
        self.categories
            .iter()
            .position(|c| c == category)
            .map(|i| self.data[i])
    }

    pub fn total(&self) -> f64 {
        self.data.iter().sum()
    }

    pub fn to_map(&self) -> BTreeMap<String, f64> {
        self.categories
            .iter()
            .cloned()
            .zip(self.data.iter().copied())
            .collect()
    }

    /// Re-indexes onto `axis`; categories missing here become `0`.
    pub fn align_to(&self, axis: &[String]) -> Series {
        let values = self.to_map();
        Series {
            categories: axis.to_vec(),
            data: axis
                .iter()
                .map(|c| values.get(c).copied().unwrap_or(0.0))
                .collect(),
        }
    }
}

/// Child series addressed by the parent category it expands.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DrillSeries {
    /// Equals the parent's category key.
    pub id: String,
    pub name: String,
    pub categories: Vec<String>,
    pub data: Vec<f64>,
}

/// A named count; averages make it fractional for peers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryCount {
    pub name: String,
    pub count: f64,
}

impl CategoryCount {
    pub fn new(name: impl Into<String>, count: f64) -> Self {
        Self {
            name: name.into(),
            count,
        }
    }
}

/// Headline numbers for one participant.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Kpis {
    pub required_interventions: usize,
    pub completed_interventions: usize,
    /// `min(100, round(completed / required * 100))`, or 0 with nothing required.
    pub participation_rate: u32,
    /// Permanent plus temporary staff on the latest monthly record.
    pub current_headcount: f64,
    pub total_revenue: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RevenueView {
    pub monthly: Series,
    pub annual: Series,
    /// Year to constituent months.
    pub drilldown: Vec<DrillSeries>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HeadcountView {
    pub monthly: Series,
    /// Month to `{Permanent, Temporary}`.
    pub drilldown: Vec<DrillSeries>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InterventionView {
    /// Completed interventions per area.
    pub by_area: Vec<CategoryCount>,
    /// Area to per-title completed counts.
    pub drilldown: Vec<DrillSeries>,
}

/// Peer averages shaped exactly like the subject's outputs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PeerOverlay {
    pub dimension: Option<CohortDimension>,
    pub peer_count: usize,
    pub revenue_monthly: Series,
    pub revenue_annual: Series,
    pub headcount_monthly: Series,
    pub interventions_by_area: Vec<CategoryCount>,
    pub compliance_by_status: Vec<CategoryCount>,
}

/// Everything a renderer needs for one participant.
#[derive(Debug, Clone, Serialize)]
pub struct AnalyticsBundle {
    pub participant_id: String,
    pub participant_name: Option<String>,
    pub program_id: Option<String>,
    pub generated_at: DateTime<Utc>,
    pub kpis: Kpis,
    pub revenue: RevenueView,
    pub headcount: HeadcountView,
    pub interventions: InterventionView,
    pub compliance: Vec<CategoryCount>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub peers: Option<PeerOverlay>,
    /// Non-fatal problems encountered while computing the bundle.
    pub warnings: Vec<String>,
}

impl AnalyticsBundle {
    /// True when the participant exists but has nothing to chart.
    pub fn is_empty(&self) -> bool {
        self.revenue.monthly.is_empty()
            && self.revenue.annual.is_empty()
            && self.headcount.monthly.is_empty()
            && self.interventions.by_area.is_empty()
            && self.compliance.is_empty()
            && self.kpis.required_interventions == 0
    }
}

/// Accepts numbers, numeric strings and null; anything unparseable is `0`.
fn lenient_f64<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(|value| lenient_number(&value))
}

fn lenient_number(value: &Value) -> f64 {
    match value {
        Value::Number(n) => n.as_f64().unwrap_or(0.0),
        Value::String(s) => s.trim().replace(',', "").parse::<f64>().unwrap_or(0.0),
        _ => 0.0,
    }
}
