//! Analysis modules.
//!
//! Normalization, filtering and folding of one participant's records into
//! series, distributions and KPIs. The same code path serves the subject and
//! every peer so the two stay filter-consistent.

pub mod aggregator;
pub mod filters;
pub mod interventions;
pub mod metrics;
pub mod series;

pub use aggregator::*;
pub use filters::FilterEngine;
pub use interventions::{merge_canonical, InterventionMerger};
pub use metrics::ParticipantMetrics;
pub use series::{Metric, SeriesAggregator};
