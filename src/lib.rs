//! PeerBench - participant performance analytics and peer benchmarking.
//!
//! The engine reads heterogeneous records about one incubation participant
//! (revenue, headcount, interventions, compliance documents) from a document
//! store, normalizes and merges them into drill-down time series, and on
//! request averages the same metrics across a bounded peer cohort.

pub mod analysis;
pub mod cli;
pub mod cohort;
pub mod config;
pub mod engine;
pub mod error;
pub mod models;
pub mod report;
pub mod store;
pub mod temporal;

pub use engine::{AnalyticsFacade, AnalyticsSession, CancellationToken, EngineConfig};
pub use error::{AnalyticsError, StoreError};
pub use models::{AnalyticsBundle, CohortDefinition, CohortDimension, DateRange, FilterCriteria};
