//! Request orchestration.
//!
//! [`AnalyticsFacade`] is the single entry point of the library. It reads a
//! participant's records, folds them into an [`AnalyticsBundle`] and, when a
//! cohort is enabled, overlays averaged peer metrics of the same shape.
//!
//! [`AnalyticsBundle`]: crate::models::AnalyticsBundle

pub mod cancel;
pub mod facade;

pub use cancel::{AnalyticsSession, CancellationToken};
pub use facade::AnalyticsFacade;

use crate::config::CohortConfig;
use crate::store::MAX_IN_VALUES;

/// Default number of peers averaged per request.
pub const DEFAULT_MAX_PEERS: usize = 25;

/// Limits the engine works under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Upper bound on resolved and averaged peers, at most [`DEFAULT_MAX_PEERS`].
    pub max_peers: usize,
    /// Ids per batched membership query, at most [`MAX_IN_VALUES`].
    pub batch_size: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_peers: DEFAULT_MAX_PEERS,
            batch_size: MAX_IN_VALUES,
        }
    }
}

impl EngineConfig {
    pub fn new(max_peers: usize, batch_size: usize) -> Self {
        Self {
            max_peers: max_peers.clamp(1, DEFAULT_MAX_PEERS),
            batch_size: batch_size.clamp(1, MAX_IN_VALUES),
        }
    }
}

impl From<&CohortConfig> for EngineConfig {
    fn from(config: &CohortConfig) -> Self {
        Self::new(config.max_peers, config.batch_size)
    }
}
