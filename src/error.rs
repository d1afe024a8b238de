//! Error types shared by the store and the analytics engine.

use thiserror::Error;

/// Failures raised by a [`DocumentStore`](crate::store::DocumentStore).
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backing store could not serve the read.
    #[error("record store unavailable: {0}")]
    Unavailable(String),

    /// A set-membership predicate exceeded the store's value limit.
    #[error("IN predicate on `{field}` has {len} values (max {max})")]
    PredicateTooLarge {
        field: String,
        len: usize,
        max: usize,
    },

    /// A document could not be decoded into its typed shape.
    #[error("failed to decode {collection}/{id}: {source}")]
    Decode {
        collection: String,
        id: String,
        #[source]
        source: serde_json::Error,
    },

    /// A snapshot file could not be read or parsed.
    #[error("invalid snapshot file {path}: {reason}")]
    Snapshot { path: String, reason: String },
}

/// Hard failures of an analytics request.
///
/// Everything else (bad dates, missing cohort linkage, failed peer reads) is
/// reported through `AnalyticsBundle::warnings` instead.
#[derive(Debug, Error)]
pub enum AnalyticsError {
    /// The subject participant does not exist.
    #[error("participant not found: {0}")]
    NotFound(String),

    /// The subject participant could not be read at all.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// A newer request superseded this one.
    #[error("analytics request was cancelled")]
    Cancelled,
}

impl AnalyticsError {
    /// True when the caller should show a "not found" page rather than an error.
    pub fn is_not_found(&self) -> bool {
        matches!(self, AnalyticsError::NotFound(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = StoreError::PredicateTooLarge {
            field: "participantId".to_string(),
            len: 12,
            max: 10,
        };
        assert_eq!(
            err.to_string(),
            "IN predicate on `participantId` has 12 values (max 10)"
        );

        let not_found = AnalyticsError::NotFound("P9".to_string());
        assert!(not_found.is_not_found());
        assert!(!AnalyticsError::Cancelled.is_not_found());

        let wrapped: AnalyticsError = StoreError::Unavailable("offline".to_string()).into();
        assert_eq!(wrapped.to_string(), "record store unavailable: offline");
    }
}
