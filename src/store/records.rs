//! Typed reads over a [`DocumentStore`].

use super::{
    monthly_collection, Document, DocumentStore, Predicate, APPLICATIONS, COMPLIANCE_DOCUMENTS,
    PARTICIPANTS,
};
use crate::error::StoreError;
use crate::models::{
    Application, ComplianceDocument, InterventionSource, MonthlyPerformanceRecord, Participant,
};
use futures::future::join_all;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};

/// Decoding read layer shared by the subject and peer paths.
#[derive(Clone, Copy)]
pub struct Records<'a> {
    store: &'a dyn DocumentStore,
}

/// A participant's activity records, read independently of each other.
pub struct ActivityRecords {
    pub compliance: Result<Vec<ComplianceDocument>, StoreError>,
    pub interventions: Vec<(InterventionSource, Result<Vec<Value>, StoreError>)>,
    pub monthly: Result<Vec<MonthlyPerformanceRecord>, StoreError>,
}

/// Activity records after read failures were resolved.
#[derive(Debug, Clone, Default)]
pub struct Activity {
    pub compliance: Vec<ComplianceDocument>,
    pub interventions: Vec<(InterventionSource, Vec<Value>)>,
    pub monthly: Vec<MonthlyPerformanceRecord>,
}

impl ActivityRecords {
    /// All reads must have succeeded.
    pub fn into_complete(self) -> Result<Activity, StoreError> {
        let interventions = self
            .interventions
            .into_iter()
            .map(|(source, records)| records.map(|r| (source, r)))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Activity {
            compliance: self.compliance?,
            interventions,
            monthly: self.monthly?,
        })
    }

    /// Failed reads become empty, with one warning each.
    pub fn into_lenient(self, warnings: &mut Vec<String>) -> Activity {
        let mut soften = |what: &str, err: StoreError| {
            warn!("Could not load {}: {}", what, err);
            warnings.push(format!("{} unavailable: {}", what, err));
        };

        let compliance = self.compliance.unwrap_or_else(|e| {
            soften("compliance documents", e);
            Vec::new()
        });
        let monthly = self.monthly.unwrap_or_else(|e| {
            soften("monthly performance", e);
            Vec::new()
        });
        let interventions = self
            .interventions
            .into_iter()
            .map(|(source, records)| {
                let records = records.unwrap_or_else(|e| {
                    soften(source.collection(), e);
                    Vec::new()
                });
                (source, records)
            })
            .collect();

        Activity {
            compliance,
            interventions,
            monthly,
        }
    }
}

impl<'a> Records<'a> {
    pub fn new(store: &'a dyn DocumentStore) -> Self {
        Self { store }
    }

    pub async fn participant(&self, id: &str) -> Result<Option<Participant>, StoreError> {
        match self.store.get(PARTICIPANTS, id).await? {
            Some(doc) => decode(PARTICIPANTS, doc).map(Some),
            None => Ok(None),
        }
    }

    /// First application filed by a participant.
    pub async fn application(&self, participant_id: &str) -> Result<Option<Application>, StoreError> {
        let apps = self
            .applications_where(&[Predicate::eq("participantId", participant_id)])
            .await?;
        Ok(apps.into_iter().next())
    }

    pub async fn participants_where(
        &self,
        predicates: &[Predicate],
    ) -> Result<Vec<Participant>, StoreError> {
        let docs = self.store.query(PARTICIPANTS, predicates).await?;
        Ok(decode_all(PARTICIPANTS, docs))
    }

    pub async fn applications_where(
        &self,
        predicates: &[Predicate],
    ) -> Result<Vec<Application>, StoreError> {
        let docs = self.store.query(APPLICATIONS, predicates).await?;
        Ok(decode_all(APPLICATIONS, docs))
    }

    /// One batched read; `ids` must fit a single `In` predicate.
    pub async fn participants_by_ids(&self, ids: &[String]) -> Result<Vec<Participant>, StoreError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        self.participants_where(&[Predicate::is_in("id", ids.iter().cloned())])
            .await
    }

    /// One batched read; `participant_ids` must fit a single `In` predicate.
    pub async fn applications_for(
        &self,
        participant_ids: &[String],
    ) -> Result<Vec<Application>, StoreError> {
        if participant_ids.is_empty() {
            return Ok(Vec::new());
        }
        self.applications_where(&[Predicate::is_in(
            "participantId",
            participant_ids.iter().cloned(),
        )])
        .await
    }

    pub async fn compliance(&self, participant_id: &str) -> Result<Vec<ComplianceDocument>, StoreError> {
        let docs = self
            .store
            .query(
                COMPLIANCE_DOCUMENTS,
                &[Predicate::eq("participantId", participant_id)],
            )
            .await?;
        Ok(decode_all(COMPLIANCE_DOCUMENTS, docs))
    }

    /// Raw records of one intervention source; shapes differ per source.
    pub async fn interventions(
        &self,
        source: InterventionSource,
        participant_id: &str,
    ) -> Result<Vec<Value>, StoreError> {
        let docs = self
            .store
            .query(
                source.collection(),
                &[Predicate::eq("participantId", participant_id)],
            )
            .await?;
        Ok(docs.into_iter().map(Document::into_data_with_id).collect())
    }

    pub async fn monthly(
        &self,
        participant_id: &str,
    ) -> Result<Vec<MonthlyPerformanceRecord>, StoreError> {
        let collection = monthly_collection(participant_id);
        let docs = self.store.query(&collection, &[]).await?;
        Ok(decode_all(&collection, docs))
    }

    /// Issues every activity read for a participant concurrently.
    pub async fn activity(&self, participant_id: &str) -> ActivityRecords {
        let intervention_reads = join_all(
            InterventionSource::ALL
                .into_iter()
                .map(|source| async move { (source, self.interventions(source, participant_id).await) }),
        );

        let (compliance, interventions, monthly) = futures::join!(
            self.compliance(participant_id),
            intervention_reads,
            self.monthly(participant_id),
        );

        ActivityRecords {
            compliance,
            interventions,
            monthly,
        }
    }
}

fn decode<T: DeserializeOwned>(collection: &str, doc: Document) -> Result<T, StoreError> {
    let id = doc.id.clone();
    serde_json::from_value(doc.into_data_with_id()).map_err(|source| StoreError::Decode {
        collection: collection.to_string(),
        id,
        source,
    })
}

/// Malformed documents are skipped rather than failing the read.
fn decode_all<T: DeserializeOwned>(collection: &str, docs: Vec<Document>) -> Vec<T> {
    docs.into_iter()
        .filter_map(|doc| match decode(collection, doc) {
            Ok(value) => Some(value),
            Err(e) => {
                debug!("Skipping document: {}", e);
                None
            }
        })
        .collect()
}
