//! End-to-end tests of the analytics facade over an in-memory store.

use async_trait::async_trait;
use chrono::NaiveDate;
use peerbench::models::CategoryCount;
use peerbench::store::{Document, DocumentStore, MemoryStore, Predicate};
use peerbench::{
    AnalyticsError, AnalyticsFacade, AnalyticsSession, CancellationToken, CohortDefinition,
    CohortDimension, DateRange, EngineConfig, FilterCriteria, StoreError,
};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn seeded_store() -> MemoryStore {
    MemoryStore::new()
        .with(
            "participants",
            "S",
            json!({
                "name": "Acme Farms",
                "companyCode": "ORG",
                "sector": "Agri",
                "gender": "F",
                "revenueHistory": { "annual": { "2024": 500, "2023": 300 } }
            }),
        )
        .with(
            "applications",
            "AS",
            json!({ "participantId": "S", "programId": "P1", "companyCode": "ORG" }),
        )
        .with(
            "participants/S/monthlyPerformance",
            "m1",
            json!({ "month": "2024-01", "revenue": 100, "headPermanent": 3, "headTemporary": 1 }),
        )
        .with(
            "requiredInterventions",
            "r1",
            json!({ "participantId": "S", "interventionId": "i1", "title": "Tax", "area": "Finance" }),
        )
        .with(
            "completedInterventions",
            "c1",
            json!({
                "participantId": "S",
                "interventionId": "i1",
                "interventionTitle": "Tax",
                "areaOfSupport": "Finance",
                "completedAt": "2024-02-01"
            }),
        )
        .with(
            "assignedInterventions",
            "a1",
            json!({ "participantId": "S", "interventionId": "i2", "title": "Pitch", "area": "Marketing" }),
        )
        .with(
            "complianceDocuments",
            "d1",
            json!({ "participantId": "S", "status": "valid" }),
        )
        .with(
            "complianceDocuments",
            "d2",
            json!({ "participantId": "S", "status": "expired" }),
        )
        .with(
            "participants",
            "EMPTY",
            json!({ "name": "Newcomer", "companyCode": "ORG" }),
        )
}

fn with_peers(mut store: MemoryStore) -> MemoryStore {
    for (id, month, revenue) in [("A", "2024-01", 50), ("B", "2024-03", 70)] {
        store.insert(
            "participants",
            id,
            json!({ "companyCode": "ORG", "sector": "Agri", "gender": "M" }),
        );
        store.insert(
            &format!("participants/{}/monthlyPerformance", id),
            "m1",
            json!({ "month": month, "revenue": revenue }),
        );
        store.insert(
            "complianceDocuments",
            &format!("{}-doc", id),
            json!({ "participantId": id, "status": "missing" }),
        );
    }
    store
}

/// Delays every read before delegating to an in-memory store.
struct SlowStore {
    inner: MemoryStore,
    delay: Duration,
}

#[async_trait]
impl DocumentStore for SlowStore {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError> {
        tokio::time::sleep(self.delay).await;
        self.inner.get(collection, id).await
    }

    async fn query(
        &self,
        collection: &str,
        predicates: &[Predicate],
    ) -> Result<Vec<Document>, StoreError> {
        tokio::time::sleep(self.delay).await;
        self.inner.query(collection, predicates).await
    }
}

fn facade(store: MemoryStore) -> AnalyticsFacade {
    AnalyticsFacade::new(Arc::new(store), EngineConfig::default())
        .with_reference_date(date(2024, 12, 1))
}

#[tokio::test]
async fn test_subject_only_bundle() {
    let facade = facade(seeded_store());
    let bundle = facade
        .compute_analytics(
            "S",
            &FilterCriteria::default(),
            CohortDefinition::disabled(),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(bundle.participant_name.as_deref(), Some("Acme Farms"));
    assert_eq!(bundle.program_id.as_deref(), Some("P1"));

    // Years with monthly coverage never take the annual fallback.
    assert_eq!(bundle.revenue.annual.categories, vec!["2023", "2024"]);
    assert_eq!(bundle.revenue.annual.data, vec![300.0, 100.0]);
    assert_eq!(bundle.revenue.monthly.data, vec![100.0]);

    // The assigned intervention was never required.
    assert_eq!(bundle.kpis.required_interventions, 1);
    assert_eq!(bundle.kpis.completed_interventions, 1);
    assert_eq!(bundle.kpis.participation_rate, 100);
    assert_eq!(bundle.kpis.current_headcount, 4.0);
    assert_eq!(bundle.kpis.total_revenue, 400.0);

    assert_eq!(bundle.interventions.by_area, vec![CategoryCount::new("Finance", 1.0)]);
    assert_eq!(bundle.headcount.drilldown[0].data, vec![3.0, 1.0]);
    assert_eq!(
        bundle.compliance,
        vec![
            CategoryCount::new("Valid", 1.0),
            CategoryCount::new("Expired", 1.0)
        ]
    );
    assert!(bundle.peers.is_none());
    assert!(bundle.warnings.is_empty());
}

#[tokio::test]
async fn test_not_found_is_distinct_from_empty() {
    let facade = facade(seeded_store());
    let token = CancellationToken::new();

    let missing = facade
        .compute_analytics("NOPE", &FilterCriteria::default(), CohortDefinition::disabled(), &token)
        .await;
    assert!(matches!(missing, Err(ref e) if e.is_not_found()));

    let empty = facade
        .compute_analytics("EMPTY", &FilterCriteria::default(), CohortDefinition::disabled(), &token)
        .await
        .unwrap();
    assert!(empty.is_empty());
    assert_eq!(empty.kpis.participation_rate, 0);
}

#[tokio::test]
async fn test_date_range_filters_everything() {
    let facade = facade(seeded_store());
    let filters = FilterCriteria {
        date_range: Some(DateRange::new(date(2024, 2, 1), date(2024, 12, 31))),
        ..Default::default()
    };

    let bundle = facade
        .compute_analytics("S", &filters, CohortDefinition::disabled(), &CancellationToken::new())
        .await
        .unwrap();

    // 2024 has a January record, so its whole-year figure stays out.
    assert!(bundle.revenue.monthly.is_empty());
    assert!(bundle.revenue.annual.is_empty());
    assert_eq!(bundle.kpis.total_revenue, 0.0);
    assert_eq!(bundle.kpis.required_interventions, 1);
    assert_eq!(bundle.kpis.participation_rate, 100);
    assert_eq!(bundle.kpis.current_headcount, 0.0);
}

#[tokio::test]
async fn test_program_filter_excludes_other_programs() {
    let facade = facade(seeded_store());
    let filters = FilterCriteria {
        program: FilterCriteria::selection("P9"),
        ..Default::default()
    };

    let bundle = facade
        .compute_analytics("S", &filters, CohortDefinition::disabled(), &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(bundle.kpis.required_interventions, 0);

    let all = FilterCriteria {
        program: FilterCriteria::selection("all"),
        ..Default::default()
    };
    let bundle = facade
        .compute_analytics("S", &all, CohortDefinition::disabled(), &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(bundle.kpis.required_interventions, 1);
}

#[tokio::test]
async fn test_peer_overlay_aligned_to_subject_axis() {
    let facade = facade(with_peers(seeded_store()));
    let bundle = facade
        .compute_analytics(
            "S",
            &FilterCriteria::default(),
            CohortDefinition::on(CohortDimension::Sector),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    let peers = bundle.peers.expect("peer overlay");
    assert_eq!(peers.dimension, Some(CohortDimension::Sector));
    assert_eq!(peers.peer_count, 2);

    // Only peer A reported January; B's March has no subject category.
    assert_eq!(peers.revenue_monthly.categories, bundle.revenue.monthly.categories);
    assert_eq!(peers.revenue_monthly.data, vec![50.0]);

    assert_eq!(
        peers.compliance_by_status,
        vec![
            CategoryCount::new("Valid", 0.0),
            CategoryCount::new("Expired", 0.0),
            CategoryCount::new("Missing", 1.0),
        ]
    );
    assert!(bundle.warnings.is_empty());
}

#[tokio::test]
async fn test_missing_cohort_linkage_is_a_warning() {
    let facade = facade(with_peers(seeded_store()));
    let bundle = facade
        .compute_analytics(
            "EMPTY",
            &FilterCriteria::default(),
            CohortDefinition::on(CohortDimension::Program),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    let peers = bundle.peers.unwrap();
    assert_eq!(peers.peer_count, 0);
    assert!(peers.revenue_monthly.is_empty());
    assert_eq!(bundle.warnings.len(), 1);
    assert!(bundle.warnings[0].contains("No program"));
}

#[tokio::test]
async fn test_whole_cohort_failure_keeps_subject() {
    let mut store = with_peers(seeded_store());
    store.fail_collection("applications");
    let facade = facade(store);

    let bundle = facade
        .compute_analytics(
            "S",
            &FilterCriteria::default(),
            CohortDefinition::on(CohortDimension::Sector),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(bundle.revenue.monthly.data, vec![100.0]);
    let peers = bundle.peers.unwrap();
    assert_eq!(peers.peer_count, 0);
    assert!(peers.revenue_monthly.data.iter().all(|v| *v == 0.0));
    assert!(bundle
        .warnings
        .iter()
        .any(|w| w.starts_with("Peer averages unavailable")));
}

#[tokio::test]
async fn test_failing_subject_collection_is_soft() {
    let mut store = seeded_store();
    store.fail_collection("complianceDocuments");
    let facade = facade(store);

    let bundle = facade
        .compute_analytics(
            "S",
            &FilterCriteria::default(),
            CohortDefinition::disabled(),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert!(bundle.compliance.is_empty());
    assert_eq!(bundle.kpis.required_interventions, 1);
    assert_eq!(bundle.warnings.len(), 1);
}

#[tokio::test]
async fn test_failing_participant_read_is_hard() {
    let mut store = seeded_store();
    store.fail_collection("participants");
    let facade = facade(store);

    let result = facade
        .compute_analytics(
            "S",
            &FilterCriteria::default(),
            CohortDefinition::disabled(),
            &CancellationToken::new(),
        )
        .await;
    assert!(matches!(result, Err(AnalyticsError::Store(_))));
}

#[tokio::test]
async fn test_superseded_request_is_cancelled() {
    let facade = facade(seeded_store());
    let session = AnalyticsSession::new();
    let stale = session.begin();
    let fresh = session.begin();

    let result = facade
        .compute_analytics("S", &FilterCriteria::default(), CohortDefinition::disabled(), &stale)
        .await;
    assert!(matches!(result, Err(AnalyticsError::Cancelled)));

    let result = facade
        .compute_analytics("S", &FilterCriteria::default(), CohortDefinition::disabled(), &fresh)
        .await;
    assert!(result.is_ok());
}

#[tokio::test]
async fn test_request_superseded_in_flight_is_cancelled() {
    let store = SlowStore {
        inner: seeded_store(),
        delay: Duration::from_millis(300),
    };
    let facade = AnalyticsFacade::new(Arc::new(store), EngineConfig::default())
        .with_reference_date(date(2024, 12, 1));
    let session = AnalyticsSession::new();
    let first = session.begin();
    let criteria = FilterCriteria::default();

    let (result, second) = tokio::join!(
        facade.compute_analytics("S", &criteria, CohortDefinition::disabled(), &first),
        async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            session.begin()
        }
    );

    assert!(matches!(result, Err(AnalyticsError::Cancelled)));
    assert!(first.is_cancelled());
    assert!(!second.is_cancelled());
}

#[tokio::test]
async fn test_only_required_source_counts_as_required() {
    let store = MemoryStore::new()
        .with("participants", "Q", json!({ "name": "Quarry", "companyCode": "ORG" }))
        .with(
            "requiredInterventions",
            "r1",
            json!({ "participantId": "Q", "interventionId": "i1", "title": "Tax" }),
        )
        .with(
            "assignedInterventions",
            "a2",
            json!({ "participantId": "Q", "interventionId": "i2", "title": "Pitch" }),
        )
        .with(
            "interventionsDatabase",
            "d3",
            json!({ "participantId": "Q", "interventionId": "i3", "title": "Export" }),
        )
        .with(
            "completedInterventions",
            "c4",
            json!({
                "participantId": "Q",
                "interventionId": "i4",
                "title": "Branding",
                "area": "Marketing"
            }),
        );
    let facade = facade(store);

    let bundle = facade
        .compute_analytics(
            "Q",
            &FilterCriteria::default(),
            CohortDefinition::disabled(),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(bundle.kpis.required_interventions, 1);
    assert_eq!(bundle.kpis.completed_interventions, 1);
    assert_eq!(bundle.kpis.participation_rate, 100);
    assert_eq!(bundle.interventions.by_area, vec![CategoryCount::new("Marketing", 1.0)]);
}

#[tokio::test]
async fn test_repeated_calls_are_identical() {
    let facade = facade(with_peers(seeded_store()));
    let cohort = CohortDefinition::on(CohortDimension::Sector);
    let token = CancellationToken::new();

    let first = facade
        .compute_analytics("S", &FilterCriteria::default(), cohort, &token)
        .await
        .unwrap();
    let second = facade
        .compute_analytics("S", &FilterCriteria::default(), cohort, &token)
        .await
        .unwrap();

    assert_eq!(first.kpis, second.kpis);
    assert_eq!(first.revenue, second.revenue);
    assert_eq!(first.peers, second.peers);
}
