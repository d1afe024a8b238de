//! Record store access.
//!
//! The engine never owns data: it reads documents through the
//! [`DocumentStore`] trait using equality and batched set-membership
//! predicates, then decodes them in [`Records`].

pub mod memory;
pub mod records;
pub mod snapshot;

pub use memory::MemoryStore;
pub use records::{ActivityRecords, Records};
pub use snapshot::load_snapshot;

use crate::error::StoreError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Largest value list an `In` predicate may carry.
pub const MAX_IN_VALUES: usize = 10;

pub const PARTICIPANTS: &str = "participants";
pub const APPLICATIONS: &str = "applications";
pub const COMPLIANCE_DOCUMENTS: &str = "complianceDocuments";

/// Path of a participant's monthly performance sub-collection.
pub fn monthly_collection(participant_id: &str) -> String {
    format!("{}/{}/monthlyPerformance", PARTICIPANTS, participant_id)
}

/// A stored document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub data: Value,
}

impl Document {
    pub fn new(id: impl Into<String>, data: Value) -> Self {
        Self {
            id: id.into(),
            data,
        }
    }

    /// Looks up a dotted field path; `"id"` falls back to the document id.
    pub fn field(&self, path: &str) -> Option<Value> {
        match lookup(&self.data, path) {
            Some(v) => Some(v.clone()),
            None if path == "id" => Some(Value::String(self.id.clone())),
            None => None,
        }
    }

    /// The document data with its id injected as `id` when absent.
    pub fn into_data_with_id(self) -> Value {
        let Document { id, mut data } = self;
        if let Value::Object(map) = &mut data {
            map.entry("id").or_insert(Value::String(id));
        }
        data
    }
}

/// Query predicate understood by every store.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// `field == value`.
    Eq { field: String, value: Value },
    /// `field` is one of `values` (at most [`MAX_IN_VALUES`]).
    In { field: String, values: Vec<Value> },
    /// Array `field` contains `value`.
    ArrayContains { field: String, value: Value },
}

impl Predicate {
    pub fn eq(field: &str, value: impl Into<Value>) -> Self {
        Predicate::Eq {
            field: field.to_string(),
            value: value.into(),
        }
    }

    pub fn is_in<I, V>(field: &str, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Predicate::In {
            field: field.to_string(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    pub fn array_contains(field: &str, value: impl Into<Value>) -> Self {
        Predicate::ArrayContains {
            field: field.to_string(),
            value: value.into(),
        }
    }

    /// Rejects predicates the store would refuse.
    pub fn validate(&self) -> Result<(), StoreError> {
        match self {
            Predicate::In { field, values } if values.len() > MAX_IN_VALUES => {
                Err(StoreError::PredicateTooLarge {
                    field: field.clone(),
                    len: values.len(),
                    max: MAX_IN_VALUES,
                })
            }
            _ => Ok(()),
        }
    }

    /// Evaluates the predicate against one document.
    pub fn matches(&self, doc: &Document) -> bool {
        match self {
            Predicate::Eq { field, value } => doc.field(field).as_ref() == Some(value),
            Predicate::In { field, values } => doc
                .field(field)
                .map(|v| values.contains(&v))
                .unwrap_or(false),
            Predicate::ArrayContains { field, value } => match doc.field(field) {
                Some(Value::Array(items)) => items.contains(value),
                _ => false,
            },
        }
    }
}

/// Read-only document store.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Fetches one document by id.
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError>;

    /// Returns every document in `collection` matching all `predicates`.
    async fn query(
        &self,
        collection: &str,
        predicates: &[Predicate],
    ) -> Result<Vec<Document>, StoreError>;
}

fn lookup<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.')
        .try_fold(value, |current, segment| current.get(segment))
        .filter(|v| !v.is_null())
}
