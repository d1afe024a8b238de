//! In-process document store.

use super::{Document, DocumentStore, Predicate};
use crate::error::StoreError;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};

/// Document store held in memory, with the same predicate limits as a
/// remote store. Collections keep insertion order.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    collections: BTreeMap<String, Vec<Document>>,
    /// Collections whose reads fail, for exercising error paths.
    failing: HashSet<String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a document.
    pub fn insert(&mut self, collection: &str, id: &str, data: Value) {
        let docs = self.collections.entry(collection.to_string()).or_default();
        match docs.iter_mut().find(|d| d.id == id) {
            Some(existing) => existing.data = data,
            None => docs.push(Document::new(id, data)),
        }
    }

    /// Builder form of [`insert`](Self::insert).
    pub fn with(mut self, collection: &str, id: &str, data: Value) -> Self {
        self.insert(collection, id, data);
        self
    }

    /// Makes every read of `collection` fail with `StoreError::Unavailable`.
    pub fn fail_collection(&mut self, collection: &str) {
        self.failing.insert(collection.to_string());
    }

    pub fn collection_names(&self) -> impl Iterator<Item = &str> {
        self.collections.keys().map(String::as_str)
    }

    pub fn len(&self, collection: &str) -> usize {
        self.collections.get(collection).map_or(0, Vec::len)
    }

    fn check(&self, collection: &str) -> Result<(), StoreError> {
        if self.failing.contains(collection) {
            return Err(StoreError::Unavailable(format!(
                "collection {} is offline",
                collection
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError> {
        self.check(collection)?;
        Ok(self
            .collections
            .get(collection)
            .and_then(|docs| docs.iter().find(|d| d.id == id))
            .cloned())
    }

    async fn query(
        &self,
        collection: &str,
        predicates: &[Predicate],
    ) -> Result<Vec<Document>, StoreError> {
        self.check(collection)?;
        for predicate in predicates {
            predicate.validate()?;
        }

        Ok(self
            .collections
            .get(collection)
            .map(|docs| {
                docs.iter()
                    .filter(|doc| predicates.iter().all(|p| p.matches(doc)))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }
}
