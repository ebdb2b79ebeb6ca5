//! In-memory reference implementation of the record store.
//!
//! Deterministic and test-friendly; collections are plain vectors behind one
//! RwLock, so every operation is atomic per call. Production deployments
//! should back the same trait with a transactional database.

use crate::traits::{Document, Filter, Mutation, RecordStore, UpdateOptions};
use crate::{StoreError, StoreResult};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::RwLock;

/// In-memory record store adapter.
#[derive(Default)]
pub struct InMemoryRecordStore {
    collections: RwLock<HashMap<String, Vec<Document>>>,
}

impl InMemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of documents in a collection. Test/inspection helper.
    pub fn count(&self, collection: &str) -> usize {
        self.collections
            .read()
            .map(|guard| guard.get(collection).map_or(0, Vec::len))
            .unwrap_or(0)
    }
}

fn apply_mutation(document: &mut Document, mutation: &Mutation) -> StoreResult<()> {
    for (field, value) in &mutation.set {
        document.insert(field.clone(), value.clone());
    }
    for (field, amount) in &mutation.inc {
        let current = match document.get(field) {
            None | Some(Value::Null) => 0,
            Some(Value::Number(n)) => n.as_i64().ok_or_else(|| {
                StoreError::InvalidInput(format!("field {field} is not an integer"))
            })?,
            Some(other) => {
                return Err(StoreError::InvalidInput(format!(
                    "cannot increment non-numeric field {field}: {other}"
                )))
            }
        };
        let next = current.checked_add(*amount).ok_or_else(|| {
            StoreError::InvalidInput(format!(
                "incrementing {field} by {amount} overflows (current {current})"
            ))
        })?;
        document.insert(field.clone(), Value::from(next));
    }
    Ok(())
}

#[async_trait]
impl RecordStore for InMemoryRecordStore {
    async fn insert(&self, collection: &str, document: Document) -> StoreResult<Document> {
        let mut guard = self
            .collections
            .write()
            .map_err(|_| StoreError::Backend("collections lock poisoned".to_string()))?;
        guard
            .entry(collection.to_string())
            .or_default()
            .push(document.clone());
        Ok(document)
    }

    async fn find_one(&self, collection: &str, filter: &Filter) -> StoreResult<Option<Document>> {
        let guard = self
            .collections
            .read()
            .map_err(|_| StoreError::Backend("collections lock poisoned".to_string()))?;
        Ok(guard
            .get(collection)
            .and_then(|docs| docs.iter().find(|doc| filter.matches(doc)).cloned()))
    }

    async fn find_all(&self, collection: &str, filter: &Filter) -> StoreResult<Vec<Document>> {
        let guard = self
            .collections
            .read()
            .map_err(|_| StoreError::Backend("collections lock poisoned".to_string()))?;
        Ok(guard
            .get(collection)
            .map(|docs| {
                docs.iter()
                    .filter(|doc| filter.matches(doc))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn update(
        &self,
        collection: &str,
        filter: &Filter,
        mutation: Mutation,
        options: UpdateOptions,
    ) -> StoreResult<Document> {
        let mut guard = self
            .collections
            .write()
            .map_err(|_| StoreError::Backend("collections lock poisoned".to_string()))?;
        let docs = guard.entry(collection.to_string()).or_default();

        if let Some(doc) = docs.iter_mut().find(|doc| filter.matches(doc)) {
            apply_mutation(doc, &mutation)?;
            return Ok(doc.clone());
        }

        if !options.upsert {
            return Err(StoreError::NotFound(format!(
                "no document in {collection} matches {:?}",
                filter.fields()
            )));
        }

        // Upsert: seed the new document from the filter's key fields so
        // increments start from a baseline of 0.
        let mut doc = filter.fields().clone();
        apply_mutation(&mut doc, &mutation)?;
        docs.push(doc.clone());
        Ok(doc)
    }
}
