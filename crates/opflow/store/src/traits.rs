use crate::StoreResult;
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// A stored record: a JSON object keyed by domain-specific identifier fields.
pub type Document = Map<String, Value>;

/// Conjunction of field == value conditions.
#[derive(Clone, Debug, Default)]
pub struct Filter(Map<String, Value>);

impl Filter {
    pub fn by(field: impl Into<String>, value: Value) -> Self {
        let mut map = Map::new();
        map.insert(field.into(), value);
        Self(map)
    }

    pub fn and(mut self, field: impl Into<String>, value: Value) -> Self {
        self.0.insert(field.into(), value);
        self
    }

    /// True when every filter field is present and equal on the document.
    pub fn matches(&self, document: &Document) -> bool {
        self.0
            .iter()
            .all(|(field, value)| document.get(field) == Some(value))
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }
}

/// A record mutation: `$set`-style assignments plus `$inc`-style increments.
#[derive(Clone, Debug, Default)]
pub struct Mutation {
    pub set: Map<String, Value>,
    pub inc: BTreeMap<String, i64>,
}

impl Mutation {
    pub fn set(field: impl Into<String>, value: Value) -> Self {
        let mut mutation = Self::default();
        mutation.set.insert(field.into(), value);
        mutation
    }

    pub fn and_set(mut self, field: impl Into<String>, value: Value) -> Self {
        self.set.insert(field.into(), value);
        self
    }

    pub fn inc(field: impl Into<String>, amount: i64) -> Self {
        let mut mutation = Self::default();
        mutation.inc.insert(field.into(), amount);
        mutation
    }
}

/// Options for update-style operations.
#[derive(Clone, Copy, Debug, Default)]
pub struct UpdateOptions {
    /// Create the record when the filter matches nothing. Incremented fields
    /// start from a baseline of 0 on the created record.
    pub upsert: bool,
}

impl UpdateOptions {
    pub fn upsert() -> Self {
        Self { upsert: true }
    }
}

/// Storage interface for named collections of JSON documents.
///
/// Concurrency control across callers is the implementation's concern; each
/// operation is a single atomic request. The executor never wraps multiple
/// calls in a transaction.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Append a document and return it as stored.
    async fn insert(&self, collection: &str, document: Document) -> StoreResult<Document>;

    /// First document matching the filter, if any.
    async fn find_one(&self, collection: &str, filter: &Filter) -> StoreResult<Option<Document>>;

    /// All documents matching the filter, in insertion order.
    async fn find_all(&self, collection: &str, filter: &Filter) -> StoreResult<Vec<Document>>;

    /// Apply a mutation to the first matching document and return the
    /// post-update document. With `upsert`, a missing document is created
    /// from the filter's fields before the mutation is applied.
    async fn update(
        &self,
        collection: &str,
        filter: &Filter,
        mutation: Mutation,
        options: UpdateOptions,
    ) -> StoreResult<Document>;

    /// Increment one numeric field, creating the record at baseline 0 first
    /// when absent (and `upsert` is set). Atomic per call.
    async fn increment(
        &self,
        collection: &str,
        filter: &Filter,
        field: &str,
        amount: i64,
        options: UpdateOptions,
    ) -> StoreResult<Document> {
        self.update(collection, filter, Mutation::inc(field, amount), options)
            .await
    }
}
