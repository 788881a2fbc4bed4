//! Document storage abstraction
//!
//! Resources are persisted as JSON objects grouped into named collections.
//! The store understands the query descriptor (filters, sort, projection,
//! page window), enforces unique keys and keeps a per-document `__v`
//! version counter.

pub mod memory;

use crate::entity::UniqueKey;
use crate::query::{FilterClause, QueryDescriptor};
use crate::Result;
use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Map, Value};
use uuid::Uuid;

/// A stored JSON object
pub type Document = Map<String, Value>;

/// Count and arithmetic mean of one numeric field over a filtered set
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GroupStats {
    pub count: u64,
    pub mean: f64,
}

/// Trait for document persistence
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Insert a new document; its `id` field must hold a UUID
    async fn insert(&self, collection: &str, doc: Document, unique: &[UniqueKey])
        -> Result<Document>;

    /// Run a list query; returns projected documents in sort order
    async fn find(&self, collection: &str, query: &QueryDescriptor) -> Result<Vec<Document>>;

    /// First document (insertion order) matching every clause
    async fn find_one(&self, collection: &str, filters: &[FilterClause])
        -> Result<Option<Document>>;

    /// Fetch by id, provided the document also satisfies `filters`
    async fn find_by_id(
        &self,
        collection: &str,
        id: Uuid,
        filters: &[FilterClause],
    ) -> Result<Option<Document>>;

    /// Replace the whole body of a document, re-checking unique keys
    async fn replace(
        &self,
        collection: &str,
        id: Uuid,
        doc: Document,
        unique: &[UniqueKey],
    ) -> Result<Option<Document>>;

    /// Overwrite individual top-level fields without touching unique keys
    ///
    /// A `null` value removes the field.
    async fn update_fields(&self, collection: &str, id: Uuid, fields: Document)
        -> Result<Option<Document>>;

    /// Remove a document, returning its last state
    async fn delete(&self, collection: &str, id: Uuid) -> Result<Option<Document>>;

    /// Count/mean of `field` over the documents matching `filters`
    ///
    /// `None` when nothing matches.
    async fn group_stats(
        &self,
        collection: &str,
        filters: &[FilterClause],
        field: &str,
    ) -> Result<Option<GroupStats>>;
}
