//! In-process document store
//!
//! Collections are vectors of documents in insertion order behind a single
//! `RwLock`, so every operation is atomic with respect to the others.

use super::{Document, DocumentStore, GroupStats};
use crate::entity::UniqueKey;
use crate::query::{FilterClause, QueryDescriptor, ID_FIELD, VERSION_FIELD};
use crate::{NatoursError, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Debug, Clone)]
struct StoredDocument {
    id: Uuid,
    body: Document,
    keys: Vec<UniqueKey>,
}

#[derive(Debug, Default)]
struct Collection {
    docs: Vec<StoredDocument>,
}

impl Collection {
    fn position(&self, id: Uuid) -> Option<usize> {
        self.docs.iter().position(|d| d.id == id)
    }

    fn check_unique(&self, unique: &[UniqueKey], skip: Option<Uuid>) -> Result<()> {
        for key in unique {
            let taken = self
                .docs
                .iter()
                .filter(|d| Some(d.id) != skip)
                .any(|d| d.keys.contains(key));
            if taken {
                return Err(NatoursError::DuplicateKey {
                    field: key.name.to_string(),
                    value: key.value.clone(),
                });
            }
        }
        Ok(())
    }
}

/// `DocumentStore` kept entirely in memory
#[derive(Debug, Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<String, Collection>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of documents in a collection, ignoring every filter
    pub async fn len(&self, collection: &str) -> usize {
        self.collections
            .read()
            .await
            .get(collection)
            .map_or(0, |c| c.docs.len())
    }

    pub async fn is_empty(&self, collection: &str) -> bool {
        self.len(collection).await == 0
    }
}

fn document_id(doc: &Document) -> Result<Uuid> {
    doc.get(ID_FIELD)
        .and_then(Value::as_str)
        .and_then(|raw| Uuid::parse_str(raw).ok())
        .ok_or_else(|| NatoursError::DatabaseError("document has no valid id".to_string()))
}

fn version(doc: &Document) -> u64 {
    doc.get(VERSION_FIELD).and_then(Value::as_u64).unwrap_or(0)
}

fn matches_all(doc: &Document, filters: &[FilterClause]) -> bool {
    filters.iter().all(|clause| clause.matches(doc))
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn insert(
        &self,
        collection: &str,
        mut doc: Document,
        unique: &[UniqueKey],
    ) -> Result<Document> {
        let id = document_id(&doc)?;
        let mut collections = self.collections.write().await;
        let coll = collections.entry(collection.to_string()).or_default();

        if coll.position(id).is_some() {
            return Err(NatoursError::DuplicateKey {
                field: ID_FIELD.to_string(),
                value: id.to_string(),
            });
        }
        coll.check_unique(unique, None)?;

        doc.insert(VERSION_FIELD.to_string(), Value::from(0u64));
        coll.docs.push(StoredDocument {
            id,
            body: doc.clone(),
            keys: unique.to_vec(),
        });
        tracing::trace!(collection, %id, "document inserted");
        Ok(doc)
    }

    async fn find(&self, collection: &str, query: &QueryDescriptor) -> Result<Vec<Document>> {
        let collections = self.collections.read().await;
        let Some(coll) = collections.get(collection) else {
            return Ok(Vec::new());
        };

        let mut hits: Vec<&Document> = coll
            .docs
            .iter()
            .map(|d| &d.body)
            .filter(|body| query.matches(body))
            .collect();
        hits.sort_by(|a, b| query.compare(a, b));

        Ok(hits
            .into_iter()
            .skip(query.skip())
            .take(query.take())
            .map(|body| query.projection.apply(body.clone()))
            .collect())
    }

    async fn find_one(
        &self,
        collection: &str,
        filters: &[FilterClause],
    ) -> Result<Option<Document>> {
        let collections = self.collections.read().await;
        Ok(collections.get(collection).and_then(|coll| {
            coll.docs
                .iter()
                .find(|d| matches_all(&d.body, filters))
                .map(|d| d.body.clone())
        }))
    }

    async fn find_by_id(
        &self,
        collection: &str,
        id: Uuid,
        filters: &[FilterClause],
    ) -> Result<Option<Document>> {
        let collections = self.collections.read().await;
        Ok(collections.get(collection).and_then(|coll| {
            coll.docs
                .iter()
                .find(|d| d.id == id && matches_all(&d.body, filters))
                .map(|d| d.body.clone())
        }))
    }

    async fn replace(
        &self,
        collection: &str,
        id: Uuid,
        mut doc: Document,
        unique: &[UniqueKey],
    ) -> Result<Option<Document>> {
        let mut collections = self.collections.write().await;
        let Some(coll) = collections.get_mut(collection) else {
            return Ok(None);
        };
        let Some(pos) = coll.position(id) else {
            return Ok(None);
        };
        coll.check_unique(unique, Some(id))?;

        let stored = &mut coll.docs[pos];
        doc.insert(ID_FIELD.to_string(), Value::String(id.to_string()));
        doc.insert(
            VERSION_FIELD.to_string(),
            Value::from(version(&stored.body) + 1),
        );
        stored.body = doc.clone();
        stored.keys = unique.to_vec();
        Ok(Some(doc))
    }

    async fn update_fields(
        &self,
        collection: &str,
        id: Uuid,
        fields: Document,
    ) -> Result<Option<Document>> {
        let mut collections = self.collections.write().await;
        let Some(stored) = collections
            .get_mut(collection)
            .and_then(|coll| coll.docs.iter_mut().find(|d| d.id == id))
        else {
            return Ok(None);
        };

        for (key, value) in fields {
            if key == ID_FIELD || key == VERSION_FIELD {
                continue;
            }
            if value.is_null() {
                stored.body.remove(&key);
            } else {
                stored.body.insert(key, value);
            }
        }
        Ok(Some(stored.body.clone()))
    }

    async fn delete(&self, collection: &str, id: Uuid) -> Result<Option<Document>> {
        let mut collections = self.collections.write().await;
        let Some(coll) = collections.get_mut(collection) else {
            return Ok(None);
        };
        Ok(coll.position(id).map(|pos| coll.docs.remove(pos).body))
    }

    async fn group_stats(
        &self,
        collection: &str,
        filters: &[FilterClause],
        field: &str,
    ) -> Result<Option<GroupStats>> {
        let collections = self.collections.read().await;
        let Some(coll) = collections.get(collection) else {
            return Ok(None);
        };

        let values: Vec<f64> = coll
            .docs
            .iter()
            .filter(|d| matches_all(&d.body, filters))
            .filter_map(|d| d.body.get(field).and_then(Value::as_f64))
            .collect();

        if values.is_empty() {
            return Ok(None);
        }
        let count = values.len() as u64;
        let mean = values.iter().sum::<f64>() / values.len() as f64;
        Ok(Some(GroupStats { count, mean }))
    }
}
