//! Generic CRUD over any [`Entity`]
//!
//! One factory instance per resource type. Lists go through the query
//! builder scoped by the entity's base filter, single reads can expand the
//! entity's declared relations, writes normalise and validate before they
//! reach the store.

use crate::entity::{self, Entity, Relation, RelationKind};
use crate::query::{build_query, FilterClause, QueryDescriptor, ID_FIELD, VERSION_FIELD};
use crate::store::{Document, DocumentStore};
use crate::{NatoursError, Result};
use serde_json::Value;
use std::marker::PhantomData;
use std::sync::Arc;
use uuid::Uuid;

pub struct ResourceFactory<E: Entity> {
    store: Arc<dyn DocumentStore>,
    _entity: PhantomData<fn() -> E>,
}

impl<E: Entity> Clone for ResourceFactory<E> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            _entity: PhantomData,
        }
    }
}

impl<E: Entity> ResourceFactory<E> {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            store,
            _entity: PhantomData,
        }
    }

    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    fn not_found() -> NatoursError {
        NatoursError::NotFound(format!("No {} found with that ID", E::NAME))
    }

    /// List documents for an untrusted query string, optionally scoped
    /// (e.g. reviews of one tour)
    pub async fn get_all(
        &self,
        params: &[(String, String)],
        scope: Vec<FilterClause>,
    ) -> Result<Vec<Document>> {
        let mut base = E::base_filter();
        base.extend(scope);
        let query = build_query(params, base)?;
        tracing::debug!(collection = E::COLLECTION, ?query, "listing documents");

        let docs = self.store.find(E::COLLECTION, &query).await?;
        Ok(docs.into_iter().map(hide_fields::<E>).collect())
    }

    /// Fetch one rendered document, expanding relations when asked
    pub async fn get_one(&self, id: Uuid, expand: bool) -> Result<Document> {
        let doc = self
            .store
            .find_by_id(E::COLLECTION, id, &E::base_filter())
            .await?
            .ok_or_else(Self::not_found)?;

        let mut doc = hide_fields::<E>(doc);
        if expand {
            for relation in E::relations() {
                let expanded = self.expand(relation, &doc).await?;
                doc.insert(relation.name.to_string(), expanded);
            }
        }
        Ok(doc)
    }

    async fn expand(&self, relation: &Relation, doc: &Document) -> Result<Value> {
        let base = (relation.base_filter)();
        match relation.kind {
            RelationKind::Reference => match doc.get(relation.field) {
                Some(Value::String(raw)) => Ok(self
                    .resolve(relation, raw, &base)
                    .await?
                    .map_or(Value::Null, Value::Object)),
                Some(Value::Array(ids)) => {
                    let mut resolved = Vec::with_capacity(ids.len());
                    for raw in ids.iter().filter_map(Value::as_str) {
                        if let Some(found) = self.resolve(relation, raw, &base).await? {
                            resolved.push(Value::Object(found));
                        }
                    }
                    Ok(Value::Array(resolved))
                }
                _ => Ok(Value::Null),
            },
            RelationKind::Virtual => {
                let Some(id) = doc.get(ID_FIELD).cloned() else {
                    return Ok(Value::Array(Vec::new()));
                };
                let mut filters = base;
                filters.push(FilterClause::eq(relation.field, id));
                let children = self
                    .store
                    .find(relation.collection, &QueryDescriptor::matching(filters))
                    .await?;
                Ok(Value::Array(
                    children
                        .into_iter()
                        .map(|child| Value::Object(relation.shape(child)))
                        .collect(),
                ))
            }
        }
    }

    async fn resolve(
        &self,
        relation: &Relation,
        raw: &str,
        base: &[FilterClause],
    ) -> Result<Option<Document>> {
        let Ok(id) = Uuid::parse_str(raw) else {
            return Ok(None);
        };
        Ok(self
            .store
            .find_by_id(relation.collection, id, base)
            .await?
            .map(|found| relation.shape(found)))
    }

    /// Typed entity by id, honouring the base filter
    pub async fn find_raw(&self, id: Uuid) -> Result<E> {
        self.store
            .find_by_id(E::COLLECTION, id, &E::base_filter())
            .await?
            .ok_or_else(Self::not_found)
            .and_then(entity::from_document)
    }

    /// First visible entity matching `filters`
    pub async fn find_where(&self, filters: Vec<FilterClause>) -> Result<Option<E>> {
        let mut all = E::base_filter();
        all.extend(filters);
        self.store
            .find_one(E::COLLECTION, &all)
            .await?
            .map(entity::from_document)
            .transpose()
    }

    /// Create from a client payload; protected fields are ignored
    pub async fn create_one(&self, mut payload: Document) -> Result<Document> {
        entity::strip_protected::<E>(&mut payload);
        let created = self.insert(entity::from_payload(payload)?).await?;
        Self::render(&created)
    }

    /// Normalise, validate and store a new entity
    pub async fn insert(&self, mut entity: E) -> Result<E> {
        entity.normalize();
        entity::validate_entity(&entity)?;
        let doc = entity::to_document(&entity)?;
        let stored = self
            .store
            .insert(E::COLLECTION, doc, &entity.unique_keys())
            .await?;
        tracing::info!(collection = E::COLLECTION, id = %entity.id(), "{} created", E::NAME);
        entity::from_document(stored)
    }

    /// Merge a partial payload into an existing entity and save it
    pub async fn patch(&self, id: Uuid, mut patch: Document) -> Result<E> {
        let mut doc = self
            .store
            .find_by_id(E::COLLECTION, id, &E::base_filter())
            .await?
            .ok_or_else(Self::not_found)?;

        entity::strip_protected::<E>(&mut patch);
        for (key, value) in patch {
            if value.is_null() {
                doc.remove(&key);
            } else {
                doc.insert(key, value);
            }
        }
        doc.remove(VERSION_FIELD);
        self.save(entity::from_payload(doc)?).await
    }

    pub async fn update_one(&self, id: Uuid, patch: Document) -> Result<Document> {
        let updated = self.patch(id, patch).await?;
        Self::render(&updated)
    }

    /// Normalise, validate and replace an existing entity
    pub async fn save(&self, mut entity: E) -> Result<E> {
        entity.normalize();
        entity::validate_entity(&entity)?;
        let doc = entity::to_document(&entity)?;
        let stored = self
            .store
            .replace(E::COLLECTION, entity.id(), doc, &entity.unique_keys())
            .await?
            .ok_or_else(Self::not_found)?;
        entity::from_document(stored)
    }

    /// Write individual fields without running validation
    pub async fn set_fields(&self, id: Uuid, fields: Document) -> Result<()> {
        self.store
            .update_fields(E::COLLECTION, id, fields)
            .await?
            .map(|_| ())
            .ok_or_else(Self::not_found)
    }

    /// Remove a visible entity, returning it
    pub async fn delete_one(&self, id: Uuid) -> Result<E> {
        let existing = self.find_raw(id).await?;
        self.store
            .delete(E::COLLECTION, id)
            .await?
            .ok_or_else(Self::not_found)?;
        tracing::info!(collection = E::COLLECTION, %id, "{} deleted", E::NAME);
        Ok(existing)
    }

    /// Client-facing form of an entity
    pub fn render(entity: &E) -> Result<Document> {
        entity::to_document(entity).map(hide_fields::<E>)
    }
}

fn hide_fields<E: Entity>(mut doc: Document) -> Document {
    doc.remove(VERSION_FIELD);
    for field in E::HIDDEN_FIELDS {
        doc.remove(*field);
    }
    doc
}
