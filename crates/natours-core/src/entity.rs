//! Entity declarations
//!
//! Every resource served through the generic factory describes itself with
//! the [`Entity`] trait: where it is stored, which fields never leave the
//! server, which fields clients may not write, its unique keys, the filter
//! that hides documents from every lookup and the relations that can be
//! expanded on a single-document read.

use crate::query::FilterClause;
use crate::store::Document;
use crate::{NatoursError, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;
use validator::{Validate, ValidationErrors};

/// Fields a client payload can never set directly
pub const SYSTEM_FIELDS: [&str; 3] = ["id", "createdAt", "__v"];

/// A value that must be unique across a collection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniqueKey {
    /// Name reported back in duplicate-key errors
    pub name: &'static str,
    /// Normalised value (compound keys join their parts)
    pub value: String,
}

impl UniqueKey {
    pub fn new(name: &'static str, value: impl Into<String>) -> Self {
        Self {
            name,
            value: value.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationKind {
    /// `field` on this document holds ids in `collection`
    Reference,
    /// documents in `collection` point back at this one through `field`
    Virtual,
}

/// Expandable relation on a single-document read
#[derive(Debug, Clone, Copy)]
pub struct Relation {
    /// Key the expanded documents are attached under
    pub name: &'static str,
    pub collection: &'static str,
    pub kind: RelationKind,
    pub field: &'static str,
    /// Fields kept on each related document (empty keeps all but hidden ones)
    pub select: &'static [&'static str],
    /// Fields always removed from related documents
    pub hidden: &'static [&'static str],
    /// Clauses related documents must satisfy
    pub base_filter: fn() -> Vec<FilterClause>,
}

fn no_filter() -> Vec<FilterClause> {
    Vec::new()
}

impl Relation {
    pub const fn reference(
        name: &'static str,
        collection: &'static str,
        field: &'static str,
    ) -> Self {
        Self {
            name,
            collection,
            kind: RelationKind::Reference,
            field,
            select: &[],
            hidden: &[],
            base_filter: no_filter,
        }
    }

    pub const fn virtual_children(
        name: &'static str,
        collection: &'static str,
        field: &'static str,
    ) -> Self {
        Self {
            name,
            collection,
            kind: RelationKind::Virtual,
            field,
            select: &[],
            hidden: &[],
            base_filter: no_filter,
        }
    }

    pub const fn select(mut self, fields: &'static [&'static str]) -> Self {
        self.select = fields;
        self
    }

    pub const fn hide(mut self, fields: &'static [&'static str]) -> Self {
        self.hidden = fields;
        self
    }

    pub const fn filtered(mut self, base_filter: fn() -> Vec<FilterClause>) -> Self {
        self.base_filter = base_filter;
        self
    }

    /// Trim a related document down to what this relation exposes
    pub fn shape(&self, mut doc: Document) -> Document {
        doc.remove(crate::query::VERSION_FIELD);
        for field in self.hidden {
            doc.remove(*field);
        }
        if self.select.is_empty() {
            return doc;
        }
        doc.into_iter()
            .filter(|(key, _)| key == "id" || self.select.contains(&key.as_str()))
            .collect()
    }
}

/// A resource stored as a document in one collection
pub trait Entity: Serialize + DeserializeOwned + Validate + Clone + Send + Sync + 'static {
    /// Collection the documents live in
    const COLLECTION: &'static str;

    /// Singular name used in messages and response envelopes
    const NAME: &'static str;

    /// Fields removed from every rendered document
    const HIDDEN_FIELDS: &'static [&'static str] = &[];

    /// Fields stripped from client payloads on create and update
    const PROTECTED_FIELDS: &'static [&'static str] = &[];

    fn id(&self) -> Uuid;

    fn unique_keys(&self) -> Vec<UniqueKey> {
        Vec::new()
    }

    /// Clauses every lookup carries, hiding documents that must stay invisible
    fn base_filter() -> Vec<FilterClause> {
        Vec::new()
    }

    fn relations() -> &'static [Relation] {
        &[]
    }

    /// Derive computed fields before validation
    fn normalize(&mut self) {}
}

/// Serialise an entity into its stored form
pub fn to_document<E: Entity>(entity: &E) -> Result<Document> {
    match serde_json::to_value(entity) {
        Ok(Value::Object(doc)) => Ok(doc),
        Ok(_) => Err(NatoursError::DatabaseError(format!(
            "{} did not serialise to an object",
            E::NAME
        ))),
        Err(e) => Err(NatoursError::DatabaseError(e.to_string())),
    }
}

/// Read a stored document back into its entity
pub fn from_document<E: Entity>(doc: Document) -> Result<E> {
    serde_json::from_value(Value::Object(doc)).map_err(|e| {
        NatoursError::DatabaseError(format!("Corrupt {} document: {e}", E::NAME))
    })
}

/// Read a client payload into an entity; shape errors are validation errors
pub fn from_payload<E: Entity>(doc: Document) -> Result<E> {
    serde_json::from_value(Value::Object(doc))
        .map_err(|e| NatoursError::ValidationError(format!("{e}.")))
}

/// Remove fields a client may not write
pub fn strip_protected<E: Entity>(payload: &mut Document) {
    for field in SYSTEM_FIELDS.iter().chain(E::PROTECTED_FIELDS) {
        payload.remove(*field);
    }
}

/// Run declared constraints, flattening every failure into one message
pub fn validate_entity<E: Entity>(entity: &E) -> Result<()> {
    entity
        .validate()
        .map_err(|errors| NatoursError::ValidationError(validation_message(&errors)))
}

/// Flatten validator output into `"msg one. msg two."`, sorted for stable output
pub fn validation_message(errors: &ValidationErrors) -> String {
    let mut messages: Vec<String> = errors
        .field_errors()
        .into_iter()
        .flat_map(|(field, errs)| {
            let field = field.to_string();
            errs.iter().map(move |err| match &err.message {
                Some(message) => message.to_string(),
                None => format!("Invalid value for {field}"),
            })
        })
        .collect();
    messages.sort();
    messages.dedup();
    messages
        .into_iter()
        .map(|m| if m.ends_with('.') { m } else { format!("{m}.") })
        .collect::<Vec<_>>()
        .join(" ")
}
