//! Natours Core - Domain models, query composition and storage abstractions
//!
//! This crate defines everything the HTTP layer builds on:
//! - Tour, user and review models with their validation constraints
//! - The list query grammar (filter, sort, projection, pagination)
//! - The document store trait and its in-process implementation
//! - A generic resource factory for CRUD over any entity
//! - Rating aggregation that keeps tour statistics in sync with reviews
//! - Configuration management

pub mod config;
pub mod entity;
pub mod factory;
pub mod models;
pub mod query;
pub mod rating;
pub mod reviews;
pub mod store;

pub use config::{AppConfig, AuthConfig, ConfigError, Environment};
pub use entity::{Entity, Relation, RelationKind, UniqueKey};
pub use factory::ResourceFactory;
pub use models::{Review, Role, Tour, User, UserPublic};
pub use query::{QueryBuilder, QueryDescriptor};
pub use rating::{RatingAggregator, RatingSummary};
pub use reviews::ReviewService;
pub use store::{memory::MemoryStore, Document, DocumentStore, GroupStats};

use thiserror::Error;
use uuid::Uuid;

/// Core error types for Natours operations
#[derive(Error, Debug)]
pub enum NatoursError {
    #[error("{0}")]
    NotFound(String),

    #[error("Invalid id: {0}")]
    InvalidId(String),

    #[error("Duplicate field value: {field} = {value}")]
    DuplicateKey { field: String, value: String },

    #[error("Invalid input data. {0}")]
    ValidationError(String),

    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("Access denied: {reason}")]
    AccessDenied { reason: String },

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, NatoursError>;

/// Parse a path identifier, rejecting anything that is not a UUID
pub fn parse_id(raw: &str) -> Result<Uuid> {
    Uuid::parse_str(raw.trim()).map_err(|_| NatoursError::InvalidId(raw.to_string()))
}
