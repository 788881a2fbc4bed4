//! Identity lookups and writes needed by authentication
//!
//! The auth layer never talks to the document store directly; it goes
//! through [`CredentialStore`], which only ever sees active identities.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use natours_core::query::FilterClause;
use natours_core::{DocumentStore, NatoursError, ResourceFactory, Result, User};
use serde_json::Value;
use std::sync::Arc;
use uuid::Uuid;

#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>>;

    async fn find_by_email(&self, email: &str) -> Result<Option<User>>;

    /// Identity holding the reset token with this SHA-256 digest
    async fn find_by_reset_token(&self, token_hash: &str) -> Result<Option<User>>;

    async fn create(&self, user: User) -> Result<User>;

    /// Validated full replace
    async fn save(&self, user: User) -> Result<User>;

    /// Store or clear reset-token state without validating the rest of the
    /// record
    async fn set_reset_token(
        &self,
        id: Uuid,
        token_hash: Option<String>,
        expires: Option<DateTime<Utc>>,
    ) -> Result<()>;

    async fn deactivate(&self, id: Uuid) -> Result<()>;
}

/// [`CredentialStore`] over the users collection of a [`DocumentStore`]
#[derive(Clone)]
pub struct DocumentCredentialStore {
    users: ResourceFactory<User>,
}

impl DocumentCredentialStore {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            users: ResourceFactory::new(store),
        }
    }
}

#[async_trait]
impl CredentialStore for DocumentCredentialStore {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>> {
        match self.users.find_raw(id).await {
            Ok(user) => Ok(Some(user)),
            Err(NatoursError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        let email = email.trim().to_lowercase();
        self.users
            .find_where(vec![FilterClause::eq("email", email)])
            .await
    }

    async fn find_by_reset_token(&self, token_hash: &str) -> Result<Option<User>> {
        self.users
            .find_where(vec![FilterClause::eq("passwordResetToken", token_hash)])
            .await
    }

    async fn create(&self, user: User) -> Result<User> {
        self.users.insert(user).await
    }

    async fn save(&self, user: User) -> Result<User> {
        self.users.save(user).await
    }

    async fn set_reset_token(
        &self,
        id: Uuid,
        token_hash: Option<String>,
        expires: Option<DateTime<Utc>>,
    ) -> Result<()> {
        let expires = serde_json::to_value(expires)
            .map_err(|e| NatoursError::DatabaseError(e.to_string()))?;

        let mut fields = natours_core::Document::new();
        fields.insert(
            "passwordResetToken".to_string(),
            token_hash.map_or(Value::Null, Value::String),
        );
        fields.insert("passwordResetExpires".to_string(), expires);
        self.users.set_fields(id, fields).await
    }

    async fn deactivate(&self, id: Uuid) -> Result<()> {
        let mut fields = natours_core::Document::new();
        fields.insert("active".to_string(), Value::Bool(false));
        self.users.set_fields(id, fields).await
    }
}
