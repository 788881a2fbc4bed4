use super::Role;
use crate::entity::{Entity, UniqueKey};
use crate::query::FilterClause;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

fn default_active() -> bool {
    true
}

/// Identity record with credentials and reset-token state
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,

    #[validate(length(min = 1, max = 100, message = "Please tell us your name"))]
    pub name: String,

    #[validate(email(message = "Please provide a valid email"))]
    pub email: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo: Option<String>,

    #[serde(default)]
    pub role: Role,

    /// Argon2 PHC string
    pub password_hash: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password_changed_at: Option<DateTime<Utc>>,

    /// SHA-256 of the outstanding reset token
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password_reset_token: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password_reset_expires: Option<DateTime<Utc>>,

    #[serde(default = "default_active")]
    pub active: bool,

    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn new(name: impl Into<String>, email: impl Into<String>, password_hash: String) -> Self {
        let mut user = Self {
            id: Uuid::new_v4(),
            name: name.into(),
            email: email.into(),
            photo: None,
            role: Role::User,
            password_hash,
            password_changed_at: None,
            password_reset_token: None,
            password_reset_expires: None,
            active: true,
            created_at: Utc::now(),
        };
        user.normalize();
        user
    }

    /// Whether the password changed after a token issued at `issued_at_ms`
    pub fn changed_password_after(&self, issued_at_ms: i64) -> bool {
        self.password_changed_at
            .is_some_and(|changed| issued_at_ms < changed.timestamp_millis())
    }

    /// Outstanding reset token, if it has not expired at `now`
    pub fn reset_token_valid_at(&self, now: DateTime<Utc>) -> bool {
        self.password_reset_token.is_some()
            && self.password_reset_expires.is_some_and(|expires| expires > now)
    }

    pub fn to_public(&self) -> UserPublic {
        UserPublic {
            id: self.id,
            name: self.name.clone(),
            email: self.email.clone(),
            photo: self.photo.clone(),
            role: self.role,
            created_at: self.created_at,
        }
    }
}

impl Entity for User {
    const COLLECTION: &'static str = "users";
    const NAME: &'static str = "user";
    const HIDDEN_FIELDS: &'static [&'static str] = &[
        "passwordHash",
        "passwordResetToken",
        "passwordResetExpires",
        "active",
    ];
    const PROTECTED_FIELDS: &'static [&'static str] = &[
        "passwordHash",
        "passwordChangedAt",
        "passwordResetToken",
        "passwordResetExpires",
        "active",
    ];

    fn id(&self) -> Uuid {
        self.id
    }

    fn unique_keys(&self) -> Vec<UniqueKey> {
        vec![UniqueKey::new("email", self.email.clone())]
    }

    fn base_filter() -> Vec<FilterClause> {
        vec![FilterClause::eq("active", true)]
    }

    fn normalize(&mut self) {
        self.email = self.email.trim().to_lowercase();
        self.name = self.name.trim().to_string();
    }
}

/// User fields safe to return to clients
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPublic {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub photo: Option<String>,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}
