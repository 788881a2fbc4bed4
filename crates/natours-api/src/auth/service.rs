//! Authentication service layer
//!
//! Signup, login, self-service profile updates and the session cookie.

use super::credentials::CredentialStore;
use super::jwt::{IssuedToken, TokenService};
use super::middleware::{JWT_COOKIE, LOGGED_OUT};
use super::password::{hash_password_async, validate_password, verify_password_async, PasswordConfig};
use crate::error::AppError;
use axum::http::HeaderValue;
use chrono::Utc;
use natours_core::config::BootstrapAdmin;
use natours_core::{AppConfig, Document, NatoursError, Role, User};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::OnceCell;

/// Lifetime of the cookie that replaces the session on logout
const LOGOUT_COOKIE_MAX_AGE_SECS: u64 = 10;

/// Fields a user may change through `updateMe`
const SELF_EDITABLE_FIELDS: [&str; 2] = ["name", "email"];

const INCORRECT_CREDENTIALS: &str = "Incorrect email or password";

/// Verified against when the email is unknown, so both failures cost one argon2 run
const DUMMY_PASSWORD: &str = "natours-dummy-password";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignupRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    pub password_confirm: String,
    #[serde(default)]
    pub photo: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePasswordRequest {
    pub password_current: String,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub password_confirm: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordRequest {
    pub password: String,
    pub password_confirm: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

/// Authentication service
#[derive(Clone)]
pub struct AuthService {
    credentials: Arc<dyn CredentialStore>,
    tokens: TokenService,
    password: PasswordConfig,
    dummy_hash: Arc<OnceCell<String>>,
    secure_cookies: bool,
}

impl AuthService {
    pub fn new(credentials: Arc<dyn CredentialStore>, tokens: TokenService, config: &AppConfig) -> Self {
        Self {
            credentials,
            tokens,
            password: PasswordConfig::from(&config.auth),
            dummy_hash: Arc::new(OnceCell::new()),
            secure_cookies: config.environment.is_production(),
        }
    }

    /// Create a `user` account and log it in
    ///
    /// Any role in the request is ignored.
    pub async fn signup(&self, request: SignupRequest) -> Result<(User, IssuedToken), AppError> {
        validate_password(&request.password, &request.password_confirm)
            .map_err(NatoursError::ValidationError)?;

        let hash = hash_password_async(request.password, self.password.clone()).await?;
        let mut user = User::new(request.name, request.email, hash);
        user.photo = request.photo;

        let user = self.credentials.create(user).await?;
        let issued = self.tokens.issue(user.id)?;
        Ok((user, issued))
    }

    /// Check credentials; unknown email and wrong password fail alike
    pub async fn login(&self, request: LoginRequest) -> Result<(User, IssuedToken), AppError> {
        let (Some(email), Some(password)) = (request.email, request.password) else {
            return Err(AppError::MissingField(
                "Please provide email and password!".to_string(),
            ));
        };

        let Some(user) = self.credentials.find_by_email(&email).await? else {
            let dummy = self.dummy_hash().await?;
            verify_password_async(password, dummy.to_string()).await?;
            return Err(AppError::IncorrectPassword(INCORRECT_CREDENTIALS.to_string()));
        };
        if !verify_password_async(password, user.password_hash.clone()).await? {
            return Err(AppError::IncorrectPassword(INCORRECT_CREDENTIALS.to_string()));
        }

        let issued = self.tokens.issue(user.id)?;
        Ok((user, issued))
    }

    /// Apply name/email changes of the caller's own profile
    pub async fn update_me(&self, user: &User, patch: Document) -> Result<User, AppError> {
        if patch.contains_key("password") || patch.contains_key("passwordConfirm") {
            return Err(AppError::ValidationFailed(
                "This route is not for password updates. Please use /updateMyPassword."
                    .to_string(),
            ));
        }

        let mut updated = user.clone();
        for field in SELF_EDITABLE_FIELDS {
            let Some(value) = patch.get(field) else {
                continue;
            };
            let Value::String(value) = value else {
                return Err(NatoursError::ValidationError(format!("{field} must be a string.")).into());
            };
            match field {
                "name" => updated.name = value.clone(),
                _ => updated.email = value.clone(),
            }
        }

        Ok(self.credentials.save(updated).await?)
    }

    /// Soft-delete the caller's account
    pub async fn deactivate(&self, user: &User) -> Result<(), AppError> {
        self.credentials.deactivate(user.id).await?;
        Ok(())
    }

    /// Ensure the configured administrator exists and holds the admin role
    pub async fn bootstrap_admin(&self, admin: &BootstrapAdmin) -> Result<User, AppError> {
        if let Some(mut existing) = self.credentials.find_by_email(&admin.email).await? {
            if existing.role != Role::Admin {
                existing.role = Role::Admin;
                existing = self.credentials.save(existing).await?;
                tracing::info!(user_id = %existing.id, "promoted bootstrap administrator");
            }
            return Ok(existing);
        }

        validate_password(&admin.password, &admin.password)
            .map_err(NatoursError::ValidationError)?;
        let hash = hash_password_async(admin.password.clone(), self.password.clone()).await?;
        let mut user = User::new(admin.name.clone(), admin.email.clone(), hash);
        user.role = Role::Admin;

        let user = self.credentials.create(user).await?;
        tracing::info!(user_id = %user.id, email = %user.email, "created bootstrap administrator");
        Ok(user)
    }

    async fn dummy_hash(&self) -> Result<&str, AppError> {
        let hash = self
            .dummy_hash
            .get_or_try_init(|| {
                hash_password_async(DUMMY_PASSWORD.to_string(), self.password.clone())
            })
            .await?;
        Ok(hash.as_str())
    }

    /// `Set-Cookie` value carrying a session token, expiring with it
    pub fn session_cookie(&self, issued: &IssuedToken) -> Result<HeaderValue, AppError> {
        let remaining = (issued.expires_at - Utc::now()).num_seconds().max(0);
        self.cookie(&issued.token, remaining.unsigned_abs())
    }

    /// `Set-Cookie` value replacing the session on logout
    pub fn logout_cookie(&self) -> Result<HeaderValue, AppError> {
        self.cookie(LOGGED_OUT, LOGOUT_COOKIE_MAX_AGE_SECS)
    }

    fn cookie(&self, value: &str, max_age_secs: u64) -> Result<HeaderValue, AppError> {
        let mut cookie =
            format!("{JWT_COOKIE}={value}; Path=/; HttpOnly; SameSite=Lax; Max-Age={max_age_secs}");
        if self.secure_cookies {
            cookie.push_str("; Secure");
        }
        HeaderValue::from_str(&cookie)
            .map_err(|e| AppError::Internal(format!("Invalid cookie value: {e}")))
    }
}
