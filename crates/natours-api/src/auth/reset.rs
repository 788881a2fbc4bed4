//! Password reset and password change
//!
//! Reset tokens are 32 random bytes sent to the user by email; only their
//! SHA-256 digest is stored, together with an expiry. Redeeming a token or
//! changing the password stamps `passwordChangedAt`, which invalidates every
//! session token issued before it.

use super::credentials::CredentialStore;
use super::jwt::{IssuedToken, TokenService};
use super::password::{hash_password_async, validate_password, verify_password_async, PasswordConfig};
use crate::error::AppError;
use crate::mailer::{Email, Mailer};
use base64::Engine;
use chrono::{Duration, Utc};
use natours_core::{NatoursError, User};
use rand::Rng;
use sha2::{Digest, Sha256};
use std::sync::Arc;

pub const RESET_SUBJECT: &str = "Your password reset token (valid for 10 min)";

/// Fresh reset token as sent to the user
pub fn generate_reset_token() -> String {
    let mut rng = rand::thread_rng();
    let token_bytes: [u8; 32] = rng.gen();
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(token_bytes)
}

/// Digest stored in place of the raw token
pub fn hash_reset_token(raw: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(raw.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[derive(Clone)]
pub struct PasswordResetFlow {
    credentials: Arc<dyn CredentialStore>,
    mailer: Arc<dyn Mailer>,
    tokens: TokenService,
    password: PasswordConfig,
    ttl: Duration,
}

impl PasswordResetFlow {
    pub fn new(
        credentials: Arc<dyn CredentialStore>,
        mailer: Arc<dyn Mailer>,
        tokens: TokenService,
        password: PasswordConfig,
        ttl_mins: i64,
    ) -> Self {
        Self {
            credentials,
            mailer,
            tokens,
            password,
            ttl: Duration::minutes(ttl_mins),
        }
    }

    /// Store a new reset token for `email` and mail the link
    ///
    /// `base_url` is `{protocol}://{host}` of the incoming request.
    pub async fn request_reset(&self, email: &str, base_url: &str) -> Result<User, AppError> {
        let user = self
            .credentials
            .find_by_email(email)
            .await?
            .ok_or_else(|| AppError::NotFound("There is no user with that email address.".to_string()))?;

        let raw = generate_reset_token();
        let expires = Utc::now() + self.ttl;
        self.credentials
            .set_reset_token(user.id, Some(hash_reset_token(&raw)), Some(expires))
            .await?;

        let reset_url = format!("{base_url}/api/v1/resetPassword/{raw}");
        let email = Email {
            to: user.email.clone(),
            subject: RESET_SUBJECT.to_string(),
            body: format!(
                "Forgot your password? Submit a PATCH request with your new password and \
                 passwordConfirm to: {reset_url}.\nIf you didn't forget your password, please \
                 ignore this email!"
            ),
        };

        if let Err(e) = self.mailer.send(email).await {
            tracing::warn!(user_id = %user.id, error = %e, "reset email not delivered, clearing token");
            self.credentials.set_reset_token(user.id, None, None).await?;
            return Err(e.into());
        }

        Ok(user)
    }

    /// Exchange a reset token for a new password and a fresh session
    pub async fn redeem(
        &self,
        raw: &str,
        password: &str,
        password_confirm: &str,
    ) -> Result<(User, IssuedToken), AppError> {
        let user = self
            .credentials
            .find_by_reset_token(&hash_reset_token(raw))
            .await?
            .filter(|user| user.reset_token_valid_at(Utc::now()))
            .ok_or(AppError::InvalidOrExpiredToken)?;

        self.set_password(user, password, password_confirm).await
    }

    /// Change the password of a logged-in user
    pub async fn change_password(
        &self,
        user: &User,
        current: &str,
        password: Option<&str>,
        password_confirm: Option<&str>,
    ) -> Result<(User, IssuedToken), AppError> {
        let matches =
            verify_password_async(current.to_string(), user.password_hash.clone()).await?;
        if !matches {
            return Err(AppError::IncorrectPassword(
                "Your current password is wrong.".to_string(),
            ));
        }

        let (Some(password), Some(password_confirm)) = (password, password_confirm) else {
            return Err(AppError::MissingField(
                "Please provide a new password and passwordConfirm!".to_string(),
            ));
        };
        self.set_password(user.clone(), password, password_confirm).await
    }

    async fn set_password(
        &self,
        mut user: User,
        password: &str,
        password_confirm: &str,
    ) -> Result<(User, IssuedToken), AppError> {
        validate_password(password, password_confirm).map_err(NatoursError::ValidationError)?;

        user.password_hash = hash_password_async(password.to_string(), self.password.clone()).await?;
        let changed_at = Utc::now();
        user.password_changed_at = Some(changed_at);
        user.password_reset_token = None;
        user.password_reset_expires = None;

        let user = self.credentials.save(user).await?;
        let issued = self.tokens.issue_at(user.id, changed_at)?;
        tracing::info!(user_id = %user.id, "password changed");
        Ok((user, issued))
    }
}
