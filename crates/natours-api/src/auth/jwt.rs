//! Session token issuance and verification
//!
//! Session tokens are HS256 JWTs carrying only the user id. Besides the
//! standard second-resolution `iat`, tokens carry `iat_ms` so a password
//! change can invalidate every token issued before it, even within the same
//! second.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use natours_core::AuthConfig;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// JWT claims embedded in every session token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Token issuer
    pub iss: String,
    /// Subject - user ID
    pub sub: String,
    /// JWT ID - unique token identifier
    pub jti: String,
    /// Issued at (Unix seconds)
    pub iat: i64,
    /// Issued at (Unix milliseconds)
    pub iat_ms: i64,
    /// Expiration (Unix seconds)
    pub exp: i64,
}

impl Claims {
    pub fn user_id(&self) -> Result<Uuid, JwtError> {
        Uuid::parse_str(&self.sub).map_err(|_| JwtError::InvalidToken)
    }
}

#[derive(Debug, Error)]
pub enum JwtError {
    #[error("Failed to encode JWT: {0}")]
    EncodingError(#[from] jsonwebtoken::errors::Error),

    #[error("Invalid token format")]
    InvalidToken,

    #[error("Token has expired")]
    ExpiredToken,

    #[error("Invalid token signature")]
    InvalidSignature,
}

/// JWT configuration
#[derive(Clone)]
pub struct JwtConfig {
    /// Secret key for HMAC signing (should be at least 256 bits)
    pub secret: String,
    /// Token issuer identifier
    pub issuer: String,
    /// Token lifetime in seconds
    pub expires_in_secs: u64,
}

impl From<&AuthConfig> for JwtConfig {
    fn from(config: &AuthConfig) -> Self {
        Self {
            secret: config.jwt_secret.clone(),
            issuer: config.jwt_issuer.clone(),
            expires_in_secs: config.jwt_expires_in_secs,
        }
    }
}

impl std::fmt::Debug for JwtConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtConfig")
            .field("secret", &"<redacted>")
            .field("issuer", &self.issuer)
            .field("expires_in_secs", &self.expires_in_secs)
            .finish()
    }
}

/// Upper bound on the configured lifetime (100 years)
const MAX_LIFETIME_SECS: u64 = 100 * 365 * 24 * 60 * 60;

/// A freshly signed token
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Signs and verifies session tokens; holds no state besides the keys
#[derive(Clone)]
pub struct TokenService {
    issuer: String,
    lifetime: Duration,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl TokenService {
    pub fn new(config: &JwtConfig) -> Self {
        let lifetime_secs = config.expires_in_secs.min(MAX_LIFETIME_SECS) as i64;
        Self {
            issuer: config.issuer.clone(),
            lifetime: Duration::seconds(lifetime_secs),
            encoding_key: EncodingKey::from_secret(config.secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.secret.as_bytes()),
        }
    }

    /// Issue a token for `user_id` valid from now
    pub fn issue(&self, user_id: Uuid) -> Result<IssuedToken, JwtError> {
        self.issue_at(user_id, Utc::now())
    }

    /// Issue a token with an explicit issued-at instant
    pub fn issue_at(&self, user_id: Uuid, issued_at: DateTime<Utc>) -> Result<IssuedToken, JwtError> {
        let expires_at = issued_at
            .checked_add_signed(self.lifetime)
            .ok_or(JwtError::InvalidToken)?;

        let claims = Claims {
            iss: self.issuer.clone(),
            sub: user_id.to_string(),
            jti: Uuid::new_v4().to_string(),
            iat: issued_at.timestamp(),
            iat_ms: issued_at.timestamp_millis(),
            exp: expires_at.timestamp(),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)?;
        Ok(IssuedToken {
            token,
            issued_at,
            expires_at,
        })
    }

    /// Check signature, issuer and expiry; no storage access
    pub fn verify(&self, token: &str) -> Result<Claims, JwtError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[&self.issuer]);

        let token_data = decode::<Claims>(token, &self.decoding_key, &validation).map_err(|e| {
            match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => JwtError::ExpiredToken,
                jsonwebtoken::errors::ErrorKind::InvalidSignature => JwtError::InvalidSignature,
                _ => JwtError::InvalidToken,
            }
        })?;

        Ok(token_data.claims)
    }
}
