//! Authentication and authorization module
//!
//! - Session token issuance and verification
//! - Password hashing with Argon2
//! - Access control middleware and role policies
//! - Password reset and change
//! - Signup, login and self-service profile updates

pub mod credentials;
pub mod jwt;
pub mod middleware;
pub mod password;
pub mod reset;
pub mod service;

pub use credentials::{CredentialStore, DocumentCredentialStore};
pub use jwt::{Claims, IssuedToken, JwtConfig, JwtError, TokenService};
pub use middleware::{
    authenticate, extract_token, is_logged_in, protect, restrict_to, AuthFailure, AuthMode,
    AuthenticatedUser, RolePolicy,
};
pub use password::{PasswordConfig, PasswordError};
pub use reset::PasswordResetFlow;
pub use service::{
    AuthService, ForgotPasswordRequest, LoginRequest, ResetPasswordRequest, SignupRequest,
    UpdatePasswordRequest,
};
