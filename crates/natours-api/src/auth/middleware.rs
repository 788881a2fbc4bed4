//! Access control middleware
//!
//! One state machine resolves the caller from the request: extract the
//! token (Bearer header first, then the `jwt` cookie), verify it, load the
//! identity, reject tokens issued before the last password change. `protect`
//! turns any failure into a 401, `is_logged_in` treats it as anonymous.
//! On success the request carries an [`AuthenticatedUser`] extension.

use super::credentials::CredentialStore;
use super::jwt::{Claims, JwtError, TokenService};
use crate::audit::{audit_log, extract_ip_address, extract_user_agent, AuditEvent};
use crate::error::AppError;
use crate::state::AppState;
use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};
use natours_core::{NatoursError, Role, User};
use std::collections::HashSet;
use std::sync::Arc;
use thiserror::Error;

/// Name of the session cookie
pub const JWT_COOKIE: &str = "jwt";

/// Cookie value written on logout
pub const LOGGED_OUT: &str = "loggedout";

pub const NOT_LOGGED_IN: &str = "You are not logged in! Please log in to get access.";

/// How a failed resolution is treated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMode {
    /// Reject with 401
    Strict,
    /// Continue anonymously
    Soft,
}

/// The caller resolved from the session token
///
/// Extract it in handlers with `Extension<AuthenticatedUser>`.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub user: User,
    pub claims: Claims,
}

/// Why a request could not be authenticated
#[derive(Debug, Error)]
pub enum AuthFailure {
    #[error("You are not logged in! Please log in to get access.")]
    Missing,

    #[error(transparent)]
    InvalidToken(#[from] JwtError),

    #[error("The user belonging to this token does no longer exist.")]
    UserGone,

    #[error("User recently changed password! Please log in again.")]
    PasswordChanged,

    #[error(transparent)]
    Store(#[from] NatoursError),
}

impl From<AuthFailure> for AppError {
    fn from(failure: AuthFailure) -> Self {
        match failure {
            AuthFailure::InvalidToken(e) => e.into(),
            AuthFailure::Store(e) => e.into(),
            other => AppError::Unauthenticated(other.to_string()),
        }
    }
}

/// Session token from `Authorization: Bearer` or the `jwt` cookie
pub fn extract_token(headers: &HeaderMap) -> Option<String> {
    if let Some(token) = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
    {
        return Some(token.to_string());
    }

    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|cookies| cookies.split(';'))
        .find_map(|pair| {
            let (name, value) = pair.trim().split_once('=')?;
            (name == JWT_COOKIE && !value.is_empty()).then(|| value.to_string())
        })
}

/// Resolve a token to an active identity
pub async fn authenticate(
    tokens: &TokenService,
    credentials: &dyn CredentialStore,
    token: Option<&str>,
) -> Result<AuthenticatedUser, AuthFailure> {
    let token = token.ok_or(AuthFailure::Missing)?;
    let claims = tokens.verify(token)?;
    let user = credentials
        .find_by_id(claims.user_id()?)
        .await?
        .ok_or(AuthFailure::UserGone)?;

    if user.changed_password_after(claims.iat_ms) {
        return Err(AuthFailure::PasswordChanged);
    }

    Ok(AuthenticatedUser { user, claims })
}

/// Terminal state of one resolution
enum Resolution {
    Authenticated(AuthenticatedUser),
    Anonymous,
    Rejected(AuthFailure),
}

async fn resolve(state: &AppState, mode: AuthMode, headers: &HeaderMap) -> Resolution {
    let token = extract_token(headers);
    match authenticate(&state.tokens, state.credentials.as_ref(), token.as_deref()).await {
        Ok(caller) => Resolution::Authenticated(caller),
        Err(failure) => match mode {
            AuthMode::Strict => Resolution::Rejected(failure),
            AuthMode::Soft => {
                if let AuthFailure::Store(e) = &failure {
                    tracing::warn!(error = %e, "session lookup failed, continuing anonymously");
                }
                Resolution::Anonymous
            }
        },
    }
}

/// Require a valid session
///
/// ```ignore
/// let app = Router::new()
///     .route("/users/me", get(get_me))
///     .route_layer(middleware::from_fn_with_state(state.clone(), protect));
/// ```
pub async fn protect(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    match resolve(&state, AuthMode::Strict, request.headers()).await {
        Resolution::Authenticated(caller) => {
            request.extensions_mut().insert(caller);
            Ok(next.run(request).await)
        }
        Resolution::Rejected(failure) => {
            if !matches!(failure, AuthFailure::Missing | AuthFailure::Store(_)) {
                audit_log(&AuditEvent::InvalidToken {
                    reason: failure.to_string(),
                    ip_address: extract_ip_address(request.headers()),
                    user_agent: extract_user_agent(request.headers()),
                });
            }
            Err(failure.into())
        }
        Resolution::Anonymous => Err(AppError::Unauthenticated(NOT_LOGGED_IN.to_string())),
    }
}

/// Attach the caller when a valid session exists, never reject
pub async fn is_logged_in(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Response {
    if let Resolution::Authenticated(caller) =
        resolve(&state, AuthMode::Soft, request.headers()).await
    {
        request.extensions_mut().insert(caller);
    }
    next.run(request).await
}

/// The set of roles allowed through a route
#[derive(Debug, Clone)]
pub struct RolePolicy {
    allowed: HashSet<Role>,
}

impl RolePolicy {
    pub fn new(roles: impl IntoIterator<Item = Role>) -> Self {
        Self {
            allowed: roles.into_iter().collect(),
        }
    }

    pub fn allows(&self, role: Role) -> bool {
        self.allowed.contains(&role)
    }

    pub fn check(&self, user: &User) -> Result<(), AppError> {
        if self.allows(user.role) {
            Ok(())
        } else {
            Err(AppError::Forbidden(
                "You do not have permission to perform this action".to_string(),
            ))
        }
    }

    fn role_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.allowed.iter().map(|r| r.to_string()).collect();
        names.sort();
        names
    }
}

/// Role gate; must run after [`protect`]
///
/// ```ignore
/// let admin = RolePolicy::new([Role::Admin]);
/// let app = Router::new()
///     .route("/users", get(list_users))
///     .route_layer(middleware::from_fn_with_state(admin, restrict_to))
///     .route_layer(middleware::from_fn_with_state(state.clone(), protect));
/// ```
pub async fn restrict_to(
    State(policy): State<RolePolicy>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let caller = request
        .extensions()
        .get::<AuthenticatedUser>()
        .ok_or_else(|| AppError::Unauthenticated(NOT_LOGGED_IN.to_string()))?;

    if let Err(denied) = policy.check(&caller.user) {
        audit_log(&AuditEvent::AccessDenied {
            user_id: caller.user.id,
            role: caller.user.role.to_string(),
            resource: format!("{} {}", request.method(), request.uri().path()),
            allowed_roles: policy.role_names(),
            ip_address: extract_ip_address(request.headers()),
        });
        return Err(denied);
    }

    Ok(next.run(request).await)
}
