//! Authentication API handlers
//!
//! Signup, login, logout and the password endpoints. Every handler that
//! establishes a session answers with the token in the body and in the
//! `jwt` cookie.

use crate::audit::{audit_log, extract_ip_address, AuditEvent};
use crate::auth::{
    AuthenticatedUser, ForgotPasswordRequest, IssuedToken, LoginRequest, ResetPasswordRequest,
    SignupRequest, UpdatePasswordRequest,
};
use crate::error::AppError;
use crate::response::{ApiResponse, JsonBody};
use crate::state::AppState;
use axum::{
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Extension,
};
use natours_core::config::ServerConfig;
use natours_core::User;
use serde_json::json;
use std::sync::Arc;

fn send_token(
    state: &AppState,
    status: StatusCode,
    user: &User,
    issued: &IssuedToken,
) -> Result<Response, AppError> {
    let cookie = state.auth.session_cookie(issued)?;
    let body = ApiResponse::success(json!({ "user": user.to_public() })).with_token(&issued.token);
    Ok((status, [(header::SET_COOKIE, cookie)], body).into_response())
}

/// `{protocol}://{host}` for links mailed to users
///
/// A configured public host always wins. Without one, the request's `Host`
/// header is only trusted in development; production falls back to
/// `localhost` on the listening port.
pub fn link_base_url(headers: &HeaderMap, server: &ServerConfig, trust_host_header: bool) -> String {
    let protocol = headers
        .get("x-forwarded-proto")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .unwrap_or("http");

    let host = match &server.public_host {
        Some(public_host) => public_host.clone(),
        None => headers
            .get(header::HOST)
            .filter(|_| trust_host_header)
            .and_then(|value| value.to_str().ok())
            .filter(|value| !value.is_empty())
            .map_or_else(|| format!("localhost:{}", server.port), str::to_string),
    };
    format!("{protocol}://{host}")
}

/// POST /api/v1/users/signup
pub async fn signup(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    JsonBody(request): JsonBody<SignupRequest>,
) -> Result<Response, AppError> {
    let (user, issued) = state.auth.signup(request).await?;
    audit_log(&AuditEvent::Signup {
        user_id: user.id,
        email: user.email.clone(),
        ip_address: extract_ip_address(&headers),
    });
    send_token(&state, StatusCode::CREATED, &user, &issued)
}

/// POST /api/v1/users/login
pub async fn login(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    JsonBody(request): JsonBody<LoginRequest>,
) -> Result<Response, AppError> {
    let email = request.email.clone().unwrap_or_default();
    let ip_address = extract_ip_address(&headers);

    match state.auth.login(request).await {
        Ok((user, issued)) => {
            audit_log(&AuditEvent::LoginSuccess {
                user_id: user.id,
                email: user.email.clone(),
                ip_address,
            });
            send_token(&state, StatusCode::OK, &user, &issued)
        }
        Err(e) => {
            audit_log(&AuditEvent::LoginFailure {
                email,
                reason: e.to_string(),
                ip_address,
            });
            Err(e)
        }
    }
}

/// GET /api/v1/users/logout
pub async fn logout(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let cookie = state.auth.logout_cookie()?;
    audit_log(&AuditEvent::Logout {
        ip_address: extract_ip_address(&headers),
    });
    Ok(([(header::SET_COOKIE, cookie)], ApiResponse::ok()).into_response())
}

/// POST /api/v1/users/forgotPassword
pub async fn forgot_password(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    JsonBody(request): JsonBody<ForgotPasswordRequest>,
) -> Result<ApiResponse, AppError> {
    let trust_host_header = !state.config.environment.is_production();
    let base_url = link_base_url(&headers, &state.config.server, trust_host_header);
    let user = state.reset.request_reset(&request.email, &base_url).await?;
    audit_log(&AuditEvent::PasswordResetRequested {
        user_id: user.id,
        email: user.email,
        ip_address: extract_ip_address(&headers),
    });
    Ok(ApiResponse::message("Token sent to email!"))
}

/// PATCH /api/v1/resetPassword/:token, also mounted under /api/v1/users
pub async fn reset_password(
    State(state): State<Arc<AppState>>,
    Path(token): Path<String>,
    headers: HeaderMap,
    JsonBody(request): JsonBody<ResetPasswordRequest>,
) -> Result<Response, AppError> {
    let (user, issued) = state
        .reset
        .redeem(&token, &request.password, &request.password_confirm)
        .await?;
    audit_log(&AuditEvent::PasswordResetCompleted {
        user_id: user.id,
        ip_address: extract_ip_address(&headers),
    });
    send_token(&state, StatusCode::OK, &user, &issued)
}

/// PATCH /api/v1/users/updateMyPassword
pub async fn update_my_password(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<AuthenticatedUser>,
    headers: HeaderMap,
    JsonBody(request): JsonBody<UpdatePasswordRequest>,
) -> Result<Response, AppError> {
    let (user, issued) = state
        .reset
        .change_password(
            &caller.user,
            &request.password_current,
            request.password.as_deref(),
            request.password_confirm.as_deref(),
        )
        .await?;
    audit_log(&AuditEvent::PasswordChange {
        user_id: user.id,
        ip_address: extract_ip_address(&headers),
    });
    send_token(&state, StatusCode::OK, &user, &issued)
}

/// GET /api/v1/users/session
///
/// The current user, or `null` for anonymous callers.
pub async fn session(caller: Option<Extension<AuthenticatedUser>>) -> ApiResponse {
    let user = caller.map(|Extension(caller)| caller.user.to_public());
    ApiResponse::success(json!({ "user": user }))
}
