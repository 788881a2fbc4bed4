//! User handlers: self-service and admin CRUD

use crate::audit::{audit_log, extract_ip_address, AuditEvent};
use crate::auth::{AuthenticatedUser, CredentialStore};
use crate::error::AppError;
use crate::response::{ApiResponse, JsonBody, QueryParams};
use crate::state::AppState;
use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    Extension,
};
use natours_core::{parse_id, Document};
use serde_json::json;
use std::sync::Arc;

/// GET /api/v1/users/me
pub async fn get_me(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<AuthenticatedUser>,
) -> Result<ApiResponse, AppError> {
    let doc = state.users.get_one(caller.user.id, false).await?;
    Ok(ApiResponse::document(doc))
}

/// PATCH /api/v1/users/updateMe
pub async fn update_me(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<AuthenticatedUser>,
    JsonBody(patch): JsonBody<Document>,
) -> Result<ApiResponse, AppError> {
    let user = state.auth.update_me(&caller.user, patch).await?;
    Ok(ApiResponse::success(json!({ "user": user.to_public() })))
}

/// DELETE /api/v1/users/deleteMe
pub async fn delete_me(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<AuthenticatedUser>,
    headers: HeaderMap,
) -> Result<StatusCode, AppError> {
    state.auth.deactivate(&caller.user).await?;
    audit_log(&AuditEvent::AccountDeactivated {
        user_id: caller.user.id,
        ip_address: extract_ip_address(&headers),
    });
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/v1/users
pub async fn get_all_users(
    State(state): State<Arc<AppState>>,
    QueryParams(params): QueryParams,
) -> Result<ApiResponse, AppError> {
    let docs = state.users.get_all(&params, Vec::new()).await?;
    Ok(ApiResponse::list(docs))
}

/// POST /api/v1/users
pub async fn create_user() -> AppError {
    AppError::NotDefined("This route is not defined! Please use /signup instead".to_string())
}

/// GET /api/v1/users/:id
pub async fn get_user(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<ApiResponse, AppError> {
    let doc = state.users.get_one(parse_id(&id)?, false).await?;
    Ok(ApiResponse::document(doc))
}

/// PATCH /api/v1/users/:id
///
/// Credential fields are protected and never change through this route.
pub async fn update_user(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    JsonBody(patch): JsonBody<Document>,
) -> Result<ApiResponse, AppError> {
    let doc = state.users.update_one(parse_id(&id)?, patch).await?;
    Ok(ApiResponse::document(doc))
}

/// DELETE /api/v1/users/:id
///
/// Identities are never removed, only deactivated.
pub async fn delete_user(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<AuthenticatedUser>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<StatusCode, AppError> {
    let user = state.users.find_raw(parse_id(&id)?).await?;
    state.credentials.deactivate(user.id).await?;
    tracing::info!(user_id = %user.id, admin_id = %caller.user.id, "user deactivated by admin");
    audit_log(&AuditEvent::AccountDeactivated {
        user_id: user.id,
        ip_address: extract_ip_address(&headers),
    });
    Ok(StatusCode::NO_CONTENT)
}
