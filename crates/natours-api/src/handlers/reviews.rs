//! Review handlers, top-level and nested under a tour

use crate::auth::AuthenticatedUser;
use crate::error::AppError;
use crate::response::{ApiResponse, JsonBody, QueryParams};
use crate::state::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Extension,
};
use natours_core::{parse_id, Document};
use std::sync::Arc;

/// GET /api/v1/reviews
pub async fn get_all_reviews(
    State(state): State<Arc<AppState>>,
    QueryParams(params): QueryParams,
) -> Result<ApiResponse, AppError> {
    let docs = state.reviews.list(&params, None).await?;
    Ok(ApiResponse::list(docs))
}

/// GET /api/v1/tours/:id/reviews
pub async fn get_tour_reviews(
    State(state): State<Arc<AppState>>,
    Path(tour_id): Path<String>,
    QueryParams(params): QueryParams,
) -> Result<ApiResponse, AppError> {
    let docs = state.reviews.list(&params, Some(parse_id(&tour_id)?)).await?;
    Ok(ApiResponse::list(docs))
}

/// POST /api/v1/reviews
pub async fn create_review(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<AuthenticatedUser>,
    JsonBody(payload): JsonBody<Document>,
) -> Result<Response, AppError> {
    let doc = state.reviews.create(payload, None, &caller.user).await?;
    Ok((StatusCode::CREATED, ApiResponse::document(doc)).into_response())
}

/// POST /api/v1/tours/:id/reviews
pub async fn create_tour_review(
    State(state): State<Arc<AppState>>,
    Path(tour_id): Path<String>,
    Extension(caller): Extension<AuthenticatedUser>,
    JsonBody(payload): JsonBody<Document>,
) -> Result<Response, AppError> {
    let tour_id = parse_id(&tour_id)?;
    let doc = state
        .reviews
        .create(payload, Some(tour_id), &caller.user)
        .await?;
    Ok((StatusCode::CREATED, ApiResponse::document(doc)).into_response())
}

/// GET /api/v1/reviews/:id
pub async fn get_review(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<ApiResponse, AppError> {
    let doc = state.reviews.get(parse_id(&id)?).await?;
    Ok(ApiResponse::document(doc))
}

/// PATCH /api/v1/reviews/:id
pub async fn update_review(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Extension(caller): Extension<AuthenticatedUser>,
    JsonBody(patch): JsonBody<Document>,
) -> Result<ApiResponse, AppError> {
    let doc = state
        .reviews
        .update(parse_id(&id)?, patch, &caller.user)
        .await?;
    Ok(ApiResponse::document(doc))
}

/// DELETE /api/v1/reviews/:id
pub async fn delete_review(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Extension(caller): Extension<AuthenticatedUser>,
) -> Result<StatusCode, AppError> {
    state.reviews.delete(parse_id(&id)?, &caller.user).await?;
    Ok(StatusCode::NO_CONTENT)
}
