//! Tour handlers

use crate::error::AppError;
use crate::response::{ApiResponse, JsonBody, QueryParams};
use crate::state::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use natours_core::{parse_id, Document};
use std::sync::Arc;

/// Query presets of the top-5-cheap alias
pub const TOP_FIVE_CHEAP: [(&str, &str); 3] = [
    ("limit", "5"),
    ("sort", "-ratingsAverage,price"),
    ("fields", "name,price,ratingsAverage,summary,difficulty"),
];

/// Replace the preset keys of `params` with the alias values
pub fn apply_alias(mut params: Vec<(String, String)>, presets: &[(&str, &str)]) -> Vec<(String, String)> {
    params.retain(|(key, _)| !presets.iter().any(|(preset, _)| preset == key));
    params.extend(
        presets
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string())),
    );
    params
}

/// GET /api/v1/tours
pub async fn get_all_tours(
    State(state): State<Arc<AppState>>,
    QueryParams(params): QueryParams,
) -> Result<ApiResponse, AppError> {
    let docs = state.tours.get_all(&params, Vec::new()).await?;
    Ok(ApiResponse::list(docs))
}

/// GET /api/v1/tours/top-5-cheap
pub async fn top_five_cheap(
    State(state): State<Arc<AppState>>,
    QueryParams(params): QueryParams,
) -> Result<ApiResponse, AppError> {
    let params = apply_alias(params, &TOP_FIVE_CHEAP);
    let docs = state.tours.get_all(&params, Vec::new()).await?;
    Ok(ApiResponse::list(docs))
}

/// GET /api/v1/tours/:id, with guides and reviews expanded
pub async fn get_tour(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<ApiResponse, AppError> {
    let doc = state.tours.get_one(parse_id(&id)?, true).await?;
    Ok(ApiResponse::document(doc))
}

/// POST /api/v1/tours
pub async fn create_tour(
    State(state): State<Arc<AppState>>,
    JsonBody(payload): JsonBody<Document>,
) -> Result<Response, AppError> {
    let doc = state.tours.create_one(payload).await?;
    Ok((StatusCode::CREATED, ApiResponse::document(doc)).into_response())
}

/// PATCH /api/v1/tours/:id
pub async fn update_tour(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    JsonBody(patch): JsonBody<Document>,
) -> Result<ApiResponse, AppError> {
    let doc = state.tours.update_one(parse_id(&id)?, patch).await?;
    Ok(ApiResponse::document(doc))
}

/// DELETE /api/v1/tours/:id
///
/// Reviews of the tour are left in place.
pub async fn delete_tour(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    state.tours.delete_one(parse_id(&id)?).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alias_overrides_presets_only() {
        let params = vec![
            ("limit".to_string(), "50".to_string()),
            ("difficulty".to_string(), "easy".to_string()),
        ];
        let params = apply_alias(params, &TOP_FIVE_CHEAP);

        assert_eq!(params.len(), 4);
        assert!(params.contains(&("difficulty".to_string(), "easy".to_string())));
        assert!(params.contains(&("limit".to_string(), "5".to_string())));
        assert!(!params.contains(&("limit".to_string(), "50".to_string())));
    }
}
