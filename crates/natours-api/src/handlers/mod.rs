//! HTTP handlers

pub mod auth;
pub mod health;
pub mod reviews;
pub mod tours;
pub mod users;

use crate::error::AppError;
use axum::http::Uri;

pub use health::health_check;

/// Answer for any route nothing else matched
pub async fn not_found(uri: Uri) -> AppError {
    let target = uri
        .path_and_query()
        .map_or_else(|| uri.path().to_string(), |pq| pq.as_str().to_string());
    AppError::NotFound(format!("Can't find {target} on this server!"))
}
