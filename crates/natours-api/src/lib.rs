//! Natours API - REST server for tours, users and reviews
//!
//! Provides the HTTP surface over `natours-core`: authentication, access
//! control, password reset and the resource endpoints under `/api/v1`.

pub mod audit;
pub mod auth;
pub mod error;
pub mod handlers;
pub mod mailer;
pub mod middleware;
pub mod response;
pub mod routes;
pub mod state;

use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue, Method},
    routing::get,
    Router,
};
use state::AppState;
use std::sync::Arc;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};

fn cors_layer(origins: &[String]) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ]);

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(%origin, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    if allowed.is_empty() {
        cors.allow_origin(Any)
    } else {
        cors.allow_origin(AllowOrigin::list(allowed))
            .allow_credentials(true)
    }
}

/// Build the application router
pub fn create_router(state: Arc<AppState>) -> Router {
    let production = state.config.environment.is_production();

    let app = Router::new()
        .route("/health", get(handlers::health_check))
        .nest("/api/v1", routes::api_routes(&state))
        .fallback(handlers::not_found)
        .layer(axum::middleware::from_fn(middleware::rate_limit_envelope));

    let app = if production {
        app
    } else {
        app.layer(axum::middleware::from_fn(error::expose_error_details))
    };

    app.layer(DefaultBodyLimit::max(state.config.server.max_body_size))
        .layer(axum::middleware::from_fn_with_state(
            middleware::SecurityHeaders { hsts: production },
            middleware::security_headers_middleware,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(&state.config.server.cors_origins))
        .with_state(state)
}

/// Helpers for the integration tests
#[cfg(feature = "test-utils")]
pub mod test_support {
    use super::*;
    use crate::mailer::RecordingMailer;
    use natours_core::{AppConfig, MemoryStore};

    /// Router over a fresh in-memory store plus handles to its internals
    pub struct TestApp {
        pub router: Router,
        pub state: Arc<AppState>,
        pub mailer: Arc<RecordingMailer>,
    }

    pub fn test_app_with(config: AppConfig) -> TestApp {
        let mailer = Arc::new(RecordingMailer::new());
        let state = Arc::new(AppState::new(
            config,
            Arc::new(MemoryStore::new()),
            mailer.clone(),
        ));
        TestApp {
            router: create_router(state.clone()),
            state,
            mailer,
        }
    }

    pub fn test_app() -> TestApp {
        test_app_with(AppConfig::for_testing())
    }
}
