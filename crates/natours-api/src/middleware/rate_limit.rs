//! Rate limiting middleware
//!
//! Token buckets keyed by client IP through `tower_governor`. The IP comes
//! from `X-Forwarded-For`, `X-Real-IP` or `Forwarded` when a proxy sets them,
//! else from the peer address, so the server must be started with
//! `into_make_service_with_connect_info`.

use crate::error::AppError;
use axum::{
    extract::Request,
    http::{header, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Router,
};
use natours_core::config::RateLimit;
use std::sync::Arc;
use std::time::Duration;
use tower_governor::{
    governor::GovernorConfigBuilder, key_extractor::SmartIpKeyExtractor, GovernorLayer,
};

pub const TOO_MANY_REQUESTS: &str = "Too many requests from this IP, please try again later";

/// Put every route of `router` behind one limiter
pub fn limited<S>(router: Router<S>, limit: RateLimit) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    let config = GovernorConfigBuilder::default()
        .period(Duration::from_secs(limit.period_secs.max(1)))
        .burst_size(limit.burst.max(1))
        .key_extractor(SmartIpKeyExtractor)
        .finish();

    match config {
        Some(config) => router.layer(GovernorLayer {
            config: Arc::new(config),
        }),
        None => {
            tracing::warn!(?limit, "invalid rate limit, requests are not limited");
            router
        }
    }
}

/// Give limiter rejections the failure envelope
pub async fn rate_limit_envelope(request: Request, next: Next) -> Response {
    let response = next.run(request).await;
    if response.status() != StatusCode::TOO_MANY_REQUESTS {
        return response;
    }

    let retry_after = response.headers().get(header::RETRY_AFTER).cloned();
    let mut envelope = AppError::TooManyRequests(TOO_MANY_REQUESTS.to_string()).into_response();
    if let Some(value) = retry_after {
        envelope.headers_mut().insert(header::RETRY_AFTER, value);
    }
    envelope
}
