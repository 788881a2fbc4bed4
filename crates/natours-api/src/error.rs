//! API error handling
//!
//! Every failure leaves the server as `{status, message}`: `fail` for client
//! errors, `error` for server errors. Unexpected errors are logged and
//! answered with a generic message; the internal detail travels in a response
//! extension that only the development-mode layer turns back into JSON.

use crate::auth::jwt::JwtError;
use crate::auth::password::PasswordError;
use crate::mailer::DeliveryError;
use axum::{
    body::Body,
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Request,
    },
    http::{header, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use natours_core::NatoursError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Message sent for every unexpected server error
pub const GENERIC_ERROR_MESSAGE: &str = "Something went wrong!";

/// Failure envelope
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiError {
    /// "fail" (4xx) or "error" (5xx)
    pub status: String,
    /// Human-readable message
    pub message: String,
    /// Internal detail, development mode only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status: if status.is_server_error() { "error" } else { "fail" }.to_string(),
            message: message.into(),
            error: None,
        }
    }
}

/// Internal detail of a 5xx response
#[derive(Debug, Clone)]
pub struct InternalErrorDetail(pub String);

/// Application error type
#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Unauthenticated(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("Token is invalid or has expired")]
    InvalidOrExpiredToken,

    #[error("{0}")]
    IncorrectPassword(String),

    #[error("{0}")]
    MissingField(String),

    #[error("{0}")]
    ValidationFailed(String),

    #[error("{0}")]
    DuplicateKey(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("There was an error sending the email. Try again later!")]
    Delivery(String),

    #[error("{0}")]
    TooManyRequests(String),

    #[error("{0}")]
    NotDefined(String),

    #[error("{0}")]
    Internal(String),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Unauthenticated(_) | AppError::IncorrectPassword(_) => {
                StatusCode::UNAUTHORIZED
            }
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::InvalidOrExpiredToken
            | AppError::MissingField(_)
            | AppError::ValidationFailed(_)
            | AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::DuplicateKey(_) => StatusCode::CONFLICT,
            AppError::TooManyRequests(_) => StatusCode::TOO_MANY_REQUESTS,
            AppError::Delivery(_) | AppError::NotDefined(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = self.to_string();
        let (message, detail) = match self {
            AppError::Internal(detail) => {
                tracing::error!(error = %detail, "Unhandled error");
                (GENERIC_ERROR_MESSAGE.to_string(), Some(detail))
            }
            AppError::Delivery(detail) => {
                tracing::error!(error = %detail, "Email delivery failed");
                (message, Some(detail))
            }
            _ => (message, None),
        };

        let mut response = (status, Json(ApiError::new(status, message))).into_response();
        if let Some(detail) = detail {
            response.extensions_mut().insert(InternalErrorDetail(detail));
        }
        response
    }
}

impl From<NatoursError> for AppError {
    fn from(err: NatoursError) -> Self {
        match err {
            NatoursError::NotFound(msg) => AppError::NotFound(msg),
            NatoursError::InvalidId(_) => AppError::BadRequest(err.to_string()),
            NatoursError::DuplicateKey { field, value } => AppError::DuplicateKey(format!(
                "Duplicate field value: {field} = {value}. Please use another value!"
            )),
            NatoursError::ValidationError(_) => AppError::ValidationFailed(err.to_string()),
            NatoursError::InvalidQuery(_) => AppError::BadRequest(err.to_string()),
            NatoursError::AccessDenied { reason } => AppError::Forbidden(reason),
            NatoursError::DatabaseError(_)
            | NatoursError::ConfigError(_)
            | NatoursError::Other(_) => AppError::Internal(err.to_string()),
        }
    }
}

impl From<JwtError> for AppError {
    fn from(err: JwtError) -> Self {
        match err {
            JwtError::ExpiredToken => {
                AppError::Unauthenticated("Your token has expired! Please log in again.".to_string())
            }
            JwtError::EncodingError(e) => AppError::Internal(format!("Failed to sign token: {e}")),
            JwtError::InvalidToken | JwtError::InvalidSignature => {
                AppError::Unauthenticated("Invalid token. Please log in again!".to_string())
            }
        }
    }
}

impl From<PasswordError> for AppError {
    fn from(err: PasswordError) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl From<DeliveryError> for AppError {
    fn from(err: DeliveryError) -> Self {
        AppError::Delivery(err.to_string())
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

/// Development-mode layer re-exposing internal detail of 5xx responses
pub async fn expose_error_details(request: Request, next: Next) -> Response {
    let response = next.run(request).await;
    let Some(InternalErrorDetail(detail)) = response.extensions().get().cloned() else {
        return response;
    };

    let (mut parts, body) = response.into_parts();
    let Ok(bytes) = axum::body::to_bytes(body, usize::MAX).await else {
        return (parts.status, Json(ApiError::new(parts.status, GENERIC_ERROR_MESSAGE)))
            .into_response();
    };
    let mut envelope: ApiError = match serde_json::from_slice(&bytes) {
        Ok(envelope) => envelope,
        Err(_) => return Response::from_parts(parts, Body::from(bytes)),
    };
    envelope.error = Some(detail);

    let Ok(json) = serde_json::to_vec(&envelope) else {
        return Response::from_parts(parts, Body::from(bytes));
    };
    parts.headers.remove(header::CONTENT_LENGTH);
    parts.headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/json"),
    );
    Response::from_parts(parts, Body::from(json))
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_internal_error_is_generic() {
        let response = AppError::Internal("connection reset by peer".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(response.extensions().get::<InternalErrorDetail>().is_some());

        let body = body_json(response).await;
        assert_eq!(body["status"], "error");
        assert_eq!(body["message"], GENERIC_ERROR_MESSAGE);
        assert!(body.get("error").is_none());
    }

    #[tokio::test]
    async fn test_client_errors_are_fail() {
        let response = AppError::Forbidden("nope".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        let body = body_json(response).await;
        assert_eq!(body["status"], "fail");
        assert_eq!(body["message"], "nope");
    }

    #[test]
    fn test_core_error_translation() {
        let err: AppError = NatoursError::DuplicateKey {
            field: "email".to_string(),
            value: "a@b.io".to_string(),
        }
        .into();
        assert_eq!(err.status_code(), StatusCode::CONFLICT);
        assert!(err.to_string().ends_with("Please use another value!"));

        let err: AppError = NatoursError::InvalidId("xyz".to_string()).into();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(err.to_string(), "Invalid id: xyz");

        let err: AppError = NatoursError::ValidationError("Bad name.".to_string()).into();
        assert_eq!(err.to_string(), "Invalid input data. Bad name.");

        let err: AppError = NatoursError::DatabaseError("disk full".to_string()).into();
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_jwt_errors_never_leak() {
        let err: AppError = JwtError::InvalidSignature.into();
        assert_eq!(err.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(err.to_string(), "Invalid token. Please log in again!");

        let err: AppError = JwtError::ExpiredToken.into();
        assert_eq!(err.to_string(), "Your token has expired! Please log in again.");
    }
}
