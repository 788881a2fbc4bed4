//! Success envelope and request extractors

use crate::error::AppError;
use axum::{
    extract::{FromRequest, FromRequestParts},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// `{status: "success", results?, token?, message?, data?}`
#[derive(Debug, Serialize)]
pub struct ApiResponse {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub results: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl ApiResponse {
    fn empty() -> Self {
        Self {
            status: "success",
            results: None,
            token: None,
            message: None,
            data: None,
        }
    }

    pub fn success(data: Value) -> Self {
        Self {
            data: Some(data),
            ..Self::empty()
        }
    }

    /// `data: {data: <doc>}`, the shape of every generic resource response
    pub fn document(doc: impl Serialize) -> Self {
        Self::success(json!({ "data": doc }))
    }

    /// A list response carrying the number of returned documents
    pub fn list<T: Serialize>(docs: Vec<T>) -> Self {
        let results = docs.len();
        Self {
            results: Some(results),
            ..Self::document(docs)
        }
    }

    pub fn message(message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            ..Self::empty()
        }
    }

    /// Bare `{status: "success"}`
    pub fn ok() -> Self {
        Self::empty()
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }
}

impl IntoResponse for ApiResponse {
    fn into_response(self) -> Response {
        Json(self).into_response()
    }
}

/// JSON body whose rejections use the failure envelope
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct JsonBody<T>(pub T);

/// Raw query string pairs in request order, repeated keys included
#[derive(Debug, Deserialize, FromRequestParts)]
#[serde(transparent)]
#[from_request(via(axum::extract::Query), rejection(AppError))]
pub struct QueryParams(pub Vec<(String, String)>);
