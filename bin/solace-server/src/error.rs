//! Unified server error type.
//!
//! Every handler returns `Result<T, ServerError>`, which implements
//! [`axum::response::IntoResponse`]. All upstream failures (store, model,
//! network, empty output) collapse into a 500 whose `detail` is the error's
//! display text; clients cannot tell them apart beyond that string.

use axum::Json;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::model::ModelError;
use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Model(#[from] ModelError),

    /// The model call succeeded but produced no text.
    #[error("No response generated")]
    EmptyResponse,

    /// The request was well-formed HTTP but missing or invalid input.
    #[error("{0}")]
    Unprocessable(String),
}

impl ServerError {
    pub fn status(&self) -> StatusCode {
        match self {
            ServerError::Unprocessable(_) => StatusCode::UNPROCESSABLE_ENTITY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

// Extractor rejections use the same `{"detail": ..}` body as handler errors.
impl From<JsonRejection> for ServerError {
    fn from(rejection: JsonRejection) -> Self {
        ServerError::Unprocessable(rejection.body_text())
    }
}

impl From<QueryRejection> for ServerError {
    fn from(rejection: QueryRejection) -> Self {
        ServerError::Unprocessable(rejection.body_text())
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();
        let detail = self.to_string();
        if status.is_server_error() {
            error!(error = ?self, "request failed");
        }
        (status, Json(json!({ "detail": detail }))).into_response()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn upstream_failures_are_500_with_text() {
        let err = ServerError::from(StoreError::Api {
            status: 401,
            message: "Invalid API key".into(),
        });
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.to_string(), "store returned 401: Invalid API key");

        let err = ServerError::from(ModelError::Api { status: 429, message: "quota".into() });
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn empty_response_detail() {
        assert_eq!(ServerError::EmptyResponse.to_string(), "No response generated");
        assert_eq!(ServerError::EmptyResponse.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn unprocessable_is_422() {
        let err = ServerError::Unprocessable("message is required".into());
        assert_eq!(err.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }
}
