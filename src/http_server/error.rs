//! API error mapping for the trigger surface.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

use crate::pipeline::PipelineError;

/// Errors returned by the trigger surface, mapped to HTTP statuses with a
/// JSON body.
#[derive(Debug)]
pub enum ApiError {
    /// The referenced wallet or alert does not exist.
    NotFound(String),
    /// Anything else; reported but not detailed to the caller beyond the
    /// message.
    Internal(String),
}

impl From<PipelineError> for ApiError {
    fn from(e: PipelineError) -> Self {
        match e {
            PipelineError::UnknownWallet(address) => {
                ApiError::NotFound(format!("wallet not registered: {address}"))
            }
            PipelineError::Dispatch(
                crate::notification::error::DispatchError::AlertNotFound(id),
            ) => ApiError::NotFound(format!("alert not found: {id}")),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(message) => (StatusCode::NOT_FOUND, message),
            ApiError::Internal(message) => (StatusCode::INTERNAL_SERVER_ERROR, message),
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}
