use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use mugo_adk::AgentError;
use mugo_core::error::{self, ApiError};

use crate::db::error::StoreError;

/// Internal error type that converts to structured API responses
#[derive(Debug)]
pub enum AppError {
    /// Validation error (400)
    Validation {
        message: String,
        field: Option<String>,
        received: Option<serde_json::Value>,
        docs_hint: Option<String>,
    },
    /// Resource not found (404)
    NotFound { resource: String },
    /// Duplicate resource (409)
    Conflict {
        message: String,
        field: Option<String>,
    },
    /// Persistence is not configured for this process (503)
    Unavailable { message: String },
    /// The agent service failed or answered with something unusable (502).
    /// `detail` is logged, never returned.
    Upstream { detail: String },
    /// Storage failure (500)
    Database(StoreError),
}

impl AppError {
    pub fn validation(field: &str, message: impl Into<String>) -> Self {
        AppError::Validation {
            message: message.into(),
            field: Some(field.to_string()),
            received: None,
            docs_hint: None,
        }
    }

    pub fn not_found(resource: impl Into<String>) -> Self {
        AppError::NotFound {
            resource: resource.into(),
        }
    }

    /// Agent failure with the step that failed, e.g. "nutrition agent run".
    pub fn upstream(context: &str, err: impl std::fmt::Display) -> Self {
        AppError::Upstream {
            detail: format!("{context}: {err}"),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let request_id = uuid::Uuid::now_v7().to_string();

        let (status, api_error) = match self {
            AppError::Validation {
                message,
                field,
                received,
                docs_hint,
            } => (
                StatusCode::BAD_REQUEST,
                ApiError {
                    error: error::codes::VALIDATION_FAILED.to_string(),
                    message,
                    field,
                    received,
                    request_id,
                    docs_hint,
                },
            ),
            AppError::NotFound { resource } => (
                StatusCode::NOT_FOUND,
                ApiError {
                    error: error::codes::NOT_FOUND.to_string(),
                    message: format!("{resource} not found"),
                    field: None,
                    received: None,
                    request_id,
                    docs_hint: None,
                },
            ),
            AppError::Conflict { message, field } => (
                StatusCode::CONFLICT,
                ApiError {
                    error: error::codes::CONFLICT.to_string(),
                    message,
                    field,
                    received: None,
                    request_id,
                    docs_hint: None,
                },
            ),
            AppError::Unavailable { message } => (
                StatusCode::SERVICE_UNAVAILABLE,
                ApiError {
                    error: error::codes::UNAVAILABLE.to_string(),
                    message,
                    field: None,
                    received: None,
                    request_id,
                    docs_hint: Some(
                        "Set DATABASE_URL and restart the API to enable persistence.".to_string(),
                    ),
                },
            ),
            AppError::Upstream { detail } => {
                tracing::error!(request_id = %request_id, "Agent service error: {}", detail);
                (
                    StatusCode::BAD_GATEWAY,
                    ApiError {
                        error: error::codes::UPSTREAM_ERROR.to_string(),
                        message: "The agent service request failed".to_string(),
                        field: None,
                        received: None,
                        request_id,
                        docs_hint: None,
                    },
                )
            }
            AppError::Database(err) => {
                tracing::error!(request_id = %request_id, "Database error: {:?}", err);
                internal(request_id)
            }
        };

        (status, Json(api_error)).into_response()
    }
}

fn internal(request_id: String) -> (StatusCode, ApiError) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        ApiError {
            error: error::codes::INTERNAL_ERROR.to_string(),
            message: "An internal error occurred".to_string(),
            field: None,
            received: None,
            request_id,
            docs_hint: None,
        },
    )
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::InvalidId { field, value, .. } => AppError::Validation {
                message: format!("'{value}' is not a valid {field}"),
                field: Some(field.to_string()),
                received: Some(serde_json::Value::String(value)),
                docs_hint: Some("Identifiers are UUIDs.".to_string()),
            },
            StoreError::NotFound { what } => AppError::NotFound { resource: what },
            StoreError::Conflict { operation, .. } => AppError::Conflict {
                message: format!("Could not {operation}: a matching record already exists"),
                field: None,
            },
            other => AppError::Database(other),
        }
    }
}

impl From<AgentError> for AppError {
    fn from(err: AgentError) -> Self {
        AppError::upstream("agent service call failed", err)
    }
}
