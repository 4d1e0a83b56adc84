use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

use crate::engine::query::QueryError;
use crate::engine::workflow::WorkflowError;
use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("unauthenticated: {0}")]
    Unauthenticated(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::OrderNotFound(_) | StoreError::MatchNotFound(_) => {
                AppError::NotFound(err.to_string())
            }
            StoreError::AlreadyDecided { .. } | StoreError::InvalidOrderTransition { .. } => {
                AppError::Conflict(err.to_string())
            }
            StoreError::Backend(_) => AppError::Internal(err.to_string()),
        }
    }
}

impl From<WorkflowError> for AppError {
    fn from(err: WorkflowError) -> Self {
        match err {
            WorkflowError::MatchNotFound(_) | WorkflowError::OrderNotFound(_) => {
                AppError::NotFound(err.to_string())
            }
            WorkflowError::UnauthorizedActor { .. } => AppError::Forbidden(err.to_string()),
            WorkflowError::IllegalTransition { .. } | WorkflowError::OrderNotEditable { .. } => {
                AppError::Conflict(err.to_string())
            }
            WorkflowError::Store(inner) => inner.into(),
        }
    }
}

impl From<QueryError> for AppError {
    fn from(err: QueryError) -> Self {
        match err {
            QueryError::MatchNotFound(_) | QueryError::OrderNotFound(_) => {
                AppError::NotFound(err.to_string())
            }
            QueryError::UnauthorizedActor { .. } => AppError::Forbidden(err.to_string()),
            QueryError::InvalidFilter(_) => AppError::BadRequest(err.to_string()),
            QueryError::Store(inner) => inner.into(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::Unauthenticated(msg) => (StatusCode::UNAUTHORIZED, msg.clone()),
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg.clone()),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg.clone()),
            AppError::Internal(msg) => {
                tracing::error!(error = %msg, "request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, msg.clone())
            }
        };

        let body = Json(json!({
            "error": message
        }));

        (status, body).into_response()
    }
}
