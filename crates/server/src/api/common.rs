// Endpoint error type
//
// Every endpoint failure becomes a structured JSON body
// {"status": "error", "error": "<message>"} with a 5xx status.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use loadbench_core::ErrorResponse;
use thiserror::Error;

use crate::storage::{PoolError, StoreError};

#[derive(Debug, Error)]
pub enum ApiError {
    /// No pooled connection within the wait limit
    #[error("{0}")]
    PoolExhausted(String),

    /// Pool closed (service shutting down) or database unreachable
    #[error("{0}")]
    Unavailable(String),

    /// The database rejected, failed or timed out the query
    #[error("{0}")]
    Query(String),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::PoolExhausted(_) | ApiError::Unavailable(_) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            ApiError::Query(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            ApiError::PoolExhausted(_) => "pool_exhausted",
            ApiError::Unavailable(_) => "unavailable",
            ApiError::Query(_) => "query_error",
        }
    }
}

impl From<PoolError> for ApiError {
    fn from(err: PoolError) -> Self {
        match err {
            PoolError::Exhausted { .. } => ApiError::PoolExhausted(err.to_string()),
            PoolError::Closed => ApiError::Unavailable(err.to_string()),
            PoolError::Source(source) => source.into(),
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Unavailable(_) => ApiError::Unavailable(err.to_string()),
            StoreError::Query(_) | StoreError::Timeout(_) => ApiError::Query(err.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        tracing::error!(kind = self.kind(), error = %self, "Endpoint failed");
        (status, Json(ErrorResponse::new(self.to_string()))).into_response()
    }
}
