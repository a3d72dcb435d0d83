//! Mapping of service errors onto HTTP responses.
//!
//! Lookup and validation failures are reported in the JSON payload with a
//! 200 status. Backend failures become a 500 with a generic message.

use crate::analysis::AggregateError;
use crate::insight::GenerationError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;
use tracing::error;

/// Payload returned for every error case.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Aggregate(#[from] AggregateError),

    #[error(transparent)]
    Generation(#[from] GenerationError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::Aggregate(
                e @ (AggregateError::NotFound(_) | AggregateError::InvalidPeriod(_)),
            ) => (StatusCode::OK, e.to_string()),
            ApiError::Aggregate(e @ AggregateError::MalformedTimestamp { .. }) => {
                error!("Trend aggregation failed: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
            }
            ApiError::Generation(e) => {
                error!("Insight generation failed: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Insight generation failed".to_string(),
                )
            }
        };

        (status, Json(ErrorBody { error: message })).into_response()
    }
}
