use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::repositories::exam_records::StoreError;

const UNAVAILABLE_MESSAGE: &str =
    "The exam service is temporarily unavailable. Please try again in a moment.";

#[derive(Debug, Serialize)]
struct ErrorResponse {
    success: bool,
    message: String,
}

/// `load` misses carry an explicit `data: null` so clients can treat them as a first visit.
#[derive(Debug, Serialize)]
struct NotFoundResponse {
    success: bool,
    data: Option<()>,
    message: String,
}

#[derive(Debug)]
pub(crate) enum ApiError {
    BadRequest(String),
    NotFound(String),
    Conflict(String),
    TooManyRequests(&'static str),
    ServiceUnavailable(String),
    Internal(String),
}

impl ApiError {
    /// Log the underlying error with context and return an `Internal` variant.
    pub(crate) fn internal(err: impl std::fmt::Display, context: &str) -> Self {
        tracing::error!(error = %err, "{context}");
        Self::Internal(context.to_string())
    }

    fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::TooManyRequests(_) => StatusCode::TOO_MANY_REQUESTS,
            ApiError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Unavailable(source) => {
                tracing::error!(error = %source, "Exam record store unavailable");
                ApiError::ServiceUnavailable(UNAVAILABLE_MESSAGE.to_string())
            }
            StoreError::Rejected(rejection) => ApiError::Conflict(rejection.to_string()),
            StoreError::Database(source) => {
                ApiError::internal(source, "Failed to access exam records")
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        match self {
            ApiError::NotFound(message) => {
                (status, Json(NotFoundResponse { success: false, data: None, message }))
                    .into_response()
            }
            ApiError::TooManyRequests(message) => {
                (status, Json(ErrorResponse { success: false, message: message.to_string() }))
                    .into_response()
            }
            ApiError::Internal(message) => {
                tracing::error!(error = %message, "Internal server error");
                let message = "Something went wrong. Please try again.".to_string();
                (status, Json(ErrorResponse { success: false, message })).into_response()
            }
            ApiError::BadRequest(message)
            | ApiError::Conflict(message)
            | ApiError::ServiceUnavailable(message) => {
                (status, Json(ErrorResponse { success: false, message })).into_response()
            }
        }
    }
}
