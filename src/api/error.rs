use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

use crate::api::types::ErrorResponse;
use crate::coordinator::CoordinatorError;
use crate::session::SessionError;

/// Structured, short-coded error returned by the control API, per the
/// error taxonomy in the wire/control-API contract. The wire protocol
/// itself never surfaces these to a remote peer beyond closing the
/// session; this mapping is for the HTTP/WebSocket adapter only.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error(transparent)]
    Coordinator(#[from] CoordinatorError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl ApiError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::Coordinator(CoordinatorError::TransferNotFound(_)) => {
                (StatusCode::NOT_FOUND, "TRANSFER_NOT_FOUND")
            }
            ApiError::Coordinator(CoordinatorError::TransferAlreadyActive(_)) => {
                (StatusCode::CONFLICT, "TRANSFER_ALREADY_ACTIVE")
            }
            ApiError::Coordinator(CoordinatorError::StorageFailed(_)) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "STORAGE_FAILED")
            }
            ApiError::Coordinator(CoordinatorError::PreconditionViolated(_)) => {
                (StatusCode::BAD_REQUEST, "PRECONDITION_VIOLATED")
            }
            ApiError::Session(_) => (StatusCode::BAD_GATEWAY, "NETWORK_FAILED"),
            ApiError::InvalidRequest(_) => (StatusCode::BAD_REQUEST, "INVALID_REQUEST"),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        let body = Json(ErrorResponse {
            error: self.to_string(),
            code,
        });
        (status, body).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
