use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::api::response::ErrorResponse;

#[derive(Error, Debug)]
pub enum OcrGateError {
    #[error("{0}")]
    Validation(String),

    #[error("Invalid base64 image: {0}")]
    InvalidBase64(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("Image fetch failed: {0}")]
    Fetch(String),

    #[error("Image decode failed: {0}")]
    Decode(String),

    #[error("OCR engine error: {0}")]
    Engine(String),

    #[error("OCR engine unavailable: {0}")]
    EngineUnavailable(String),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl OcrGateError {
    pub fn status(&self) -> StatusCode {
        match self {
            OcrGateError::Validation(_)
            | OcrGateError::InvalidBase64(_)
            | OcrGateError::Json(_)
            | OcrGateError::UrlParse(_) => StatusCode::BAD_REQUEST,
            OcrGateError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            OcrGateError::Forbidden(_) => StatusCode::FORBIDDEN,
            OcrGateError::NotFound(_) => StatusCode::NOT_FOUND,
            OcrGateError::Fetch(_) | OcrGateError::Http(_) => StatusCode::BAD_GATEWAY,
            OcrGateError::EngineUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            OcrGateError::Decode(_)
            | OcrGateError::Engine(_)
            | OcrGateError::Io(_)
            | OcrGateError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable error class name reported to clients on server-side failures.
    pub fn error_type(&self) -> &'static str {
        match self {
            OcrGateError::Validation(_) | OcrGateError::Json(_) | OcrGateError::UrlParse(_) => {
                "ValidationError"
            }
            OcrGateError::Unauthorized(_) | OcrGateError::Forbidden(_) => "AuthError",
            OcrGateError::NotFound(_) => "NotFoundError",
            OcrGateError::InvalidBase64(_) | OcrGateError::Fetch(_) | OcrGateError::Http(_) => {
                "AcquisitionError"
            }
            OcrGateError::Decode(_) => "DecodeError",
            OcrGateError::Engine(_) | OcrGateError::EngineUnavailable(_) => "EngineError",
            OcrGateError::Io(_) | OcrGateError::Internal(_) => "InternalError",
        }
    }
}

impl IntoResponse for OcrGateError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = self.to_string();

        let body = if status.is_server_error() {
            tracing::error!(
                error_type = self.error_type(),
                status = status.as_u16(),
                "Request failed: {:?}",
                self
            );
            ErrorResponse::new(message).with_type(self.error_type())
        } else {
            tracing::warn!(
                error_type = self.error_type(),
                status = status.as_u16(),
                "Request rejected: {}",
                message
            );
            ErrorResponse::new(message)
        };

        (status, Json(body)).into_response()
    }
}

pub type Result<T> = std::result::Result<T, OcrGateError>;
