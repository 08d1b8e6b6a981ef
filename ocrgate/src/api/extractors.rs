use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;

use crate::error::OcrGateError;

impl From<JsonRejection> for OcrGateError {
    fn from(rejection: JsonRejection) -> Self {
        map_json_rejection(rejection)
    }
}

fn map_json_rejection(rejection: JsonRejection) -> OcrGateError {
    if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
        return OcrGateError::Validation("Request body too large".to_string());
    }

    match rejection {
        JsonRejection::JsonDataError(err) => {
            let message = err.body_text();
            if let Some(field) = extract_missing_field(&message) {
                OcrGateError::Validation(format!("Missing required field: {field}"))
            } else {
                OcrGateError::Validation(format!("Invalid JSON: {message}"))
            }
        }
        JsonRejection::JsonSyntaxError(err) => {
            OcrGateError::Validation(format!("JSON syntax error: {}", err.body_text()))
        }
        JsonRejection::MissingJsonContentType(_) => OcrGateError::Validation(
            "Missing `Content-Type: application/json` header".to_string(),
        ),
        JsonRejection::BytesRejection(_) => {
            OcrGateError::Internal("Failed to read request body".to_string())
        }
        _ => OcrGateError::Validation(rejection.body_text()),
    }
}

fn extract_missing_field(message: &str) -> Option<&str> {
    let prefix = "missing field `";
    let start = message.find(prefix)? + prefix.len();
    let remaining = message.get(start..)?;
    let end = remaining.find('`')?;
    remaining.get(..end)
}
