//! `POST /ocr`
//!
//! Request lifecycle: authenticate, validate, size-check, then hand off to
//! [`RecognitionService`](crate::services::RecognitionService) for
//! acquisition, decoding, optional slicing, recognition and formatting. Any
//! stage may short-circuit into an [`OcrGateError`] response.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use tracing::Instrument;
use uuid::Uuid;
use validator::Validate;

use crate::api::auth::authorize;
use crate::api::dto::OcrRequest;
use crate::api::response::{ErrorResponse, OcrResponse};
use crate::api::AppState;
use crate::error::{OcrGateError, Result};

#[utoipa::path(
    post,
    path = "/ocr",
    tag = "ocr",
    request_body = OcrRequest,
    params(
        ("X-Secret" = Option<String>, Header, description = "Shared secret, alternative to the `secret` body field"),
    ),
    responses(
        (status = 200, description = "Recognised text", body = OcrResponse),
        (status = 400, description = "Invalid request or oversized image", body = ErrorResponse),
        (status = 401, description = "Missing secret", body = ErrorResponse),
        (status = 403, description = "Unknown secret", body = ErrorResponse),
        (status = 404, description = "img_path not found", body = ErrorResponse),
        (status = 500, description = "Decode or engine failure", body = ErrorResponse),
        (status = 502, description = "Image URL could not be fetched", body = ErrorResponse),
        (status = 503, description = "No OCR engine available", body = ErrorResponse),
    ),
    security((), ("secret" = []))
)]
pub async fn recognize(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: std::result::Result<Json<OcrRequest>, JsonRejection>,
) -> Result<Json<OcrResponse>> {
    let request_id = Uuid::new_v4().to_string();
    let span = tracing::info_span!("ocr", request_id = %request_id);

    async move {
        // Authenticate before reporting anything about the body.
        let body_secret = payload
            .as_ref()
            .ok()
            .and_then(|Json(req)| req.secret.as_deref());
        authorize(&state.config.auth, &headers, body_secret)?;

        let Json(req) = payload?;
        req.validate()
            .map_err(|e| OcrGateError::Validation(format!("Invalid request: {e}")))?;

        if !state.ocr().is_available() {
            return Err(OcrGateError::EngineUnavailable(
                "no OCR engine could be initialized".to_string(),
            ));
        }

        let request = req.into_recognition(state.ocr().default_language())?;
        tracing::info!(
            source = request.source.kind(),
            language = %request.language,
            cls = request.classify_orientation,
            "OCR request received"
        );

        let outcome = state.recognition.recognize(request).await?;
        Ok(Json(OcrResponse::from_outcome(outcome, request_id)))
    }
    .instrument(span)
    .await
}
