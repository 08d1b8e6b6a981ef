//! Shared-secret authentication for `/ocr`.
//!
//! The secret is read from the `X-Secret` header, falling back to the body's
//! `secret` field. Any of the configured keys is accepted, so keys can be
//! rotated by listing old and new ones together in `SECRET_KEY`.
//!
//! - No keys configured: every request passes.
//! - No secret sent: 401.
//! - Secret not in the configured set: 403.

use axum::http::HeaderMap;

use crate::config::AuthConfig;
use crate::error::{OcrGateError, Result};

pub const SECRET_HEADER: &str = "x-secret";

fn provided_secret<'a>(headers: &'a HeaderMap, body_secret: Option<&'a str>) -> Option<&'a str> {
    headers
        .get(SECRET_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .or_else(|| body_secret.map(str::trim).filter(|s| !s.is_empty()))
}

pub fn authorize(auth: &AuthConfig, headers: &HeaderMap, body_secret: Option<&str>) -> Result<()> {
    if !auth.is_enabled() {
        return Ok(());
    }

    match provided_secret(headers, body_secret) {
        None => Err(OcrGateError::Unauthorized(
            "Missing secret: send the X-Secret header or a `secret` field".to_string(),
        )),
        Some(secret) if auth.accepts(secret) => Ok(()),
        Some(_) => Err(OcrGateError::Forbidden("Invalid secret".to_string())),
    }
}
