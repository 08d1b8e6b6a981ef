use axum::Json;
use utoipa::OpenApi;
use utoipa_redoc::{Redoc, Servable};

use super::dto;
use super::handlers;
use super::response;
use crate::ocr;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "ocrgate API",
        description = "Text recognition over HTTP. Submit an image URL or base64 payload, get positioned text back.",
    ),
    paths(
        handlers::ocr::recognize,
        handlers::health::health_check,
        handlers::docs::usage,
    ),
    components(schemas(
        dto::OcrRequest,
        response::OcrResponse,
        response::ErrorResponse,
        ocr::TextLine,
        ocr::SliceConfig,
        ocr::Language,
        handlers::health::HealthResponse,
    )),
    tags(
        (name = "ocr", description = "Text recognition"),
        (name = "health", description = "Health check"),
        (name = "docs", description = "Usage documentation"),
    ),
    modifiers(&SecurityAddon),
)]
pub struct ApiDoc;

struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "secret",
            utoipa::openapi::security::SecurityScheme::ApiKey(
                utoipa::openapi::security::ApiKey::Header(
                    utoipa::openapi::security::ApiKeyValue::new("X-Secret"),
                ),
            ),
        );
    }
}

pub async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

pub fn redoc_router<S: Clone + Send + Sync + 'static>() -> axum::Router<S> {
    Redoc::with_url("/docs", ApiDoc::openapi()).into()
}
