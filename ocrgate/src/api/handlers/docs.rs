use axum::extract::State;

use crate::api::AppState;
use crate::ocr::Language;

/// `GET /`: plain-text usage.
#[utoipa::path(
    get,
    path = "/",
    tag = "docs",
    responses(
        (status = 200, description = "Usage documentation", body = String, content_type = "text/plain"),
    )
)]
pub async fn usage(State(state): State<AppState>) -> String {
    let port = state.config.server.port;
    let languages = state
        .ocr()
        .languages()
        .iter()
        .map(Language::as_str)
        .collect::<Vec<_>>()
        .join(", ");
    let auth = if state.config.auth.is_enabled() {
        "required: send `X-Secret: <key>` or a `secret` body field"
    } else {
        "disabled"
    };

    format!(
        r#"ocrgate {version}

POST /ocr
  Recognise text in an image.

  Body (JSON):
    image     image URL (http/https), base64 string or data:image/...;base64,... URI
    img_path  path under the server's IMAGE_ROOT (instead of image)
    lang      one of: {languages} (default {default})
    cls       detect text orientation, default true
    slice     {{"horizontal_stride", "vertical_stride", "merge_x_thres", "merge_y_thres"}}
              computed automatically for images larger than 2000px
    secret    shared secret

  Authentication: {auth}
  Max image size: {max_size} bytes

  Example:
    curl -X POST http://localhost:{port}/ocr \
      -H 'Content-Type: application/json' \
      -H 'X-Secret: <key>' \
      -d '{{"image": "https://example.com/receipt.png", "lang": "en"}}'

GET /health         service status
GET /docs           API reference
GET /openapi.json   OpenAPI document
"#,
        version = env!("CARGO_PKG_VERSION"),
        default = state.ocr().default_language(),
        max_size = state.config.limits.max_image_size,
    )
}
