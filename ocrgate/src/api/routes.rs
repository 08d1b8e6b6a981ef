use axum::extract::DefaultBodyLimit;
use axum::http::HeaderValue;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::handlers;
use super::openapi;
use super::AppState;
use crate::config::split_list;

fn cors_layer(allowed_origins: &str) -> CorsLayer {
    let cors = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if allowed_origins.trim() == "*" {
        return cors.allow_origin(Any);
    }

    let origins: Vec<HeaderValue> = split_list(allowed_origins)
        .into_iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin '{}'", origin);
                None
            }
        })
        .collect();
    cors.allow_origin(AllowOrigin::list(origins))
}

pub fn create_router(state: AppState) -> Router {
    let cors = cors_layer(&state.config.server.allowed_origins);
    let body_limit = state.config.limits.max_body_size();

    Router::new()
        .route("/", get(handlers::usage))
        .route("/health", get(handlers::health_check))
        .route("/ocr", post(handlers::recognize))
        .route("/openapi.json", get(openapi::openapi_json))
        .merge(openapi::redoc_router())
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::header::{ACCESS_CONTROL_ALLOW_ORIGIN, ORIGIN};
    use axum::http::{Request, StatusCode};
    use std::time::Duration;
    use tower::ServiceExt;

    use crate::config::Config;
    use crate::ocr::{Language, OcrProvider};

    fn state(allowed_origins: &str) -> AppState {
        let mut config = Config::default();
        config.server.allowed_origins = allowed_origins.to_string();
        let ocr = OcrProvider::from_engines(Vec::new(), Language::Ch, Duration::from_secs(1));
        AppState::new(config, ocr).unwrap()
    }

    async fn get_with_origin(app: Router, uri: &str, origin: &str) -> axum::response::Response {
        app.oneshot(
            Request::builder()
                .uri(uri)
                .header(ORIGIN, origin)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_wildcard_cors() {
        let app = create_router(state("*"));
        let response = get_with_origin(app, "/health", "https://a.test").await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[ACCESS_CONTROL_ALLOW_ORIGIN], "*");
    }

    #[tokio::test]
    async fn test_origin_list() {
        let app = create_router(state("https://a.test, https://b.test"));
        let allowed = get_with_origin(app.clone(), "/health", "https://b.test").await;
        assert_eq!(allowed.headers()[ACCESS_CONTROL_ALLOW_ORIGIN], "https://b.test");

        let denied = get_with_origin(app, "/health", "https://evil.test").await;
        assert!(denied.headers().get(ACCESS_CONTROL_ALLOW_ORIGIN).is_none());
    }

    #[tokio::test]
    async fn test_openapi_json_is_valid() {
        let response = create_router(state("*"))
            .oneshot(Request::builder().uri("/openapi.json").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert!(json["openapi"].as_str().unwrap().starts_with('3'));
        assert!(json["paths"]["/ocr"]["post"].is_object());
    }
}
