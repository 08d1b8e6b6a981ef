// Common test utilities for integration tests
#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Once};
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::Request;
use base64::{engine::general_purpose::STANDARD, Engine};
use image::{Rgb, RgbImage};

use ocrgate::api::AppState;
use ocrgate::config::{
    AuthConfig, Config, FetchConfig, LimitsConfig, LogFormat, LoggingConfig, OcrConfig,
    ServerConfig,
};
use ocrgate::error::Result;
use ocrgate::ingest::DecodedImage;
use ocrgate::ocr::{Detection, Language, OcrEngine, OcrProvider, OcrResult, RecognizeOptions};

static INIT: Once = Once::new();

/// Initialize tracing subscriber once for tests
pub fn init_test_logger() {
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .try_init();
    });
}

/// Deterministic engine double: reports one detection covering every dark
/// pixel, or an empty page for a blank image.
#[derive(Default)]
pub struct InkEngine {
    pub calls: AtomicUsize,
    pub options: Mutex<Vec<RecognizeOptions>>,
}

impl InkEngine {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_options(&self) -> Option<RecognizeOptions> {
        self.options.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl OcrEngine for InkEngine {
    fn name(&self) -> &str {
        "ink"
    }

    async fn recognize(
        &self,
        image: &DecodedImage,
        options: &RecognizeOptions,
    ) -> Result<OcrResult> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.options.lock().unwrap().push(options.clone());

        let mut bounds: Option<(u32, u32, u32, u32)> = None;
        for (x, y, pixel) in image.pixels.enumerate_pixels() {
            if pixel.0.iter().any(|&c| c < 128) {
                bounds = Some(match bounds {
                    None => (x, y, x, y),
                    Some((l, t, r, b)) => (l.min(x), t.min(y), r.max(x), b.max(y)),
                });
            }
        }

        let page = match bounds {
            None => Vec::new(),
            Some((l, t, r, b)) => vec![Detection::from_rect(
                f64::from(l),
                f64::from(t),
                f64::from(r + 1),
                f64::from(b + 1),
                format!("ink@{l},{t}"),
                0.9,
            )],
        };
        Ok(vec![page])
    }
}

pub fn test_config(secret_keys: &[&str], max_image_size: usize) -> Config {
    Config {
        server: ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 25098,
            allowed_origins: "*".to_string(),
            image_root: None,
        },
        auth: AuthConfig::new(secret_keys.iter().copied()),
        limits: LimitsConfig { max_image_size },
        fetch: FetchConfig {
            timeout_secs: 5,
            ..FetchConfig::default()
        },
        ocr: OcrConfig::default(),
        logging: LoggingConfig {
            format: LogFormat::Pretty,
        },
    }
}

pub fn provider_with(engine: Arc<InkEngine>, languages: &[Language]) -> OcrProvider {
    let engines = languages.iter().map(|&language| {
        let engine: Arc<dyn OcrEngine> = engine.clone();
        (language, engine)
    });
    OcrProvider::from_engines(engines, Language::Ch, Duration::from_secs(5))
}

pub fn test_state(config: Config, engine: Arc<InkEngine>) -> AppState {
    AppState::new(config, provider_with(engine, &[Language::Ch, Language::En])).unwrap()
}

/// A white PNG, optionally with a black rectangle `(x, y, width, height)`.
pub fn png_bytes(width: u32, height: u32, ink: Option<(u32, u32, u32, u32)>) -> Vec<u8> {
    let mut pixels = RgbImage::from_pixel(width, height, Rgb([255, 255, 255]));
    if let Some((x0, y0, w, h)) = ink {
        for y in y0..y0 + h {
            for x in x0..x0 + w {
                pixels.put_pixel(x, y, Rgb([0, 0, 0]));
            }
        }
    }
    DecodedImage::from_rgb(pixels).to_png().unwrap()
}

pub fn png_base64(width: u32, height: u32, ink: Option<(u32, u32, u32, u32)>) -> String {
    STANDARD.encode(png_bytes(width, height, ink))
}

pub fn ocr_request(body: serde_json::Value, secret: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/ocr")
        .header("content-type", "application/json");
    if let Some(secret) = secret {
        builder = builder.header("x-secret", secret);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

pub async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

// Re-export commonly used crates for convenience
pub use serial_test::serial;
pub use tempfile;
pub use wiremock;
