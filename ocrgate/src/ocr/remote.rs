use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::engine::{Detection, Language, OcrEngine, OcrResult, RecognizeOptions};
use super::slicing::SliceConfig;
use crate::config::OcrConfig;
use crate::error::{OcrGateError, Result};
use crate::ingest::{encode_png, DecodedImage};

/// Engine that forwards recognition to an inference sidecar over HTTP.
///
/// The sidecar receives `POST {base_url}/predict` and performs its own
/// slicing and seam merging when a slice configuration is sent.
#[derive(Clone, Debug)]
pub struct RemoteEngine {
    client: Client,
    api_key: Option<String>,
    base_url: String,
    language: Language,
}

#[derive(Debug, Serialize)]
struct PredictRequest<'a> {
    image: String,
    lang: Language,
    cls: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    slice: Option<&'a SliceConfig>,
}

#[derive(Debug, Deserialize)]
struct RemoteDetection {
    polygon: Vec<[f64; 2]>,
    text: String,
    confidence: f64,
}

/// One line in the engine's native layout: `[polygon, [text, confidence]]`.
#[derive(Debug, Deserialize)]
struct NativeLine(Vec<[f64; 2]>, (String, f64));

#[derive(Debug, Deserialize)]
struct PredictResponse {
    #[serde(default)]
    pages: Option<Vec<Vec<RemoteDetection>>>,
    /// Native layout; a page with no text may be `null`.
    #[serde(default)]
    result: Option<Vec<Option<Vec<NativeLine>>>>,
}

impl PredictResponse {
    fn into_result(self) -> Result<OcrResult> {
        if let Some(pages) = self.pages {
            return Ok(pages
                .into_iter()
                .map(|page| {
                    page.into_iter()
                        .map(|d| Detection {
                            polygon: d.polygon,
                            text: d.text,
                            confidence: d.confidence,
                        })
                        .collect()
                })
                .collect());
        }
        if let Some(result) = self.result {
            return Ok(result
                .into_iter()
                .map(|page| {
                    page.unwrap_or_default()
                        .into_iter()
                        .map(|NativeLine(polygon, (text, confidence))| Detection {
                            polygon,
                            text,
                            confidence,
                        })
                        .collect()
                })
                .collect());
        }
        Err(OcrGateError::Engine(
            "Remote engine response has neither `pages` nor `result`".to_string(),
        ))
    }
}

impl RemoteEngine {
    pub fn new(config: &OcrConfig, language: Language) -> Result<Self> {
        let base_url = config
            .base_url
            .clone()
            .ok_or_else(|| {
                OcrGateError::EngineUnavailable("OCR_BASE_URL required for remote OCR".to_string())
            })?
            .trim_end_matches('/')
            .to_string();

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| OcrGateError::Internal(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_key: config.api_key.clone(),
            base_url,
            language,
        })
    }
}

#[async_trait]
impl OcrEngine for RemoteEngine {
    fn name(&self) -> &str {
        "remote"
    }

    async fn recognize(
        &self,
        image: &DecodedImage,
        options: &RecognizeOptions,
    ) -> Result<OcrResult> {
        let pixels = Arc::clone(&image.pixels);
        let encoded = tokio::task::spawn_blocking(move || {
            encode_png(&pixels).map(|png| STANDARD.encode(png))
        })
        .await
        .map_err(|e| OcrGateError::Internal(format!("Image encoding task failed: {e}")))??;

        let request = PredictRequest {
            image: encoded,
            lang: self.language,
            cls: options.classify_orientation,
            slice: options.slice.as_ref(),
        };

        let mut builder = self
            .client
            .post(format!("{}/predict", self.base_url))
            .json(&request);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| OcrGateError::Engine(format!("Remote engine request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(OcrGateError::Engine(format!(
                "Remote engine returned {status}: {body}"
            )));
        }

        response
            .json::<PredictResponse>()
            .await
            .map_err(|e| OcrGateError::Engine(format!("Failed to parse engine response: {e}")))?
            .into_result()
    }
}
