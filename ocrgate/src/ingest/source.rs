//! Image acquisition: turns the request's `image` string (or `img_path`)
//! into raw image bytes.
//!
//! An input is treated as base64 when it carries a `data:image/` prefix, or
//! when its length is a multiple of four and every character belongs to the
//! standard base64 alphabet. Anything else is a URL.

use std::path::{Component, Path};
use std::time::{Duration, Instant};

use base64::{engine::general_purpose::STANDARD, Engine};
use futures::StreamExt;
use reqwest::Client;
use url::Url;

use crate::config::FetchConfig;
use crate::error::{OcrGateError, Result};

const DATA_URI_PREFIX: &str = "data:image/";

/// Where the image bytes come from, as determined by [`classify`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageInput {
    Url(String),
    Base64 {
        data: String,
        mime: Option<String>,
    },
}

impl ImageInput {
    pub fn kind(&self) -> &'static str {
        match self {
            ImageInput::Url(_) => "url",
            ImageInput::Base64 { .. } => "base64",
        }
    }
}

/// Owned image bytes plus whatever content type we could learn about them.
#[derive(Debug, Clone)]
pub struct RawImage {
    pub bytes: Vec<u8>,
    pub content_type: Option<String>,
}

impl RawImage {
    pub fn new(bytes: Vec<u8>, content_type: Option<String>) -> Self {
        let content_type =
            content_type.or_else(|| infer::get(&bytes).map(|t| t.mime_type().to_string()));
        Self {
            bytes,
            content_type,
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

fn is_base64_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '+' || c == '/' || c == '='
}

pub fn classify(input: &str) -> ImageInput {
    if input.starts_with(DATA_URI_PREFIX) {
        let mime = input
            .strip_prefix("data:")
            .and_then(|rest| rest.split([';', ',']).next())
            .filter(|m| !m.is_empty())
            .map(String::from);
        return ImageInput::Base64 {
            data: input.to_string(),
            mime,
        };
    }

    if input.len() % 4 == 0 && input.chars().all(is_base64_char) {
        ImageInput::Base64 {
            data: input.to_string(),
            mime: None,
        }
    } else {
        ImageInput::Url(input.to_string())
    }
}

/// Strip a `data:image/...;base64,` header if present.
fn base64_payload(data: &str) -> Result<&str> {
    if data.starts_with(DATA_URI_PREFIX) {
        data.split_once(',')
            .map(|(_, payload)| payload)
            .ok_or_else(|| OcrGateError::InvalidBase64("data URI has no payload".to_string()))
    } else {
        Ok(data)
    }
}

/// Number of bytes `payload` decodes to, computed without decoding it.
pub fn decoded_base64_len(payload: &str) -> usize {
    let len = payload.len();
    if len % 4 != 0 {
        return len * 3 / 4;
    }
    let padding = payload
        .as_bytes()
        .iter()
        .rev()
        .take(2)
        .take_while(|&&b| b == b'=')
        .count();
    (len / 4) * 3 - padding
}

pub(crate) fn ensure_within_limit(size: usize, max_image_size: usize) -> Result<()> {
    if size > max_image_size {
        return Err(OcrGateError::Validation(format!(
            "Image too large: {size} bytes exceeds the limit of {max_image_size} bytes"
        )));
    }
    Ok(())
}

/// Reject an oversized base64 input before any of it is decoded.
pub fn check_base64_size(data: &str, max_image_size: usize) -> Result<()> {
    let payload = base64_payload(data)?;
    ensure_within_limit(decoded_base64_len(payload), max_image_size)
}

pub fn decode_base64(data: &str, mime: Option<String>, max_image_size: usize) -> Result<RawImage> {
    check_base64_size(data, max_image_size)?;
    let payload = base64_payload(data)?;
    let bytes = STANDARD
        .decode(payload)
        .map_err(|e| OcrGateError::InvalidBase64(e.to_string()))?;
    Ok(RawImage::new(bytes, mime))
}

/// Fetches remote images and decodes inline payloads, enforcing the image
/// size limit on both paths.
#[derive(Clone, Debug)]
pub struct ImageFetcher {
    client: Client,
    timeout_secs: u64,
    max_image_size: usize,
}

impl ImageFetcher {
    pub fn new(config: &FetchConfig, max_image_size: usize) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| OcrGateError::Internal(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            timeout_secs: config.timeout_secs,
            max_image_size,
        })
    }

    pub fn max_image_size(&self) -> usize {
        self.max_image_size
    }

    pub async fn acquire(&self, input: &ImageInput) -> Result<RawImage> {
        let started = Instant::now();
        let raw = match input {
            ImageInput::Base64 { data, mime } => {
                decode_base64(data, mime.clone(), self.max_image_size)?
            }
            ImageInput::Url(url) => self.fetch(url).await?,
        };
        tracing::info!(
            kind = input.kind(),
            bytes = raw.len(),
            content_type = raw.content_type.as_deref().unwrap_or("unknown"),
            "Image acquired in {:.2}s",
            started.elapsed().as_secs_f64()
        );
        Ok(raw)
    }

    pub async fn fetch(&self, url_str: &str) -> Result<RawImage> {
        let url = Url::parse(url_str)?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(OcrGateError::Validation(format!(
                "Unsupported image URL scheme '{}': expected http or https",
                url.scheme()
            )));
        }

        tracing::debug!(url = %url, "Downloading image");
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| self.fetch_error(&url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(OcrGateError::Fetch(format!("{url} returned HTTP {status}")));
        }

        if let Some(length) = response.content_length() {
            ensure_within_limit(length as usize, self.max_image_size)?;
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.split(';').next().unwrap_or(v).trim().to_string())
            .filter(|v| v.starts_with("image/"));

        let mut bytes = Vec::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| self.fetch_error(&url, e))?;
            ensure_within_limit(bytes.len() + chunk.len(), self.max_image_size)?;
            bytes.extend_from_slice(&chunk);
        }

        Ok(RawImage::new(bytes, content_type))
    }

    fn fetch_error(&self, url: &Url, error: reqwest::Error) -> OcrGateError {
        if error.is_timeout() {
            OcrGateError::Fetch(format!(
                "{url} timed out after {} seconds",
                self.timeout_secs
            ))
        } else {
            OcrGateError::Fetch(format!("{url}: {error}"))
        }
    }
}

/// Read an image from a path relative to `root`. The path may not leave the root.
pub async fn read_local(root: &Path, relative: &str, max_image_size: usize) -> Result<RawImage> {
    let requested = Path::new(relative);
    let escapes = requested.components().any(|c| {
        matches!(
            c,
            Component::ParentDir | Component::RootDir | Component::Prefix(_)
        )
    });
    if escapes {
        return Err(OcrGateError::Validation(format!(
            "img_path must be relative to the image root: {relative}"
        )));
    }

    let path = root.join(requested);
    let metadata = match tokio::fs::metadata(&path).await {
        Ok(m) if m.is_file() => m,
        Ok(_) => return Err(OcrGateError::NotFound("Image file not found".to_string())),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(OcrGateError::NotFound("Image file not found".to_string()))
        }
        Err(e) => return Err(e.into()),
    };
    ensure_within_limit(metadata.len() as usize, max_image_size)?;

    let bytes = tokio::fs::read(&path).await?;
    Ok(RawImage::new(bytes, None))
}
