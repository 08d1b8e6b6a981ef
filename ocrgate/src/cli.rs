//! Command-line front ends: an interactive recognition loop and a client
//! that submits an image URL to a running server.

use std::time::Duration;

use anyhow::{bail, Context};
use base64::{engine::general_purpose::STANDARD, Engine};
use serde_json::json;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio_util::sync::CancellationToken;

use crate::api::auth::SECRET_HEADER;
use crate::api::response::OcrResponse;
use crate::ingest::classify;
use crate::ocr::Language;
use crate::services::{format_seconds, ImageSource, RecognitionRequest, RecognitionService};

const PROMPT: &str = "Image URL or base64 (Ctrl+C to exit): ";

/// Read one image per line from stdin and print what was recognised.
///
/// Blank lines and failed requests are reported and the loop continues; EOF
/// or cancellation of `cancel_token` ends it.
pub async fn run_repl(
    service: RecognitionService,
    language: Language,
    cancel_token: CancellationToken,
) -> anyhow::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    loop {
        stdout.write_all(PROMPT.as_bytes()).await?;
        stdout.flush().await?;

        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = cancel_token.cancelled() => None,
        };
        let Some(line) = line else {
            println!();
            return Ok(());
        };

        let input = line.trim();
        if input.is_empty() {
            tracing::warn!("Empty input, enter an image URL or base64 string");
            continue;
        }

        let request = RecognitionRequest {
            source: ImageSource::Input(classify(input)),
            language,
            classify_orientation: true,
            slice: None,
        };

        match service.recognize(request).await {
            Ok(outcome) => {
                let process_time = outcome.process_time;
                let response = OcrResponse::from_outcome(outcome, uuid::Uuid::new_v4().to_string());
                println!("{}", serde_json::to_string_pretty(&response)?);
                println!("\nRecognised text:");
                for text in &response.text_results {
                    println!("{text}");
                }
                println!("\nDone in {}", format_seconds(process_time));
            }
            Err(e) => eprintln!("Error: {e}"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SubmitOptions {
    pub image_url: String,
    pub server: String,
    pub secret: Option<String>,
    pub lang: Option<String>,
    pub timeout: Duration,
}

/// Download `image_url`, send it base64-encoded to `{server}/ocr` and return
/// the server's JSON reply.
pub async fn submit(options: &SubmitOptions) -> anyhow::Result<serde_json::Value> {
    let client = reqwest::Client::builder()
        .timeout(options.timeout)
        .build()
        .context("Failed to create HTTP client")?;

    let image = client
        .get(&options.image_url)
        .send()
        .await
        .with_context(|| format!("Failed to download {}", options.image_url))?;
    if !image.status().is_success() {
        bail!("Downloading {} returned {}", options.image_url, image.status());
    }
    let bytes = image.bytes().await.context("Failed to read image body")?;
    tracing::info!(bytes = bytes.len(), "Downloaded image");

    let mut body = json!({ "image": STANDARD.encode(&bytes) });
    if let Some(lang) = &options.lang {
        body["lang"] = json!(lang);
    }

    let mut request = client
        .post(format!("{}/ocr", options.server.trim_end_matches('/')))
        .json(&body);
    if let Some(secret) = &options.secret {
        request = request.header(SECRET_HEADER, secret);
    }

    let response = request
        .send()
        .await
        .with_context(|| format!("Failed to reach {}", options.server))?;
    let status = response.status();
    let json: serde_json::Value = response
        .json()
        .await
        .with_context(|| format!("Server replied {status} with a non-JSON body"))?;
    if !status.is_success() {
        tracing::warn!(status = status.as_u16(), "Server rejected the request");
    }
    Ok(json)
}
