//! OCR Module
//!
//! Text recognition is delegated to an [`OcrEngine`], treated as a black box
//! that turns a decoded image into positioned text detections.
//!
//! # Architecture
//!
//! - `OcrEngine` trait defines the interface
//! - `TesseractEngine` implements local OCR via leptess, slicing large images itself
//! - `RemoteEngine` forwards to an inference sidecar over HTTP
//! - `OcrProvider` holds one engine per configured language and bounds each call
//!   with a timeout
//!
//! # Configuration
//!
//! Controlled via `OcrConfig` (see `config.rs`):
//! - `model`: backend selection (`local/tesseract`, `remote/<name>`)
//! - `base_url` / `api_key`: remote engine endpoint and credentials
//! - `languages`: engines to build at startup
//! - `timeout_secs`: inference timeout

mod engine;
mod format;
mod provider;
mod remote;
pub mod slicing;
mod tesseract;

pub use engine::{Detection, Language, OcrEngine, OcrResult, Page, RecognizeOptions};
pub use format::{format, sanitize_confidence, FormattedResult, TextLine};
pub use provider::OcrProvider;
pub use remote::RemoteEngine;
pub use slicing::SliceConfig;
pub use tesseract::{parse_tsv, TesseractEngine};
