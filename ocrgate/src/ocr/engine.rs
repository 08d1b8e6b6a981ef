use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::slicing::SliceConfig;
use crate::error::{OcrGateError, Result};
use crate::ingest::DecodedImage;

/// Recognition languages. The set is fixed; one engine per language is built
/// at startup and requests are routed to it.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    utoipa::ToSchema,
)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Ch,
    En,
    Fr,
    German,
    Korean,
    Japan,
}

impl Language {
    pub const ALL: [Language; 6] = [
        Language::Ch,
        Language::En,
        Language::Fr,
        Language::German,
        Language::Korean,
        Language::Japan,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Language::Ch => "ch",
            Language::En => "en",
            Language::Fr => "fr",
            Language::German => "german",
            Language::Korean => "korean",
            Language::Japan => "japan",
        }
    }

    /// Tesseract traineddata name for this language.
    pub fn tesseract_code(&self) -> &'static str {
        match self {
            Language::Ch => "chi_sim",
            Language::En => "eng",
            Language::Fr => "fra",
            Language::German => "deu",
            Language::Korean => "kor",
            Language::Japan => "jpn",
        }
    }

    /// Separator used when joining text fragments of one line.
    pub fn word_separator(&self) -> &'static str {
        match self {
            Language::Ch | Language::Japan => "",
            _ => " ",
        }
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Language {
    type Err = OcrGateError;

    fn from_str(s: &str) -> Result<Self> {
        let lower = s.trim().to_lowercase();
        Language::ALL
            .into_iter()
            .find(|lang| lang.as_str() == lower)
            .ok_or_else(|| {
                OcrGateError::Validation(format!(
                    "Unsupported language '{s}'. Supported: {}",
                    Language::ALL.map(|l| l.as_str()).join(", ")
                ))
            })
    }
}

/// Per-request engine options.
#[derive(Debug, Clone, PartialEq)]
pub struct RecognizeOptions {
    pub language: Language,
    pub classify_orientation: bool,
    pub slice: Option<SliceConfig>,
}

/// One recognised text region.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    /// Corner points, clockwise from top-left.
    pub polygon: Vec<[f64; 2]>,
    pub text: String,
    pub confidence: f64,
}

impl Detection {
    pub fn from_rect(
        left: f64,
        top: f64,
        right: f64,
        bottom: f64,
        text: String,
        confidence: f64,
    ) -> Self {
        Self {
            polygon: vec![[left, top], [right, top], [right, bottom], [left, bottom]],
            text,
            confidence,
        }
    }

    /// Axis-aligned bounds as `(left, top, right, bottom)`.
    pub fn bounds(&self) -> (f64, f64, f64, f64) {
        self.polygon.iter().fold(
            (f64::MAX, f64::MAX, f64::MIN, f64::MIN),
            |(l, t, r, b), [x, y]| (l.min(*x), t.min(*y), r.max(*x), b.max(*y)),
        )
    }

    pub fn translate(&mut self, dx: f64, dy: f64) {
        for point in &mut self.polygon {
            point[0] += dx;
            point[1] += dy;
        }
    }
}

pub type Page = Vec<Detection>;

/// Engine output: pages in order, each holding detections in engine order.
pub type OcrResult = Vec<Page>;

/// The text recognition engine the service delegates to.
///
/// Implementations must be safe to share across concurrent requests; engines
/// that are not re-entrant serialise access internally.
#[async_trait]
pub trait OcrEngine: Send + Sync {
    fn name(&self) -> &str;

    async fn recognize(
        &self,
        image: &DecodedImage,
        options: &RecognizeOptions,
    ) -> Result<OcrResult>;
}
