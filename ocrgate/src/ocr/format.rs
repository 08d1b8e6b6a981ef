use serde::{Deserialize, Serialize};

use super::engine::{Detection, OcrResult};

/// A detection in its wire shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct TextLine {
    /// Quadrilateral corners as `[x, y]` pairs, clockwise from top-left.
    #[schema(value_type = Vec<Vec<f64>>)]
    pub position: Vec<[f64; 2]>,
    pub text: String,
    /// Recognition confidence in `[0, 1]`.
    pub confidence: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FormattedResult {
    pub pages: Vec<Vec<TextLine>>,
    pub text_results: Vec<String>,
}

/// Clamp into `[0, 1]`; NaN becomes 0 so the response always serialises.
pub fn sanitize_confidence(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

fn to_line(detection: Detection) -> TextLine {
    TextLine {
        position: detection.polygon,
        text: detection.text,
        confidence: sanitize_confidence(detection.confidence),
    }
}

pub fn format(raw: OcrResult) -> FormattedResult {
    let pages: Vec<Vec<TextLine>> = raw
        .into_iter()
        .map(|page| page.into_iter().map(to_line).collect())
        .collect();
    let text_results = pages
        .iter()
        .flatten()
        .map(|line| line.text.clone())
        .collect();

    FormattedResult {
        pages,
        text_results,
    }
}
