//! Wire format of `/ocr` responses.
//!
//! Success and failure share the `success` flag so clients can branch on a
//! single field:
//!
//! ```json
//! { "success": true, "result": [[{ "position": [[0,0],[9,0],[9,5],[0,5]], "text": "hi", "confidence": 0.97 }]],
//!   "text_results": ["hi"], "process_time": "0.41s", "ocr_time": "0.33s", "request_id": "..." }
//! { "success": false, "error": "Missing required field: image" }
//! { "success": false, "error": "OCR engine error: ...", "error_type": "EngineError" }
//! ```
//!
//! `error_type` is only reported for server-side (5xx) failures.

use serde::{Deserialize, Serialize};

use crate::ocr::TextLine;
use crate::services::{format_seconds, RecognitionOutcome};

#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct OcrResponse {
    pub success: bool,
    /// Detections per page, in engine order.
    pub result: Vec<Vec<TextLine>>,
    /// Every detection's text, page by page.
    pub text_results: Vec<String>,
    /// Total processing time, e.g. `"1.23s"`.
    pub process_time: String,
    /// Time spent in the OCR engine, e.g. `"0.98s"`.
    pub ocr_time: String,
    pub request_id: String,
}

impl OcrResponse {
    pub fn from_outcome(outcome: RecognitionOutcome, request_id: String) -> Self {
        Self {
            success: true,
            result: outcome.result.pages,
            text_results: outcome.result.text_results,
            process_time: format_seconds(outcome.process_time),
            ocr_time: format_seconds(outcome.ocr_time),
            request_id,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_type: Option<String>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: error.into(),
            error_type: None,
        }
    }

    pub fn with_type(mut self, error_type: &str) -> Self {
        self.error_type = Some(error_type.to_string());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ocr::{Detection, FormattedResult};
    use std::time::Duration;

    #[test]
    fn test_success_shape() {
        let outcome = RecognitionOutcome {
            result: crate::ocr::format(vec![vec![Detection::from_rect(
                0.0,
                0.0,
                9.0,
                5.0,
                "hi".into(),
                0.97,
            )]]),
            width: 10,
            height: 6,
            sliced: false,
            process_time: Duration::from_millis(410),
            ocr_time: Duration::from_millis(333),
        };
        let json = serde_json::to_value(OcrResponse::from_outcome(outcome, "abc".into())).unwrap();

        assert_eq!(json["success"], true);
        assert_eq!(json["result"][0][0]["position"][2][0], 9.0);
        assert_eq!(json["text_results"][0], "hi");
        assert_eq!(json["process_time"], "0.41s");
        assert_eq!(json["ocr_time"], "0.33s");
        assert_eq!(json["request_id"], "abc");
    }

    #[test]
    fn test_empty_result_is_empty_arrays() {
        let outcome = RecognitionOutcome {
            result: FormattedResult {
                pages: vec![vec![]],
                text_results: vec![],
            },
            width: 1,
            height: 1,
            sliced: false,
            process_time: Duration::ZERO,
            ocr_time: Duration::ZERO,
        };
        let json = serde_json::to_value(OcrResponse::from_outcome(outcome, "id".into())).unwrap();
        assert_eq!(json["result"], serde_json::json!([[]]));
        assert_eq!(json["text_results"], serde_json::json!([]));
    }

    #[test]
    fn test_error_type_omitted_unless_set() {
        let plain = serde_json::to_value(ErrorResponse::new("bad")).unwrap();
        assert!(plain.get("error_type").is_none());
        assert_eq!(plain["success"], false);

        let typed =
            serde_json::to_value(ErrorResponse::new("boom").with_type("EngineError")).unwrap();
        assert_eq!(typed["error_type"], "EngineError");
    }
}
