use serde::Deserialize;
use validator::Validate;

use crate::error::{OcrGateError, Result};
use crate::ingest::classify;
use crate::ocr::{Language, SliceConfig};
use crate::services::{ImageSource, RecognitionRequest};

fn default_cls() -> bool {
    true
}

/// Body of `POST /ocr`. Exactly one of `image` and `img_path` must be set.
#[derive(Debug, Clone, Deserialize, Validate, utoipa::ToSchema)]
pub struct OcrRequest {
    /// An `http(s)` URL, a raw base64 string, or a `data:image/...;base64,` URI.
    #[serde(default)]
    pub image: Option<String>,
    /// Path relative to the server's `IMAGE_ROOT`.
    #[serde(default)]
    pub img_path: Option<String>,
    /// Recognition language code; the server default when omitted.
    #[serde(default)]
    #[schema(example = "ch")]
    pub lang: Option<String>,
    /// Detect text orientation before recognition.
    #[serde(default = "default_cls")]
    pub cls: bool,
    /// Explicit tiling parameters. Computed automatically for large images.
    #[serde(default)]
    #[validate(nested)]
    pub slice: Option<SliceConfig>,
    /// Shared secret, when not sent in the `X-Secret` header.
    #[serde(default)]
    pub secret: Option<String>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

impl OcrRequest {
    pub fn into_recognition(self, default_language: Language) -> Result<RecognitionRequest> {
        let source = match (non_empty(self.image), non_empty(self.img_path)) {
            (Some(image), None) => ImageSource::Input(classify(image.trim())),
            (None, Some(path)) => ImageSource::LocalPath(path),
            (None, None) => {
                return Err(OcrGateError::Validation(
                    "Missing required field: image".to_string(),
                ))
            }
            (Some(_), Some(_)) => {
                return Err(OcrGateError::Validation(
                    "Provide either `image` or `img_path`, not both".to_string(),
                ))
            }
        };

        let language = match non_empty(self.lang) {
            Some(code) => code.parse::<Language>()?,
            None => default_language,
        };

        Ok(RecognitionRequest {
            source,
            language,
            classify_orientation: self.cls,
            slice: self.slice,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::ImageInput;

    fn parse(body: &str) -> OcrRequest {
        serde_json::from_str(body).unwrap()
    }

    #[test]
    fn test_defaults() {
        let request = parse(r#"{"image": "https://example.com/a.png"}"#)
            .into_recognition(Language::Ch)
            .unwrap();
        assert_eq!(request.language, Language::Ch);
        assert!(request.classify_orientation);
        assert_eq!(request.slice, None);
        assert_eq!(
            request.source,
            ImageSource::Input(ImageInput::Url("https://example.com/a.png".to_string()))
        );
    }

    #[test]
    fn test_lang_and_slice_aliases() {
        let req = parse(
            r#"{"image": "https://example.com/a.png", "lang": "EN", "cls": false,
                "slice": {"horizontal_stride": 500, "vertical_stride": 400, "merge_x_thres": 20, "merge_y_thres": 10}}"#,
        );
        assert!(req.validate().is_ok());
        let request = req.into_recognition(Language::Ch).unwrap();
        assert_eq!(request.language, Language::En);
        assert!(!request.classify_orientation);
        let slice = request.slice.unwrap();
        assert_eq!(slice.merge_x_threshold, 20);
        assert_eq!(slice.merge_y_threshold, 10);
    }

    #[test]
    fn test_zero_stride_fails_validation() {
        let req = parse(
            r#"{"image": "x", "slice": {"horizontal_stride": 0, "vertical_stride": 400, "merge_x_threshold": 1, "merge_y_threshold": 1}}"#,
        );
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_missing_or_blank_image() {
        for body in [r#"{}"#, r#"{"image": ""}"#, r#"{"image": "   "}"#] {
            let err = parse(body).into_recognition(Language::Ch).unwrap_err();
            assert_eq!(err.to_string(), "Missing required field: image", "{body}");
        }
    }

    #[test]
    fn test_image_and_img_path_are_exclusive() {
        let err = parse(r#"{"image": "https://e.com/a.png", "img_path": "a.png"}"#)
            .into_recognition(Language::Ch)
            .unwrap_err();
        assert!(matches!(err, OcrGateError::Validation(_)));
    }

    #[test]
    fn test_unknown_language() {
        let err = parse(r#"{"image": "https://e.com/a.png", "lang": "latin"}"#)
            .into_recognition(Language::Ch)
            .unwrap_err();
        assert!(matches!(err, OcrGateError::Validation(_)));
    }
}
