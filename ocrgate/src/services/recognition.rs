use std::path::PathBuf;
use std::time::{Duration, Instant};

use tracing::info;

use crate::config::Config;
use crate::error::{OcrGateError, Result};
use crate::ingest::{self, ImageFetcher, ImageInput, RawImage};
use crate::ocr::slicing::resolve_slice_config;
use crate::ocr::{self, FormattedResult, Language, OcrProvider, RecognizeOptions, SliceConfig};

/// Where a request's image comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageSource {
    Input(ImageInput),
    /// A path relative to the configured image root.
    LocalPath(String),
}

impl ImageSource {
    pub fn kind(&self) -> &'static str {
        match self {
            ImageSource::Input(input) => input.kind(),
            ImageSource::LocalPath(_) => "path",
        }
    }
}

#[derive(Debug, Clone)]
pub struct RecognitionRequest {
    pub source: ImageSource,
    pub language: Language,
    pub classify_orientation: bool,
    pub slice: Option<SliceConfig>,
}

#[derive(Debug, Clone)]
pub struct RecognitionOutcome {
    pub result: FormattedResult,
    pub width: u32,
    pub height: u32,
    pub sliced: bool,
    /// Wall time from acquisition to formatting.
    pub process_time: Duration,
    /// Wall time spent inside the OCR engine.
    pub ocr_time: Duration,
}

const IMG_PATH_DISABLED: &str = "img_path is disabled: IMAGE_ROOT is not set";

/// Format a duration the way responses report it, e.g. `"1.23s"`.
pub fn format_seconds(duration: Duration) -> String {
    format!("{:.2}s", duration.as_secs_f64())
}

/// The acquire, decode, slice, recognise, format pipeline shared by the HTTP
/// handler and the REPL.
#[derive(Clone)]
pub struct RecognitionService {
    fetcher: ImageFetcher,
    ocr: OcrProvider,
    image_root: Option<PathBuf>,
}

impl RecognitionService {
    pub fn new(fetcher: ImageFetcher, ocr: OcrProvider, image_root: Option<PathBuf>) -> Self {
        Self {
            fetcher,
            ocr,
            image_root,
        }
    }

    pub fn from_config(config: &Config, ocr: OcrProvider) -> Result<Self> {
        let fetcher = ImageFetcher::new(&config.fetch, config.limits.max_image_size)?;
        Ok(Self::new(fetcher, ocr, config.server.image_root.clone()))
    }

    pub fn ocr(&self) -> &OcrProvider {
        &self.ocr
    }

    pub fn max_image_size(&self) -> usize {
        self.fetcher.max_image_size()
    }

    /// Checks that need no I/O: an engine for the language, the size of an
    /// inline payload, and whether the file-path variant is enabled.
    pub fn precheck(&self, request: &RecognitionRequest) -> Result<()> {
        self.ocr.check_language(request.language)?;
        match &request.source {
            ImageSource::Input(ImageInput::Base64 { data, .. }) => {
                ingest::check_base64_size(data, self.max_image_size())
            }
            ImageSource::Input(ImageInput::Url(_)) => Ok(()),
            ImageSource::LocalPath(_) if self.image_root.is_none() => {
                Err(OcrGateError::Validation(IMG_PATH_DISABLED.to_string()))
            }
            ImageSource::LocalPath(_) => Ok(()),
        }
    }

    async fn acquire(&self, source: &ImageSource) -> Result<RawImage> {
        match source {
            ImageSource::Input(input) => self.fetcher.acquire(input).await,
            ImageSource::LocalPath(path) => {
                let root = self
                    .image_root
                    .as_deref()
                    .ok_or_else(|| OcrGateError::Validation(IMG_PATH_DISABLED.to_string()))?;
                ingest::read_local(root, path, self.max_image_size()).await
            }
        }
    }

    pub async fn recognize(&self, request: RecognitionRequest) -> Result<RecognitionOutcome> {
        let started = Instant::now();
        self.precheck(&request)?;

        let raw = self.acquire(&request.source).await?;

        let decode_started = Instant::now();
        let image = tokio::task::spawn_blocking(move || ingest::decode(&raw))
            .await
            .map_err(|e| OcrGateError::Internal(format!("Decode task failed: {e}")))??;
        info!(
            width = image.width,
            height = image.height,
            "Image decoded in {:.2}s",
            decode_started.elapsed().as_secs_f64()
        );

        let slice = resolve_slice_config(request.slice, image.width, image.height)?;
        if let Some(slice) = &slice {
            info!(
                horizontal_stride = slice.horizontal_stride,
                vertical_stride = slice.vertical_stride,
                "Slicing {}x{} image",
                image.width,
                image.height
            );
        }

        let options = RecognizeOptions {
            language: request.language,
            classify_orientation: request.classify_orientation,
            slice,
        };

        let ocr_started = Instant::now();
        let raw_result = self.ocr.recognize(&image, &options).await?;
        let ocr_time = ocr_started.elapsed();
        info!(
            language = %request.language,
            "OCR finished in {}",
            format_seconds(ocr_time)
        );

        let result = ocr::format(raw_result);
        let process_time = started.elapsed();
        info!(
            lines = result.text_results.len(),
            "Request processed in {}",
            format_seconds(process_time)
        );

        Ok(RecognitionOutcome {
            result,
            width: image.width,
            height: image.height,
            sliced: slice.is_some(),
            process_time,
            ocr_time,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FetchConfig;
    use crate::ingest::DecodedImage;
    use crate::ocr::{Detection, OcrEngine, OcrResult};
    use async_trait::async_trait;
    use base64::{engine::general_purpose::STANDARD, Engine};
    use image::{Rgb, RgbImage};
    use std::sync::{Arc, Mutex};

    /// Records the options it was called with and reports the image size as text.
    #[derive(Default)]
    struct RecordingEngine {
        calls: Mutex<Vec<RecognizeOptions>>,
    }

    #[async_trait]
    impl OcrEngine for RecordingEngine {
        fn name(&self) -> &str {
            "recording"
        }

        async fn recognize(
            &self,
            image: &DecodedImage,
            options: &RecognizeOptions,
        ) -> Result<OcrResult> {
            self.calls.lock().unwrap().push(options.clone());
            Ok(vec![vec![Detection::from_rect(
                0.0,
                0.0,
                1.0,
                1.0,
                format!("{}x{}", image.width, image.height),
                0.5,
            )]])
        }
    }

    fn service(engine: Arc<RecordingEngine>, image_root: Option<PathBuf>) -> RecognitionService {
        let engine: Arc<dyn OcrEngine> = engine;
        let timeout = Duration::from_secs(5);
        let ocr = OcrProvider::from_engines([(Language::Ch, engine)], Language::Ch, timeout);
        let fetcher = ImageFetcher::new(&FetchConfig::default(), 1024 * 1024).unwrap();
        RecognitionService::new(fetcher, ocr, image_root)
    }

    fn png_base64(width: u32, height: u32) -> String {
        let pixels = RgbImage::from_pixel(width, height, Rgb([255, 255, 255]));
        let image = DecodedImage::from_rgb(pixels);
        STANDARD.encode(image.to_png().unwrap())
    }

    fn request(source: ImageSource) -> RecognitionRequest {
        RecognitionRequest {
            source,
            language: Language::Ch,
            classify_orientation: true,
            slice: None,
        }
    }

    #[test]
    fn test_format_seconds() {
        assert_eq!(format_seconds(Duration::from_millis(1234)), "1.23s");
        assert_eq!(format_seconds(Duration::ZERO), "0.00s");
    }

    #[tokio::test]
    async fn test_small_image_is_not_sliced() {
        let engine = Arc::new(RecordingEngine::default());
        let service = service(engine.clone(), None);

        let outcome = service
            .recognize(request(ImageSource::Input(ingest::classify(&png_base64(40, 30)))))
            .await
            .unwrap();

        assert_eq!(outcome.result.text_results, vec!["40x30"]);
        assert!(!outcome.sliced);
        assert_eq!(engine.calls.lock().unwrap()[0].slice, None);
    }

    #[tokio::test]
    async fn test_large_image_gets_heuristic_slice() {
        let engine = Arc::new(RecordingEngine::default());
        let service = service(engine.clone(), None);

        let outcome = service
            .recognize(request(ImageSource::Input(ingest::classify(&png_base64(2001, 10)))))
            .await
            .unwrap();

        assert!(outcome.sliced);
        let slice = engine.calls.lock().unwrap()[0].slice.unwrap();
        assert_eq!(slice.horizontal_stride, 667);
        assert_eq!(slice.vertical_stride, 300);
    }

    #[tokio::test]
    async fn test_local_path_requires_image_root() {
        let service = service(Arc::new(RecordingEngine::default()), None);
        let err = service
            .recognize(request(ImageSource::LocalPath("a.png".to_string())))
            .await
            .unwrap_err();
        assert!(matches!(err, OcrGateError::Validation(_)));
    }

    #[tokio::test]
    async fn test_local_path_reads_from_root() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("page.png"),
            STANDARD.decode(png_base64(12, 8)).unwrap(),
        )
        .unwrap();
        let service = service(Arc::new(RecordingEngine::default()), Some(dir.path().to_path_buf()));

        let outcome = service
            .recognize(request(ImageSource::LocalPath("page.png".to_string())))
            .await
            .unwrap();
        assert_eq!(outcome.result.text_results, vec!["12x8"]);
    }

    #[tokio::test]
    async fn test_undecodable_bytes_are_decode_error() {
        let service = service(Arc::new(RecordingEngine::default()), None);
        let err = service
            .recognize(request(ImageSource::Input(ingest::classify(
                &STANDARD.encode(b"definitely not an image"),
            ))))
            .await
            .unwrap_err();
        assert!(matches!(err, OcrGateError::Decode(_)));
    }
}
