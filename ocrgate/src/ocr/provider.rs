use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use super::engine::{Language, OcrEngine, OcrResult, RecognizeOptions};
use super::remote::RemoteEngine;
use super::tesseract::TesseractEngine;
use crate::config::{parse_backend_model, OcrConfig};
use crate::error::{OcrGateError, Result};
use crate::ingest::DecodedImage;

/// Per-language engine registry, built once at startup and shared by all
/// requests. Every call is bounded by the configured inference timeout.
#[derive(Clone)]
pub struct OcrProvider {
    engines: Arc<BTreeMap<Language, Arc<dyn OcrEngine>>>,
    default_language: Language,
    timeout: Duration,
}

fn build_engine(config: &OcrConfig, language: Language) -> Result<Arc<dyn OcrEngine>> {
    let (backend, _) = parse_backend_model(&config.model);
    match backend.to_lowercase().as_str() {
        "remote" => Ok(Arc::new(RemoteEngine::new(config, language)?)),
        _ => Ok(Arc::new(TesseractEngine::new(
            config.tessdata_path.as_deref(),
            language,
        )?)),
    }
}

impl OcrProvider {
    pub fn new(config: &OcrConfig) -> Result<Self> {
        let default_language = config.default_language.parse::<Language>().unwrap_or_else(|e| {
            warn!("{}; falling back to '{}'", e, Language::Ch);
            Language::Ch
        });

        let mut engines: BTreeMap<Language, Arc<dyn OcrEngine>> = BTreeMap::new();
        for code in &config.languages {
            let language: Language = match code.parse() {
                Ok(language) => language,
                Err(e) => {
                    warn!("Skipping OCR language: {}", e);
                    continue;
                }
            };
            match build_engine(config, language) {
                Ok(engine) => {
                    info!(language = %language, engine = engine.name(), "OCR engine initialized");
                    engines.insert(language, engine);
                }
                Err(e) => warn!(language = %language, "OCR engine unavailable: {}", e),
            }
        }

        if !engines.is_empty() && !engines.contains_key(&default_language) {
            warn!(
                "Default OCR language '{}' has no engine; requests must pass `lang`",
                default_language
            );
        }

        Ok(Self {
            engines: Arc::new(engines),
            default_language,
            timeout: Duration::from_secs(config.timeout_secs),
        })
    }

    /// Build a provider around already-constructed engines.
    pub fn from_engines<I>(engines: I, default_language: Language, timeout: Duration) -> Self
    where
        I: IntoIterator<Item = (Language, Arc<dyn OcrEngine>)>,
    {
        Self {
            engines: Arc::new(engines.into_iter().collect()),
            default_language,
            timeout,
        }
    }

    pub fn is_available(&self) -> bool {
        !self.engines.is_empty()
    }

    pub fn languages(&self) -> Vec<Language> {
        self.engines.keys().copied().collect()
    }

    pub fn default_language(&self) -> Language {
        self.default_language
    }

    /// Fail fast when `language` cannot be served, before any image work.
    pub fn check_language(&self, language: Language) -> Result<()> {
        self.engine(language).map(|_| ())
    }

    fn engine(&self, language: Language) -> Result<&Arc<dyn OcrEngine>> {
        if self.engines.is_empty() {
            return Err(OcrGateError::EngineUnavailable(
                "no OCR engine could be initialized".to_string(),
            ));
        }
        self.engines.get(&language).ok_or_else(|| {
            let loaded: Vec<&str> = self.engines.keys().map(|l| l.as_str()).collect();
            OcrGateError::Validation(format!(
                "Language '{language}' is not enabled on this server. Enabled: {}",
                loaded.join(", ")
            ))
        })
    }

    pub async fn recognize(
        &self,
        image: &DecodedImage,
        options: &RecognizeOptions,
    ) -> Result<OcrResult> {
        let engine = self.engine(options.language)?;

        match tokio::time::timeout(self.timeout, engine.recognize(image, options)).await {
            Ok(result) => result,
            Err(_) => Err(OcrGateError::Engine(format!(
                "OCR operation timed out after {} seconds",
                self.timeout.as_secs()
            ))),
        }
    }
}
