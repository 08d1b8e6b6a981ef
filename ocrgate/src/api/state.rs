use std::sync::Arc;

use crate::config::Config;
use crate::error::Result;
use crate::ocr::OcrProvider;
use crate::services::RecognitionService;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub recognition: RecognitionService,
}

impl AppState {
    pub fn new(config: Config, ocr: OcrProvider) -> Result<Self> {
        let recognition = RecognitionService::from_config(&config, ocr)?;
        Ok(Self {
            config: Arc::new(config),
            recognition,
        })
    }

    pub fn ocr(&self) -> &OcrProvider {
        self.recognition.ocr()
    }
}
