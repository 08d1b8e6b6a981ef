use std::sync::Arc;

use async_trait::async_trait;
use image::imageops::crop_imm;
use image::RgbImage;
use leptess::LepTess;
use tokio::sync::Mutex;

use super::engine::{Detection, Language, OcrEngine, OcrResult, RecognizeOptions};
use super::slicing::{merge_fragments, plan_tiles, SliceConfig, Tile};
use crate::error::{OcrGateError, Result};
use crate::ingest::{encode_png, DecodedImage};

/// Page segmentation with orientation and script detection.
const PSM_AUTO_OSD: &str = "1";
/// Fully automatic page segmentation, no orientation detection.
const PSM_AUTO: &str = "3";

const TSV_WORD_LEVEL: u32 = 5;

/// Local engine backed by a Tesseract instance for a single language.
///
/// A `LepTess` handle is not re-entrant, so calls are serialised on a mutex
/// and executed on the blocking pool.
pub struct TesseractEngine {
    language: Language,
    tesseract: Arc<Mutex<LepTess>>,
}

impl TesseractEngine {
    pub fn new(tessdata_path: Option<&str>, language: Language) -> Result<Self> {
        let lt = LepTess::new(tessdata_path, language.tesseract_code()).map_err(|e| {
            OcrGateError::EngineUnavailable(format!(
                "Tesseract '{}' model not available: {e}",
                language.tesseract_code()
            ))
        })?;

        Ok(Self {
            language,
            tesseract: Arc::new(Mutex::new(lt)),
        })
    }

    pub fn language(&self) -> Language {
        self.language
    }
}

#[async_trait]
impl OcrEngine for TesseractEngine {
    fn name(&self) -> &str {
        "tesseract"
    }

    async fn recognize(
        &self,
        image: &DecodedImage,
        options: &RecognizeOptions,
    ) -> Result<OcrResult> {
        let psm = if options.classify_orientation {
            PSM_AUTO_OSD
        } else {
            PSM_AUTO
        };
        let separator = options.language.word_separator();
        let tesseract = Arc::clone(&self.tesseract);
        let pixels = Arc::clone(&image.pixels);
        let slice = options.slice;

        let detections = tokio::task::spawn_blocking(move || {
            let jobs = encode_tiles(&pixels, slice.as_ref())?;
            let mut lt = tesseract.blocking_lock();
            lt.set_variable(leptess::Variable::TesseditPagesegMode, psm)
                .map_err(|e| OcrGateError::Engine(format!("Failed to set PSM mode: {e}")))?;

            let mut detections = Vec::new();
            for (tile, png) in jobs {
                lt.set_image_from_mem(&png)
                    .map_err(|e| OcrGateError::Engine(format!("Failed to set image: {e}")))?;
                let tsv = lt
                    .get_tsv_text(0)
                    .map_err(|e| OcrGateError::Engine(format!("Failed to extract text: {e}")))?;
                detections.extend(parse_tsv(&tsv, separator).into_iter().map(|mut d| {
                    d.translate(f64::from(tile.x), f64::from(tile.y));
                    d
                }));
            }
            Ok::<_, OcrGateError>(detections)
        })
        .await
        .map_err(|e| OcrGateError::Engine(format!("OCR task panicked: {e}")))??;

        let page = match &options.slice {
            Some(slice) => merge_fragments(detections, slice, separator),
            None => detections,
        };
        Ok(vec![page])
    }
}

/// Crop and PNG-encode every tile, or the whole image when unsliced.
fn encode_tiles(pixels: &RgbImage, slice: Option<&SliceConfig>) -> Result<Vec<(Tile, Vec<u8>)>> {
    let (width, height) = pixels.dimensions();
    match slice {
        Some(slice) => plan_tiles(width, height, slice)?
            .into_iter()
            .map(|tile| {
                let view = crop_imm(pixels, tile.x, tile.y, tile.width, tile.height).to_image();
                Ok((tile, encode_png(&view)?))
            })
            .collect(),
        None => {
            let whole = Tile {
                x: 0,
                y: 0,
                width,
                height,
            };
            Ok(vec![(whole, encode_png(pixels)?)])
        }
    }
}

struct LineAccumulator {
    key: (u32, u32, u32, u32),
    left: f64,
    top: f64,
    right: f64,
    bottom: f64,
    words: Vec<String>,
    confidences: Vec<f64>,
}

/// Collapse Tesseract TSV output into one detection per text line.
///
/// Word rows (level 5) carry the text and a 0..100 confidence; they are
/// grouped by their page/block/paragraph/line numbers.
pub fn parse_tsv(tsv: &str, separator: &str) -> Vec<Detection> {
    let mut lines: Vec<LineAccumulator> = Vec::new();

    for row in tsv.lines() {
        let cols: Vec<&str> = row.split('\t').collect();
        if cols.len() < 12 {
            continue;
        }
        let Ok(level) = cols[0].parse::<u32>() else {
            continue;
        };
        if level != TSV_WORD_LEVEL {
            continue;
        }
        let text = cols[11].trim();
        let conf = cols[10].parse::<f64>().unwrap_or(-1.0);
        if text.is_empty() || conf < 0.0 {
            continue;
        }
        let nums: Vec<u32> = cols[1..5].iter().filter_map(|c| c.parse().ok()).collect();
        let geom: Vec<f64> = cols[6..10].iter().filter_map(|c| c.parse().ok()).collect();
        if nums.len() != 4 || geom.len() != 4 {
            continue;
        }
        let key = (nums[0], nums[1], nums[2], nums[3]);
        let (left, top, right, bottom) = (geom[0], geom[1], geom[0] + geom[2], geom[1] + geom[3]);

        match lines.iter_mut().find(|l| l.key == key) {
            Some(line) => {
                line.left = line.left.min(left);
                line.top = line.top.min(top);
                line.right = line.right.max(right);
                line.bottom = line.bottom.max(bottom);
                line.words.push(text.to_string());
                line.confidences.push(conf);
            }
            None => lines.push(LineAccumulator {
                key,
                left,
                top,
                right,
                bottom,
                words: vec![text.to_string()],
                confidences: vec![conf],
            }),
        }
    }

    lines
        .into_iter()
        .map(|line| {
            let mean = line.confidences.iter().sum::<f64>() / line.confidences.len() as f64;
            Detection::from_rect(
                line.left,
                line.top,
                line.right,
                line.bottom,
                line.words.join(separator),
                (mean / 100.0).clamp(0.0, 1.0),
            )
        })
        .collect()
}
