//! Tiling for large images.
//!
//! Images wider or taller than [`LARGE_IMAGE_THRESHOLD`] are recognised in
//! slices. The stride heuristic targets roughly three slices per axis, bounded
//! to `300..=800` px, and detections closer than the merge thresholds across a
//! slice seam are stitched back together.

use serde::{Deserialize, Serialize};
use validator::Validate;

use super::engine::Detection;
use crate::error::{OcrGateError, Result};

/// Either dimension above this many pixels triggers slicing.
pub const LARGE_IMAGE_THRESHOLD: u32 = 2000;

const MIN_STRIDE: u32 = 300;
const MAX_STRIDE: u32 = 800;

/// Pixel tolerance for merging detections split across slice seams.
pub const DEFAULT_MERGE_THRESHOLD: u32 = 12;

/// Upper bound on slices per image, protecting against tiny caller strides.
pub const MAX_SLICES: usize = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Validate, utoipa::ToSchema)]
pub struct SliceConfig {
    #[validate(range(min = 1))]
    pub horizontal_stride: u32,
    #[validate(range(min = 1))]
    pub vertical_stride: u32,
    #[serde(alias = "merge_x_thres")]
    #[validate(range(min = 1))]
    pub merge_x_threshold: u32,
    #[serde(alias = "merge_y_thres")]
    #[validate(range(min = 1))]
    pub merge_y_threshold: u32,
}

pub fn needs_slicing(width: u32, height: u32) -> bool {
    width > LARGE_IMAGE_THRESHOLD || height > LARGE_IMAGE_THRESHOLD
}

pub fn compute_slice_config(width: u32, height: u32) -> SliceConfig {
    SliceConfig {
        horizontal_stride: (width / 3).clamp(MIN_STRIDE, MAX_STRIDE),
        vertical_stride: (height / 3).clamp(MIN_STRIDE, MAX_STRIDE),
        merge_x_threshold: DEFAULT_MERGE_THRESHOLD,
        merge_y_threshold: DEFAULT_MERGE_THRESHOLD,
    }
}

/// Pick the slice configuration for an image: the caller's if given,
/// otherwise the heuristic for large images, otherwise none.
pub fn resolve_slice_config(
    requested: Option<SliceConfig>,
    width: u32,
    height: u32,
) -> Result<Option<SliceConfig>> {
    if let Some(config) = requested {
        config
            .validate()
            .map_err(|e| OcrGateError::Validation(format!("Invalid slice configuration: {e}")))?;
        return Ok(Some(config));
    }
    Ok(needs_slicing(width, height).then(|| compute_slice_config(width, height)))
}

/// A rectangular region of the source image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tile {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Row-major grid of stride-sized tiles covering the image; edge tiles are truncated.
pub fn plan_tiles(width: u32, height: u32, config: &SliceConfig) -> Result<Vec<Tile>> {
    if config.horizontal_stride == 0 || config.vertical_stride == 0 {
        return Err(OcrGateError::Validation(
            "Slice strides must be at least 1 pixel".to_string(),
        ));
    }
    let columns = width.div_ceil(config.horizontal_stride) as usize;
    let rows = height.div_ceil(config.vertical_stride) as usize;
    if columns * rows > MAX_SLICES {
        return Err(OcrGateError::Validation(format!(
            "Slice configuration yields {} slices for a {width}x{height} image (max {MAX_SLICES})",
            columns * rows
        )));
    }

    let mut tiles = Vec::with_capacity(columns * rows);
    for row in 0..rows as u32 {
        let y = row * config.vertical_stride;
        for column in 0..columns as u32 {
            let x = column * config.horizontal_stride;
            tiles.push(Tile {
                x,
                y,
                width: config.horizontal_stride.min(width - x),
                height: config.vertical_stride.min(height - y),
            });
        }
    }
    Ok(tiles)
}

/// Stitch detections that were cut apart by slice seams, then return them in
/// reading order.
///
/// A later detection is absorbed into an earlier one when their top and bottom
/// edges are within `merge_y_threshold` and the gap between the earlier box's
/// right edge and the later box's left edge is within `merge_x_threshold`.
pub fn merge_fragments(
    detections: Vec<Detection>,
    config: &SliceConfig,
    separator: &str,
) -> Vec<Detection> {
    let merge_x = f64::from(config.merge_x_threshold);
    let merge_y = f64::from(config.merge_y_threshold);
    let mut absorbed = vec![false; detections.len()];
    let mut merged = Vec::with_capacity(detections.len());

    for i in 0..detections.len() {
        if absorbed[i] {
            continue;
        }
        let (mut left, mut top, mut right, mut bottom) = detections[i].bounds();
        let mut text = detections[i].text.clone();
        let mut confidences = vec![detections[i].confidence];

        for j in (i + 1)..detections.len() {
            if absorbed[j] {
                continue;
            }
            let (l2, t2, r2, b2) = detections[j].bounds();
            if (top - t2).abs() <= merge_y
                && (bottom - b2).abs() <= merge_y
                && (right - l2).abs() <= merge_x
            {
                right = r2;
                left = left.min(l2);
                top = top.min(t2);
                bottom = bottom.max(b2);
                text.push_str(separator);
                text.push_str(&detections[j].text);
                confidences.push(detections[j].confidence);
                absorbed[j] = true;
            }
        }

        if confidences.len() == 1 {
            merged.push(detections[i].clone());
        } else {
            let confidence = confidences.iter().sum::<f64>() / confidences.len() as f64;
            merged.push(Detection::from_rect(left, top, right, bottom, text, confidence));
        }
    }

    sort_reading_order(&mut merged);
    merged
}

fn sort_reading_order(detections: &mut [Detection]) {
    detections.sort_by(|a, b| {
        let (al, at, _, _) = a.bounds();
        let (bl, bt, _, _) = b.bounds();
        at.total_cmp(&bt).then(al.total_cmp(&bl))
    });
}
