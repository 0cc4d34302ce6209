//! Scaling and binarization of saliency maps.

use image::{GrayImage, Luma};

use super::engine::SaliencyMap;

/// Value written for pixels above the threshold.
pub const MASK_ON: u8 = 255;

/// Value written for pixels at or below the threshold.
pub const MASK_OFF: u8 = 0;

/// A binary mask together with the cut point that produced it.
#[derive(Debug, Clone)]
pub struct Binarized {
    /// Pixels are either [`MASK_OFF`] or [`MASK_ON`]
    pub mask: GrayImage,

    /// Pixels strictly greater than this value were set to [`MASK_ON`]
    pub threshold: u8,
}

/// Capability for turning 8-bit scores into a binary mask.
pub trait Binarizer: Send + Sync {
    /// Binarize `scores` into a mask of the same dimensions.
    fn binarize(&self, scores: &GrayImage) -> Binarized;
}

/// Global binarization with a threshold chosen by Otsu's method.
#[derive(Debug, Clone, Copy, Default)]
pub struct OtsuBinarizer;

impl OtsuBinarizer {
    pub fn new() -> Self {
        Self
    }
}

impl Binarizer for OtsuBinarizer {
    fn binarize(&self, scores: &GrayImage) -> Binarized {
        let threshold = otsu_threshold(scores);
        Binarized {
            mask: apply_threshold(scores, threshold),
            threshold,
        }
    }
}

/// Scale `[0, 1]` scores to 8-bit values.
///
/// Values are clamped to `[0, 255]` after scaling and then truncated, so
/// out-of-range scores saturate instead of wrapping. NaN maps to 0.
pub fn scale_to_u8(map: &SaliencyMap) -> GrayImage {
    let (width, height) = map.dimensions();
    let mut scaled = GrayImage::new(width, height);
    for (dst, src) in scaled.pixels_mut().zip(map.pixels()) {
        let value = src.0[0] * 255.0;
        let value = if value.is_nan() {
            0.0
        } else {
            value.clamp(0.0, 255.0)
        };
        *dst = Luma([value as u8]);
    }
    scaled
}

/// Compute the Otsu threshold of an 8-bit image.
///
/// Picks the first cut point maximising the between-class variance, which is
/// the same as minimising the intra-class variance. A single-valued image
/// returns that value, so thresholding it yields an all-off mask.
pub fn otsu_threshold(gray: &GrayImage) -> u8 {
    let mut histogram = [0u64; 256];
    for pixel in gray.pixels() {
        histogram[pixel.0[0] as usize] += 1;
    }

    let total = u64::from(gray.width()) * u64::from(gray.height());
    if total == 0 {
        return 0;
    }

    let sum_total: f64 = histogram
        .iter()
        .enumerate()
        .map(|(i, &count)| i as f64 * count as f64)
        .sum();

    let first_occupied = histogram.iter().position(|&c| c > 0).unwrap_or(0);

    let mut best_threshold = first_occupied as u8;
    let mut best_variance = 0.0f64;
    let mut weight_background = 0u64;
    let mut sum_background = 0.0f64;

    for (t, &count) in histogram.iter().enumerate() {
        weight_background += count;
        if weight_background == 0 {
            continue;
        }
        let weight_foreground = total - weight_background;
        if weight_foreground == 0 {
            break;
        }

        sum_background += t as f64 * count as f64;
        let mean_background = sum_background / weight_background as f64;
        let mean_foreground = (sum_total - sum_background) / weight_foreground as f64;
        let diff = mean_background - mean_foreground;
        let variance = weight_background as f64 * weight_foreground as f64 * diff * diff;

        if variance > best_variance {
            best_variance = variance;
            best_threshold = t as u8;
        }
    }

    best_threshold
}

/// Map every pixel to [`MASK_ON`] if it is above `threshold`, else [`MASK_OFF`].
pub fn apply_threshold(gray: &GrayImage, threshold: u8) -> GrayImage {
    let (width, height) = gray.dimensions();
    let mut mask = GrayImage::new(width, height);
    for (dst, src) in mask.pixels_mut().zip(gray.pixels()) {
        *dst = Luma([if src.0[0] > threshold { MASK_ON } else { MASK_OFF }]);
    }
    mask
}
