//! Output validation for thresholded masks.

use image::GrayImage;

use crate::error::AttemptError;

/// Masks with a population standard deviation below this are rejected.
pub const MIN_STD_DEV: f64 = 10.0;

/// Summary statistics of a mask.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MaskStats {
    /// Mean pixel value
    pub mean: f64,

    /// Population standard deviation of pixel values
    pub std_dev: f64,

    /// Fraction of pixels that are non-zero
    pub foreground_ratio: f64,
}

impl MaskStats {
    /// Compute statistics over every pixel of `mask`.
    pub fn compute(mask: &GrayImage) -> Self {
        let values = mask.as_raw();
        if values.is_empty() {
            return Self {
                mean: 0.0,
                std_dev: 0.0,
                foreground_ratio: 0.0,
            };
        }

        let n = values.len() as f64;
        let mean = values.iter().map(|&v| f64::from(v)).sum::<f64>() / n;
        let variance = values
            .iter()
            .map(|&v| {
                let d = f64::from(v) - mean;
                d * d
            })
            .sum::<f64>()
            / n;
        let foreground = values.iter().filter(|&&v| v != 0).count() as f64;

        Self {
            mean,
            std_dev: variance.sqrt(),
            foreground_ratio: foreground / n,
        }
    }

    /// True when no pixel is set.
    pub fn is_empty(&self) -> bool {
        self.foreground_ratio == 0.0
    }
}

/// Reject masks that are entirely empty or nearly constant.
///
/// An all-255 mask has zero deviation and is rejected too.
pub fn validate_mask(mask: &GrayImage) -> Result<MaskStats, AttemptError> {
    let stats = MaskStats::compute(mask);
    if stats.is_empty() || stats.std_dev < MIN_STD_DEV {
        return Err(AttemptError::InvalidOutput);
    }
    Ok(stats)
}
