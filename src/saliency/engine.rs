//! Saliency engines.
//!
//! The [`SaliencyEngine`] trait is the narrow capability the service depends on:
//! given a decoded color image, produce a per-pixel saliency score in `[0, 1]`
//! with the same dimensions, or fail.
//!
//! [`SpectralResidual`] is the in-process implementation. It follows the
//! classic spectral-residual approach:
//!
//! ```text
//! RGB ─► gray ─► 64×64 ─► FFT ─► log|F| - box3(log|F|) ─► exp · e^(i·phase)
//!                                                              │
//!          map (W×H) ◄─ resize ◄─ normalize ◄─ gauss5 ◄─ |IFFT|²
//! ```

use image::imageops::{self, FilterType};
use image::{ImageBuffer, Luma, RgbImage};
use rustfft::num_complex::Complex;
use rustfft::{FftDirection, FftPlanner};

use crate::error::EngineError;

/// Per-pixel saliency scores in `[0, 1]`.
pub type SaliencyMap = ImageBuffer<Luma<f32>, Vec<f32>>;

/// Side length of the square working resolution used by the spectral residual.
pub const DEFAULT_WORKING_SIZE: u32 = 64;

/// Smallest working resolution that still leaves room for the filters.
pub const MIN_WORKING_SIZE: u32 = 8;

const LOG_EPSILON: f32 = 1e-8;
const SMOOTHING_KERNEL_SIZE: usize = 5;
const SMOOTHING_SIGMA: f32 = 8.0;

// =============================================================================
// Engine Trait
// =============================================================================

/// Capability for computing a saliency map from a decoded image.
///
/// Implementations must be thread-safe: the service runs each attempt on the
/// blocking thread pool and may share one engine across concurrent requests.
pub trait SaliencyEngine: Send + Sync {
    /// Compute a saliency map with the same dimensions as `image`.
    fn compute_saliency(&self, image: &RgbImage) -> Result<SaliencyMap, EngineError>;
}

// =============================================================================
// Spectral Residual
// =============================================================================

/// Spectral-residual saliency engine.
///
/// Stateless apart from its working resolution, so it is cheap to clone and
/// deterministic for a given input.
#[derive(Debug, Clone)]
pub struct SpectralResidual {
    working_size: u32,
}

impl Default for SpectralResidual {
    fn default() -> Self {
        Self::new()
    }
}

impl SpectralResidual {
    /// Create an engine working at the default 64×64 resolution.
    pub fn new() -> Self {
        Self {
            working_size: DEFAULT_WORKING_SIZE,
        }
    }

    /// Create an engine working at a custom square resolution.
    ///
    /// Sizes below [`MIN_WORKING_SIZE`] are raised to it.
    pub fn with_working_size(working_size: u32) -> Self {
        Self {
            working_size: working_size.max(MIN_WORKING_SIZE),
        }
    }

    /// The working resolution in pixels.
    pub fn working_size(&self) -> u32 {
        self.working_size
    }
}

impl SaliencyEngine for SpectralResidual {
    fn compute_saliency(&self, image: &RgbImage) -> Result<SaliencyMap, EngineError> {
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return Err(EngineError::ComputationFailed);
        }

        let gray = imageops::grayscale(image);
        if is_flat(gray.as_raw()) {
            // Flat input has no salient structure
            return Ok(SaliencyMap::new(width, height));
        }

        let size = self.working_size;
        let small = imageops::resize(&gray, size, size, FilterType::Triangle);

        let Some(scores) = spectral_residual(small.as_raw(), size as usize, size as usize) else {
            // Downsampling flattened the input
            return Ok(SaliencyMap::new(width, height));
        };

        let small_map =
            SaliencyMap::from_raw(size, size, scores).ok_or(EngineError::ComputationFailed)?;
        let map = imageops::resize(&small_map, width, height, FilterType::Triangle);

        if map.as_raw().iter().any(|v| !v.is_finite()) {
            return Err(EngineError::ComputationFailed);
        }

        Ok(map)
    }
}

/// Run the spectral residual on a grayscale buffer.
///
/// Returns `None` when the input has no intensity variation, otherwise scores
/// normalized to `[0, 1]`.
fn spectral_residual(gray: &[u8], width: usize, height: usize) -> Option<Vec<f32>> {
    if is_flat(gray) {
        return None;
    }

    let mut spectrum: Vec<Complex<f32>> = gray
        .iter()
        .map(|&v| Complex::new(f32::from(v) / 255.0, 0.0))
        .collect();

    let mut planner = FftPlanner::new();
    fft_2d(&mut planner, &mut spectrum, width, height, FftDirection::Forward);

    let log_amplitude: Vec<f32> = spectrum
        .iter()
        .map(|c| (c.norm() + LOG_EPSILON).ln())
        .collect();
    let averaged = convolve_separable(&log_amplitude, width, height, &[1.0 / 3.0; 3]);

    for (i, value) in spectrum.iter_mut().enumerate() {
        let residual = (log_amplitude[i] - averaged[i]).exp();
        *value = Complex::from_polar(residual, value.arg());
    }

    fft_2d(&mut planner, &mut spectrum, width, height, FftDirection::Inverse);

    let power: Vec<f32> = spectrum.iter().map(|c| c.norm_sqr()).collect();
    let kernel = gaussian_kernel(SMOOTHING_KERNEL_SIZE, SMOOTHING_SIGMA);
    let smoothed = convolve_separable(&power, width, height, &kernel);

    normalize_min_max(smoothed)
}

fn is_flat(values: &[u8]) -> bool {
    match values.split_first() {
        Some((first, rest)) => rest.iter().all(|v| v == first),
        None => true,
    }
}

/// In-place 2-D FFT over a row-major buffer: rows first, then columns.
fn fft_2d(
    planner: &mut FftPlanner<f32>,
    data: &mut [Complex<f32>],
    width: usize,
    height: usize,
    direction: FftDirection,
) {
    let row_fft = planner.plan_fft(width, direction);
    for row in data.chunks_exact_mut(width) {
        row_fft.process(row);
    }

    let column_fft = planner.plan_fft(height, direction);
    let mut column = vec![Complex::new(0.0, 0.0); height];
    for x in 0..width {
        for (y, slot) in column.iter_mut().enumerate() {
            *slot = data[y * width + x];
        }
        column_fft.process(&mut column);
        for (y, value) in column.iter().enumerate() {
            data[y * width + x] = *value;
        }
    }
}

/// Normalized 1-D Gaussian kernel.
fn gaussian_kernel(size: usize, sigma: f32) -> Vec<f32> {
    let radius = (size / 2) as f32;
    let weights: Vec<f32> = (0..size)
        .map(|i| {
            let d = i as f32 - radius;
            (-(d * d) / (2.0 * sigma * sigma)).exp()
        })
        .collect();
    let sum: f32 = weights.iter().sum();
    weights.into_iter().map(|w| w / sum).collect()
}

/// Convolve with the same 1-D kernel horizontally then vertically.
///
/// Borders use reflect-101 (`dcb|abcd|cba`).
fn convolve_separable(data: &[f32], width: usize, height: usize, kernel: &[f32]) -> Vec<f32> {
    let radius = (kernel.len() / 2) as isize;

    let mut horizontal = vec![0.0f32; data.len()];
    for y in 0..height {
        let row = &data[y * width..(y + 1) * width];
        for x in 0..width {
            horizontal[y * width + x] = kernel
                .iter()
                .enumerate()
                .map(|(k, &w)| w * row[reflect_101(x as isize + k as isize - radius, width)])
                .sum();
        }
    }

    let mut output = vec![0.0f32; data.len()];
    for y in 0..height {
        for x in 0..width {
            output[y * width + x] = kernel
                .iter()
                .enumerate()
                .map(|(k, &w)| {
                    let sy = reflect_101(y as isize + k as isize - radius, height);
                    w * horizontal[sy * width + x]
                })
                .sum();
        }
    }

    output
}

fn reflect_101(index: isize, len: usize) -> usize {
    if len <= 1 {
        return 0;
    }
    let last = len as isize - 1;
    let mut i = index;
    while i < 0 || i > last {
        i = if i < 0 { -i } else { 2 * last - i };
    }
    i as usize
}

fn normalize_min_max(values: Vec<f32>) -> Option<Vec<f32>> {
    let min = values.iter().copied().fold(f32::INFINITY, f32::min);
    let max = values.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let range = max - min;
    if !range.is_finite() || range <= f32::EPSILON {
        return None;
    }
    Some(values.into_iter().map(|v| (v - min) / range).collect())
}

// =============================================================================
// Tests
// =============================================================================
