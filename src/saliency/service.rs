//! Saliency service orchestrating one request.
//!
//! # Pipeline
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                       SaliencyService                            │
//! │  process(upload)                                                 │
//! │   1. Check extension (.png/.jpg/.jpeg)       ── InvalidFormat    │
//! │   2. Decode to RGB            (blocking pool) ── DecodeError      │
//! │   3. For each attempt         (blocking pool):                   │
//! │        engine ─► scale u8 ─► binarize ─► validate ─► PNG         │
//! │      on failure: sleep base·2^a unless last attempt              │
//! │   4. All attempts failed                     ── ProcessingExhausted │
//! └──────────────────────────────────────────────────────────────────┘
//! ```

use std::any::Any;
use std::io::Cursor;
use std::sync::Arc;

use bytes::Bytes;
use image::codecs::png::PngEncoder;
use image::{
    DynamicImage, ExtendedColorType, GrayImage, ImageDecoder, ImageEncoder, ImageReader, Limits,
    RgbImage,
};
use tokio::task::JoinError;
use tracing::{debug, info, warn};

use crate::error::{AttemptError, SaliencyError};

use super::engine::SaliencyEngine;
use super::retry::RetryPolicy;
use super::threshold::{scale_to_u8, Binarizer, OtsuBinarizer};
use super::validate::{validate_mask, MaskStats};

/// Filename suffixes accepted for upload (compared case-insensitively).
pub const ALLOWED_EXTENSIONS: &[&str] = &[".png", ".jpg", ".jpeg"];

/// Default cap on decoded width and height, in pixels.
pub const DEFAULT_MAX_IMAGE_DIMENSION: u32 = 8192;

// =============================================================================
// Request / Response
// =============================================================================

/// An uploaded file: raw bytes plus the client-declared filename.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    /// Declared filename, used only for the extension check
    pub filename: String,

    /// Compressed image bytes
    pub data: Bytes,
}

impl UploadedFile {
    pub fn new(filename: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            filename: filename.into(),
            data: data.into(),
        }
    }
}

/// Successful result of [`SaliencyService::process`].
#[derive(Debug, Clone)]
pub struct SaliencyResponse {
    /// PNG-encoded single-channel mask
    pub data: Bytes,

    /// Number of attempts used, including the successful one
    pub attempts: u32,

    /// Threshold chosen by the binarizer
    pub threshold: u8,

    /// Statistics of the returned mask
    pub stats: MaskStats,

    /// Mask width in pixels (equals the input width)
    pub width: u32,

    /// Mask height in pixels (equals the input height)
    pub height: u32,
}

/// Output of one successful attempt.
#[derive(Debug)]
struct AttemptOutput {
    data: Bytes,
    threshold: u8,
    stats: MaskStats,
}

// =============================================================================
// Saliency Service
// =============================================================================

/// Validate-and-retry wrapper around a saliency engine.
///
/// Holds no per-request state, so one instance serves concurrent requests.
///
/// # Example
///
/// ```ignore
/// use saliency_server::saliency::{SaliencyService, SpectralResidual, UploadedFile};
///
/// let service = SaliencyService::new(SpectralResidual::new());
/// let upload = UploadedFile::new("photo.jpg", bytes);
/// let response = service.process(upload).await?;
/// println!("mask: {} bytes after {} attempt(s)", response.data.len(), response.attempts);
/// ```
pub struct SaliencyService<E, B = OtsuBinarizer> {
    engine: Arc<E>,
    binarizer: Arc<B>,
    retry: RetryPolicy,
    max_image_dimension: u32,
}

impl<E> SaliencyService<E, OtsuBinarizer>
where
    E: SaliencyEngine + 'static,
{
    /// Create a service using Otsu binarization and the default retry policy.
    pub fn new(engine: E) -> Self {
        Self::with_binarizer(engine, OtsuBinarizer::new())
    }
}

impl<E, B> SaliencyService<E, B>
where
    E: SaliencyEngine + 'static,
    B: Binarizer + 'static,
{
    /// Create a service with a custom binarizer.
    pub fn with_binarizer(engine: E, binarizer: B) -> Self {
        Self {
            engine: Arc::new(engine),
            binarizer: Arc::new(binarizer),
            retry: RetryPolicy::default(),
            max_image_dimension: DEFAULT_MAX_IMAGE_DIMENSION,
        }
    }

    /// Replace the retry policy.
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Replace the cap on decoded width and height. Larger uploads fail to decode.
    pub fn with_max_image_dimension(mut self, max_dimension: u32) -> Self {
        self.max_image_dimension = max_dimension;
        self
    }

    pub fn max_image_dimension(&self) -> u32 {
        self.max_image_dimension
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Turn an uploaded image into a PNG attention mask.
    ///
    /// # Errors
    ///
    /// - [`SaliencyError::InvalidFormat`] if the filename extension is not allowed
    /// - [`SaliencyError::DecodeError`] / [`SaliencyError::EmptyImage`] if the bytes
    ///   are not a usable image
    /// - [`SaliencyError::ProcessingExhausted`] if every attempt failed
    pub async fn process(&self, upload: UploadedFile) -> Result<SaliencyResponse, SaliencyError> {
        if !has_allowed_extension(&upload.filename) {
            return Err(SaliencyError::InvalidFormat);
        }

        let data = upload.data;
        let max_dimension = self.max_image_dimension;
        let image = tokio::task::spawn_blocking(move || decode_image(&data, max_dimension))
            .await
            .map_err(|e| SaliencyError::Internal {
                message: join_error_message(e),
            })??;

        let (width, height) = image.dimensions();
        debug!(filename = %upload.filename, width, height, "Decoded upload");

        let image = Arc::new(image);
        let max_attempts = self.retry.max_attempts();
        let mut last_error = String::new();

        for attempt in 0..max_attempts {
            match self.run_attempt(Arc::clone(&image)).await {
                Ok(output) => {
                    info!(
                        filename = %upload.filename,
                        attempts = attempt + 1,
                        threshold = output.threshold,
                        foreground_ratio = output.stats.foreground_ratio,
                        "Saliency mask computed"
                    );
                    return Ok(SaliencyResponse {
                        data: output.data,
                        attempts: attempt + 1,
                        threshold: output.threshold,
                        stats: output.stats,
                        width,
                        height,
                    });
                }
                Err(e) => {
                    warn!(
                        attempt = attempt + 1,
                        max_attempts,
                        error = %e,
                        "Saliency attempt failed"
                    );
                    last_error = e.to_string();
                }
            }

            if let Some(delay) = self.retry.delay_after(attempt) {
                debug!(delay_ms = delay.as_millis() as u64, "Backing off before retry");
                tokio::time::sleep(delay).await;
            }
        }

        Err(SaliencyError::ProcessingExhausted {
            attempts: max_attempts,
            last_error,
        })
    }

    /// Run one attempt on the blocking pool so CPU work stays off the async workers.
    async fn run_attempt(&self, image: Arc<RgbImage>) -> Result<AttemptOutput, AttemptError> {
        let engine = Arc::clone(&self.engine);
        let binarizer = Arc::clone(&self.binarizer);

        tokio::task::spawn_blocking(move || compute_attempt(&*engine, &*binarizer, &image))
            .await
            .map_err(|e| AttemptError::Panicked {
                message: join_error_message(e),
            })?
    }
}

fn compute_attempt<E, B>(
    engine: &E,
    binarizer: &B,
    image: &RgbImage,
) -> Result<AttemptOutput, AttemptError>
where
    E: SaliencyEngine + ?Sized,
    B: Binarizer + ?Sized,
{
    let (width, height) = image.dimensions();

    let map = engine.compute_saliency(image)?;
    check_dimensions(map.dimensions(), (width, height))?;

    let scores = scale_to_u8(&map);
    let binarized = binarizer.binarize(&scores);
    check_dimensions(binarized.mask.dimensions(), (width, height))?;

    let stats = validate_mask(&binarized.mask)?;
    let data = encode_png(&binarized.mask)?;

    Ok(AttemptOutput {
        data,
        threshold: binarized.threshold,
        stats,
    })
}

fn check_dimensions(actual: (u32, u32), expected: (u32, u32)) -> Result<(), AttemptError> {
    if actual != expected {
        return Err(AttemptError::DimensionMismatch {
            expected_width: expected.0,
            expected_height: expected.1,
            actual_width: actual.0,
            actual_height: actual.1,
        });
    }
    Ok(())
}

// =============================================================================
// Helpers
// =============================================================================

/// Whether `filename` ends with an allowed image extension, ignoring case.
pub fn has_allowed_extension(filename: &str) -> bool {
    let lower = filename.to_lowercase();
    ALLOWED_EXTENSIONS.iter().any(|ext| lower.ends_with(ext))
}

/// Decode compressed bytes into a 3-channel 8-bit image.
///
/// The format is sniffed from the content, not the filename. EXIF orientation
/// is applied, so the result is upright as a viewer would display it. Images
/// wider or taller than `max_dimension` are rejected before pixel data is read.
pub fn decode_image(data: &[u8], max_dimension: u32) -> Result<RgbImage, SaliencyError> {
    let decode_error = |e: image::ImageError| SaliencyError::DecodeError {
        message: e.to_string(),
    };

    let mut reader = ImageReader::new(Cursor::new(data))
        .with_guessed_format()
        .map_err(|e| SaliencyError::DecodeError {
            message: e.to_string(),
        })?;

    let mut limits = Limits::default();
    limits.max_image_width = Some(max_dimension);
    limits.max_image_height = Some(max_dimension);
    reader.limits(limits);

    let mut decoder = reader.into_decoder().map_err(decode_error)?;
    let orientation = decoder.orientation().map_err(decode_error)?;
    let mut decoded = DynamicImage::from_decoder(decoder).map_err(decode_error)?;
    decoded.apply_orientation(orientation);

    let rgb = decoded.into_rgb8();
    if rgb.width() == 0 || rgb.height() == 0 {
        return Err(SaliencyError::EmptyImage);
    }

    Ok(rgb)
}

/// Encode a single-channel mask as PNG.
pub fn encode_png(mask: &GrayImage) -> Result<Bytes, AttemptError> {
    let mut output = Vec::new();
    PngEncoder::new(&mut output)
        .write_image(
            mask.as_raw(),
            mask.width(),
            mask.height(),
            ExtendedColorType::L8,
        )
        .map_err(|e| AttemptError::Encode {
            message: e.to_string(),
        })?;
    Ok(Bytes::from(output))
}

fn join_error_message(err: JoinError) -> String {
    if err.is_panic() {
        panic_payload_message(err.into_panic())
    } else {
        err.to_string()
    }
}

fn panic_payload_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

// =============================================================================
// Tests
// =============================================================================
