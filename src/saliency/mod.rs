//! Saliency processing layer.
//!
//! This module turns a decoded image into a binary attention mask and wraps
//! the computation in validation and bounded retry.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │              HTTP Handlers              │
//! └────────────────────┬────────────────────┘
//!                      │
//!                      ▼
//! ┌─────────────────────────────────────────┐
//! │            SaliencyService              │
//! │  ┌──────────────┐  ┌─────────────────┐  │
//! │  │ RetryPolicy  │  │  validate_mask  │  │
//! │  └──────────────┘  └─────────────────┘  │
//! └──────────┬─────────────────┬────────────┘
//!            │                 │
//!            ▼                 ▼
//! ┌───────────────────┐ ┌───────────────────┐
//! │  SaliencyEngine   │ │    Binarizer      │
//! │ (SpectralResidual)│ │  (OtsuBinarizer)  │
//! └───────────────────┘ └───────────────────┘
//! ```
//!
//! # Components
//!
//! - [`SaliencyService`]: Entry point, runs the validate-and-retry loop
//! - [`SaliencyEngine`]: Capability trait producing per-pixel scores in `[0, 1]`
//! - [`SpectralResidual`]: In-process frequency-domain saliency engine
//! - [`Binarizer`] / [`OtsuBinarizer`]: Automatic global thresholding
//! - [`RetryPolicy`]: Attempt count and exponential backoff schedule
//! - [`MaskStats`]: Statistics used to reject empty or near-constant masks

mod engine;
mod retry;
mod service;
mod threshold;
mod validate;

pub use engine::{
    SaliencyEngine, SaliencyMap, SpectralResidual, DEFAULT_WORKING_SIZE, MIN_WORKING_SIZE,
};
pub use retry::{RetryPolicy, DEFAULT_BASE_DELAY, DEFAULT_MAX_ATTEMPTS};
pub use service::{
    decode_image, encode_png, has_allowed_extension, SaliencyResponse, SaliencyService,
    UploadedFile, ALLOWED_EXTENSIONS, DEFAULT_MAX_IMAGE_DIMENSION,
};
pub use threshold::{
    apply_threshold, otsu_threshold, scale_to_u8, Binarized, Binarizer, OtsuBinarizer, MASK_OFF,
    MASK_ON,
};
pub use validate::{validate_mask, MaskStats, MIN_STD_DEV};
