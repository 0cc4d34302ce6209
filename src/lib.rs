//! # Saliency Server
//!
//! An HTTP service that turns an uploaded image into a binary visual-attention
//! mask.
//!
//! Each request is decoded, run through a spectral-residual saliency engine,
//! scaled to 8 bits, binarized with Otsu's method and validated. Masks that
//! come out empty or nearly constant are retried with exponential backoff
//! before the request fails.
//!
//! ## Architecture
//!
//! - [`saliency`] - Engine and binarizer traits, the spectral-residual engine,
//!   validation, retry policy and the request service
//! - [`server`] - Axum-based HTTP server and routes
//! - [`config`] - CLI and configuration types
//! - [`error`] - Error taxonomy shared by the layers
//!
//! ## Example
//!
//! ```rust,no_run
//! use saliency_server::{create_router, RouterConfig, SaliencyService, SpectralResidual};
//!
//! #[tokio::main]
//! async fn main() {
//!     let service = SaliencyService::new(SpectralResidual::new());
//!     let router = create_router(service, RouterConfig::default());
//!
//!     let listener = tokio::net::TcpListener::bind("0.0.0.0:8000").await.unwrap();
//!     axum::serve(listener, router).await.unwrap();
//! }
//! ```

pub mod config;
pub mod error;
pub mod saliency;
pub mod server;

// Re-export commonly used types
pub use config::Config;
pub use error::{AttemptError, EngineError, SaliencyError};
pub use saliency::{
    Binarized, Binarizer, MaskStats, OtsuBinarizer, RetryPolicy, SaliencyEngine, SaliencyMap,
    SaliencyResponse, SaliencyService, SpectralResidual, UploadedFile,
};
pub use server::{
    create_router, health_handler, saliency_handler, AppState, ErrorResponse, HealthResponse,
    RouterConfig,
};
