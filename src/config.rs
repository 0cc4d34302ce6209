//! Configuration management for the saliency server.
//!
//! This module provides a flexible configuration system that supports:
//! - Command-line arguments via clap
//! - Environment variables with `SALIENCY_` prefix
//! - Sensible defaults for all optional settings
//!
//! # Environment Variables
//!
//! - `SALIENCY_HOST` - Server bind address (default: 0.0.0.0)
//! - `SALIENCY_PORT` - Server port (default: 8000)
//! - `SALIENCY_MAX_ATTEMPTS` - Attempts per request (default: 3)
//! - `SALIENCY_RETRY_BASE_DELAY_MS` - Backoff after the first failure (default: 1000)
//! - `SALIENCY_MAX_UPLOAD_BYTES` - Upload size limit (default: 20 MiB)
//! - `SALIENCY_MAX_IMAGE_DIMENSION` - Largest decoded width or height (default: 8192)
//! - `SALIENCY_WORKING_SIZE` - Spectral-residual working resolution (default: 64)
//! - `SALIENCY_CORS_ORIGINS` - Comma-separated allowed origins (default: any)

use std::time::Duration;

use clap::Parser;

use crate::saliency::{
    RetryPolicy, SaliencyService, SpectralResidual, DEFAULT_MAX_ATTEMPTS,
    DEFAULT_MAX_IMAGE_DIMENSION, DEFAULT_WORKING_SIZE, MIN_WORKING_SIZE,
};
use crate::server::{RouterConfig, DEFAULT_MAX_UPLOAD_BYTES};

// =============================================================================
// Default Values
// =============================================================================

/// Default server host.
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Default server port.
pub const DEFAULT_PORT: u16 = 8000;

/// Default backoff after the first failed attempt, in milliseconds.
pub const DEFAULT_RETRY_BASE_DELAY_MS: u64 = 1000;

/// Upper bound on attempts, keeping worst-case latency bounded.
pub const MAX_ATTEMPTS_LIMIT: u32 = 10;

// =============================================================================
// CLI Arguments
// =============================================================================

/// Saliency Server - binary visual-attention masks over HTTP.
///
/// Accepts PNG/JPEG uploads, computes a spectral-residual saliency map,
/// thresholds it with Otsu's method and returns the mask as PNG.
#[derive(Parser, Debug, Clone)]
#[command(name = "saliency-server")]
#[command(author, version, about, long_about = None)]
pub struct Config {
    // =========================================================================
    // Server Configuration
    // =========================================================================
    /// Host address to bind the server to.
    #[arg(long, default_value = DEFAULT_HOST, env = "SALIENCY_HOST")]
    pub host: String,

    /// Port to listen on.
    #[arg(short, long, default_value_t = DEFAULT_PORT, env = "SALIENCY_PORT")]
    pub port: u16,

    // =========================================================================
    // Processing Configuration
    // =========================================================================
    /// Number of compute-and-validate attempts per request.
    #[arg(long, default_value_t = DEFAULT_MAX_ATTEMPTS, env = "SALIENCY_MAX_ATTEMPTS")]
    pub max_attempts: u32,

    /// Backoff after the first failed attempt in milliseconds (doubles each retry).
    #[arg(long, default_value_t = DEFAULT_RETRY_BASE_DELAY_MS, env = "SALIENCY_RETRY_BASE_DELAY_MS")]
    pub retry_base_delay_ms: u64,

    /// Maximum upload size in bytes.
    #[arg(long, default_value_t = DEFAULT_MAX_UPLOAD_BYTES, env = "SALIENCY_MAX_UPLOAD_BYTES")]
    pub max_upload_bytes: usize,

    /// Largest accepted decoded width or height in pixels.
    #[arg(long, default_value_t = DEFAULT_MAX_IMAGE_DIMENSION, env = "SALIENCY_MAX_IMAGE_DIMENSION")]
    pub max_image_dimension: u32,

    /// Square working resolution of the spectral-residual engine.
    #[arg(long, default_value_t = DEFAULT_WORKING_SIZE, env = "SALIENCY_WORKING_SIZE")]
    pub working_size: u32,

    // =========================================================================
    // CORS Configuration
    // =========================================================================
    /// Allowed CORS origins (comma-separated).
    ///
    /// If not specified, any origin is allowed (credentials included).
    #[arg(long, env = "SALIENCY_CORS_ORIGINS", value_delimiter = ',')]
    pub cors_origins: Option<Vec<String>>,

    // =========================================================================
    // Logging Configuration
    // =========================================================================
    /// Enable verbose logging (debug level).
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,

    /// Disable request tracing.
    #[arg(long, default_value_t = false)]
    pub no_tracing: bool,
}

impl Config {
    /// Validate the configuration and return an error message if invalid.
    pub fn validate(&self) -> Result<(), String> {
        if self.max_attempts == 0 {
            return Err("max_attempts must be greater than 0".to_string());
        }
        if self.max_attempts > MAX_ATTEMPTS_LIMIT {
            return Err(format!(
                "max_attempts must be at most {}",
                MAX_ATTEMPTS_LIMIT
            ));
        }
        if self.max_upload_bytes == 0 {
            return Err("max_upload_bytes must be greater than 0".to_string());
        }
        if self.max_image_dimension == 0 {
            return Err("max_image_dimension must be greater than 0".to_string());
        }
        if self.working_size < MIN_WORKING_SIZE {
            return Err(format!("working_size must be at least {}", MIN_WORKING_SIZE));
        }
        Ok(())
    }

    /// Get the server bind address as "host:port".
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Retry policy for the saliency service.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.max_attempts,
            Duration::from_millis(self.retry_base_delay_ms),
        )
    }

    /// Saliency service built from this config.
    pub fn saliency_service(&self) -> SaliencyService<SpectralResidual> {
        SaliencyService::new(SpectralResidual::with_working_size(self.working_size))
            .with_retry_policy(self.retry_policy())
            .with_max_image_dimension(self.max_image_dimension)
    }

    /// Router configuration derived from this config.
    pub fn router_config(&self) -> RouterConfig {
        let mut router_config = RouterConfig::new()
            .with_max_upload_bytes(self.max_upload_bytes)
            .with_tracing(!self.no_tracing);

        if let Some(ref origins) = self.cors_origins {
            router_config = router_config.with_cors_origins(origins.clone());
        }

        router_config
    }
}

// =============================================================================
// Tests
// =============================================================================
