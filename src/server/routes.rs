//! Router configuration for the saliency server.
//!
//! This module defines the HTTP routes and applies middleware for CORS,
//! upload size limits and request tracing.
//!
//! # Route Structure
//!
//! ```text
//! /health      - Health check
//! /saliency    - Image upload (multipart), returns PNG mask
//! ```
//!
//! # Example
//!
//! ```ignore
//! use saliency_server::saliency::{SaliencyService, SpectralResidual};
//! use saliency_server::server::{create_router, RouterConfig};
//!
//! let service = SaliencyService::new(SpectralResidual::new());
//! let router = create_router(service, RouterConfig::default());
//!
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:8000").await?;
//! axum::serve(listener, router).await?;
//! ```

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use super::handlers::{health_handler, saliency_handler, AppState};
use crate::saliency::{Binarizer, SaliencyEngine, SaliencyService};

/// Default maximum upload size in bytes (20 MiB).
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;

// =============================================================================
// Router Configuration
// =============================================================================

/// Configuration for the HTTP router.
#[derive(Debug, Clone)]
pub struct RouterConfig {
    /// Allowed CORS origins (None = mirror any origin)
    pub cors_origins: Option<Vec<String>>,

    /// Maximum request body size in bytes
    pub max_upload_bytes: usize,

    /// Whether to enable request tracing
    pub enable_tracing: bool,
}

impl Default for RouterConfig {
    /// By default:
    /// - CORS mirrors any origin, method and header, with credentials
    /// - Uploads are limited to 20 MiB
    /// - Tracing is enabled
    fn default() -> Self {
        Self {
            cors_origins: None,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            enable_tracing: true,
        }
    }
}

impl RouterConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set specific allowed CORS origins.
    ///
    /// Pass an empty vec to disallow all cross-origin requests.
    pub fn with_cors_origins(mut self, origins: Vec<String>) -> Self {
        self.cors_origins = Some(origins);
        self
    }

    /// Set the maximum upload size in bytes.
    pub fn with_max_upload_bytes(mut self, bytes: usize) -> Self {
        self.max_upload_bytes = bytes;
        self
    }

    /// Enable or disable request tracing.
    pub fn with_tracing(mut self, enabled: bool) -> Self {
        self.enable_tracing = enabled;
        self
    }
}

// =============================================================================
// Router Builder
// =============================================================================

/// Create the main application router.
///
/// This function builds the complete Axum router with:
/// - `GET /health`
/// - `POST /saliency` with the configured body limit
/// - CORS configuration
/// - Request tracing (optional)
pub fn create_router<E, B>(service: SaliencyService<E, B>, config: RouterConfig) -> Router
where
    E: SaliencyEngine + 'static,
    B: Binarizer + 'static,
{
    let app_state = AppState::new(service);
    let cors = build_cors_layer(&config);

    let router = Router::new()
        .route("/health", get(health_handler))
        .route(
            "/saliency",
            post(saliency_handler::<E, B>).layer(DefaultBodyLimit::max(config.max_upload_bytes)),
        )
        .with_state(app_state)
        .layer(cors);

    if config.enable_tracing {
        router.layer(TraceLayer::new_for_http())
    } else {
        router
    }
}

/// Build the CORS layer based on configuration.
///
/// Credentials are always allowed. Wildcards cannot be combined with
/// credentials, so "any" is expressed by mirroring the request.
fn build_cors_layer(config: &RouterConfig) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(true);

    match &config.cors_origins {
        None => cors.allow_origin(AllowOrigin::mirror_request()),
        Some(origins) if origins.is_empty() => cors,
        Some(origins) => {
            let parsed_origins: Vec<_> = origins.iter().filter_map(|o| o.parse().ok()).collect();
            cors.allow_origin(parsed_origins)
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
