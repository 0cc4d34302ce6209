//! HTTP server layer for the saliency server.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         HTTP Layer                              │
//! │          POST /saliency              GET /health                │
//! │                                                                 │
//! │  ┌───────────────────────────┐  ┌────────────────────────────┐  │
//! │  │         handlers          │  │          routes            │  │
//! │  │ (multipart, error → JSON) │  │ (CORS, body limit, trace)  │  │
//! │  └───────────────────────────┘  └────────────────────────────┘  │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod handlers;
pub mod routes;

pub use handlers::{
    health_handler, saliency_handler, AppState, ErrorResponse, HealthResponse, ATTEMPTS_HEADER,
    THRESHOLD_HEADER, UPLOAD_FIELD,
};
pub use routes::{create_router, RouterConfig, DEFAULT_MAX_UPLOAD_BYTES};
