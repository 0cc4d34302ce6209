//! HTTP request handlers for the saliency API.
//!
//! # Endpoints
//!
//! - `POST /saliency` - Upload an image, receive a PNG attention mask
//! - `GET /health` - Health check endpoint

use std::sync::Arc;

use axum::{
    extract::{
        multipart::{MultipartError, MultipartRejection},
        Multipart, State,
    },
    http::{header, HeaderName, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::{error, warn};

use crate::error::SaliencyError;
use crate::saliency::{
    has_allowed_extension, Binarizer, OtsuBinarizer, SaliencyEngine, SaliencyService, UploadedFile,
};

/// Multipart field carrying the uploaded image.
pub const UPLOAD_FIELD: &str = "file";

/// Response header reporting how many attempts the mask took.
pub const ATTEMPTS_HEADER: &str = "x-saliency-attempts";

/// Response header reporting the binarization threshold.
pub const THRESHOLD_HEADER: &str = "x-saliency-threshold";

// =============================================================================
// Application State
// =============================================================================

/// Shared application state containing the saliency service.
///
/// This is passed to all handlers via Axum's State extractor.
pub struct AppState<E, B = OtsuBinarizer> {
    /// The service that runs the validate-and-retry pipeline
    pub service: Arc<SaliencyService<E, B>>,
}

impl<E, B> AppState<E, B> {
    /// Create a new application state with the given service.
    pub fn new(service: SaliencyService<E, B>) -> Self {
        Self {
            service: Arc::new(service),
        }
    }
}

impl<E, B> Clone for AppState<E, B> {
    fn clone(&self) -> Self {
        Self {
            service: Arc::clone(&self.service),
        }
    }
}

// =============================================================================
// Response Types
// =============================================================================

/// JSON error body returned for every 4xx/5xx response.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Human-readable error message
    pub detail: String,
}

impl ErrorResponse {
    pub fn new(detail: impl Into<String>) -> Self {
        Self {
            detail: detail.into(),
        }
    }
}

/// Health check response.
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Service status
    pub status: String,
}

// =============================================================================
// Error Mapping
// =============================================================================

impl SaliencyError {
    /// HTTP status and a short machine-friendly label for logs.
    pub fn status(&self) -> (StatusCode, &'static str) {
        match self {
            SaliencyError::InvalidFormat => (StatusCode::BAD_REQUEST, "invalid_format"),
            SaliencyError::DecodeError { .. } | SaliencyError::EmptyImage => {
                (StatusCode::BAD_REQUEST, "decode_error")
            }
            SaliencyError::Multipart { .. } => (StatusCode::BAD_REQUEST, "invalid_multipart"),
            SaliencyError::UploadTooLarge { .. } => {
                (StatusCode::PAYLOAD_TOO_LARGE, "upload_too_large")
            }
            SaliencyError::MissingFile => (StatusCode::UNPROCESSABLE_ENTITY, "missing_file"),
            SaliencyError::ProcessingExhausted { .. } => {
                (StatusCode::INTERNAL_SERVER_ERROR, "processing_exhausted")
            }
            SaliencyError::Internal { .. } => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
        }
    }
}

/// Convert SaliencyError to HTTP response.
///
/// 4xx errors are logged at WARN level, 5xx errors at ERROR level.
impl IntoResponse for SaliencyError {
    fn into_response(self) -> Response {
        let (status, error_type) = self.status();
        let message = self.to_string();

        if status.is_server_error() {
            error!(
                error_type = error_type,
                status = status.as_u16(),
                "Server error: {}",
                message
            );
        } else {
            warn!(
                error_type = error_type,
                status = status.as_u16(),
                "Client error: {}",
                message
            );
        }

        (status, Json(ErrorResponse::new(message))).into_response()
    }
}

fn multipart_error(err: MultipartError) -> SaliencyError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        SaliencyError::UploadTooLarge {
            message: err.body_text(),
        }
    } else {
        SaliencyError::Multipart {
            message: err.body_text(),
        }
    }
}

// =============================================================================
// Handlers
// =============================================================================

/// Handle saliency requests.
///
/// # Endpoint
///
/// `POST /saliency` with a `multipart/form-data` body whose `file` field holds
/// the image bytes and filename.
///
/// # Response
///
/// - `200 OK`: PNG mask with `Content-Type: image/png`
/// - `400 Bad Request`: Unsupported extension or undecodable image
/// - `413 Payload Too Large`: Upload exceeds the configured limit
/// - `422 Unprocessable Entity`: No `file` field
/// - `500 Internal Server Error`: Every attempt failed
///
/// Error bodies are `{"detail": "<message>"}`.
///
/// # Headers
///
/// - `Content-Type: image/png`
/// - `Cache-Control: no-store`
/// - `X-Saliency-Attempts: 1|2|3`
/// - `X-Saliency-Threshold: 0-255`
pub async fn saliency_handler<E, B>(
    State(state): State<AppState<E, B>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Response, SaliencyError>
where
    E: SaliencyEngine + 'static,
    B: Binarizer + 'static,
{
    let mut multipart = multipart.map_err(|rejection| SaliencyError::Multipart {
        message: rejection.body_text(),
    })?;

    let upload = read_upload(&mut multipart).await?;
    let response = state.service.process(upload).await?;

    let headers = [
        (header::CONTENT_TYPE, "image/png".to_string()),
        (header::CACHE_CONTROL, "no-store".to_string()),
        (
            HeaderName::from_static(ATTEMPTS_HEADER),
            response.attempts.to_string(),
        ),
        (
            HeaderName::from_static(THRESHOLD_HEADER),
            response.threshold.to_string(),
        ),
    ];

    Ok((StatusCode::OK, headers, response.data).into_response())
}

/// Pull the upload out of the multipart body.
///
/// The extension is checked before the field body is read, so unsupported
/// files are rejected without buffering them.
async fn read_upload(multipart: &mut Multipart) -> Result<UploadedFile, SaliencyError> {
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }

        let filename = field.file_name().unwrap_or_default().to_string();
        if !has_allowed_extension(&filename) {
            return Err(SaliencyError::InvalidFormat);
        }

        let data = field.bytes().await.map_err(multipart_error)?;
        return Ok(UploadedFile::new(filename, data));
    }

    Err(SaliencyError::MissingFile)
}

/// Handle health check requests.
///
/// # Endpoint
///
/// `GET /health`
///
/// # Response
///
/// `200 OK` with JSON body:
/// ```json
/// {
///   "status": "healthy"
/// }
/// ```
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
    })
}

// =============================================================================
// Tests
// =============================================================================
