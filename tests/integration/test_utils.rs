//! Test utilities for integration tests.
//!
//! This module provides scripted engines, image fixtures and helpers for
//! building multipart upload requests.

use axum::body::Body;
use axum::http::{Request, Response};
use http_body_util::BodyExt;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::{ExtendedColorType, ImageEncoder, Luma, Rgb, RgbImage};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use saliency_server::error::EngineError;
use saliency_server::saliency::{SaliencyEngine, SaliencyMap};

/// Multipart boundary used by every test request.
pub const BOUNDARY: &str = "saliency-test-boundary-7f3a";

// =============================================================================
// Scripted Engine
// =============================================================================

/// An engine that fails a fixed number of times before succeeding.
///
/// Successful calls return a map whose left half scores 0.9 and right half
/// 0.1, which always passes validation. The call counter is shared so tests
/// can inspect it after the engine has moved into a router.
#[derive(Clone)]
pub struct ScriptedEngine {
    failures: usize,
    calls: Arc<AtomicUsize>,
}

impl ScriptedEngine {
    pub fn failing_times(failures: usize) -> Self {
        Self {
            failures,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn always_failing() -> Self {
        Self::failing_times(usize::MAX)
    }

    pub fn call_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }
}

impl SaliencyEngine for ScriptedEngine {
    fn compute_saliency(&self, image: &RgbImage) -> Result<SaliencyMap, EngineError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call < self.failures {
            return Err(EngineError::ComputationFailed);
        }
        let (width, height) = image.dimensions();
        Ok(SaliencyMap::from_fn(width, height, |x, _| {
            Luma([if x < width / 2 { 0.9 } else { 0.1 }])
        }))
    }
}

// =============================================================================
// Image Fixtures
// =============================================================================

/// A high-contrast scene: dark background, bright block and a red disc.
pub fn feature_image(width: u32, height: u32) -> RgbImage {
    let (bx0, bx1) = (width / 5, width * 2 / 5);
    let (by0, by1) = (height / 4, height * 3 / 4);
    let (cx, cy) = ((width * 7 / 10) as i64, (height / 2) as i64);
    let radius = (width.min(height) / 6) as i64;

    RgbImage::from_fn(width, height, |x, y| {
        let dx = x as i64 - cx;
        let dy = y as i64 - cy;
        if (bx0..bx1).contains(&x) && (by0..by1).contains(&y) {
            Rgb([240, 240, 240])
        } else if dx * dx + dy * dy <= radius * radius {
            Rgb([220, 30, 30])
        } else {
            Rgb([15, 15, 20])
        }
    })
}

/// A solid gray image with no features at all.
pub fn blank_image(width: u32, height: u32) -> RgbImage {
    RgbImage::from_pixel(width, height, Rgb([128, 128, 128]))
}

pub fn encode_png(image: &RgbImage) -> Vec<u8> {
    let mut buf = Vec::new();
    PngEncoder::new(&mut buf)
        .write_image(
            image.as_raw(),
            image.width(),
            image.height(),
            ExtendedColorType::Rgb8,
        )
        .unwrap();
    buf
}

pub fn encode_jpeg(image: &RgbImage) -> Vec<u8> {
    let mut buf = Vec::new();
    let mut encoder = JpegEncoder::new_with_quality(&mut buf, 95);
    encoder.encode_image(image).unwrap();
    buf
}

/// JPEG with an APP1 Exif segment carrying the given orientation tag.
///
/// The segment is spliced right after SOI, holding a little-endian TIFF header
/// with a single IFD entry (0x0112, SHORT).
pub fn encode_jpeg_with_orientation(image: &RgbImage, orientation: u16) -> Vec<u8> {
    let jpeg = encode_jpeg(image);
    assert_eq!(&jpeg[..2], &[0xFF, 0xD8], "missing SOI");

    let mut exif = Vec::new();
    exif.extend_from_slice(b"Exif\0\0");
    exif.extend_from_slice(b"II");
    exif.extend_from_slice(&42u16.to_le_bytes());
    exif.extend_from_slice(&8u32.to_le_bytes());
    exif.extend_from_slice(&1u16.to_le_bytes());
    exif.extend_from_slice(&0x0112u16.to_le_bytes());
    exif.extend_from_slice(&3u16.to_le_bytes());
    exif.extend_from_slice(&1u32.to_le_bytes());
    exif.extend_from_slice(&orientation.to_le_bytes());
    exif.extend_from_slice(&[0, 0]);
    exif.extend_from_slice(&0u32.to_le_bytes());

    let segment_len = (exif.len() + 2) as u16;
    let mut out = Vec::with_capacity(jpeg.len() + exif.len() + 4);
    out.extend_from_slice(&jpeg[..2]);
    out.extend_from_slice(&[0xFF, 0xE1]);
    out.extend_from_slice(&segment_len.to_be_bytes());
    out.extend_from_slice(&exif);
    out.extend_from_slice(&jpeg[2..]);
    out
}

/// Check for the PNG signature.
pub fn is_valid_png(data: &[u8]) -> bool {
    data.starts_with(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A])
}

// =============================================================================
// Request Helpers
// =============================================================================

/// Build a multipart body with a single field.
///
/// When `filename` is `None` the part is sent as a plain form field.
pub fn multipart_body(field: &str, filename: Option<&str>, data: &[u8]) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
    match filename {
        Some(filename) => {
            body.extend_from_slice(
                format!(
                    "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n",
                    field, filename
                )
                .as_bytes(),
            );
            body.extend_from_slice(b"Content-Type: application/octet-stream\r\n");
        }
        None => {
            body.extend_from_slice(
                format!("Content-Disposition: form-data; name=\"{}\"\r\n", field).as_bytes(),
            );
        }
    }
    body.extend_from_slice(b"\r\n");
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());
    body
}

/// Build a `POST /saliency` request uploading `data` as `filename`.
pub fn upload_request(filename: &str, data: &[u8]) -> Request<Body> {
    raw_upload_request(multipart_body("file", Some(filename), data))
}

/// Build a `POST /saliency` request with a pre-built multipart body.
pub fn raw_upload_request(body: Vec<u8>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/saliency")
        .header(
            "content-type",
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(body))
        .unwrap()
}

pub async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    response
        .into_body()
        .collect()
        .await
        .unwrap()
        .to_bytes()
        .to_vec()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let body = body_bytes(response).await;
    serde_json::from_slice(&body).unwrap()
}
