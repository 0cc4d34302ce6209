//! API integration tests for mask generation and error handling.
//!
//! Tests verify:
//! - Successful mask generation with the spectral-residual engine
//! - Error cases (bad extension, undecodable payload, missing field)
//! - HTTP response codes, headers and JSON error bodies

use axum::body::Body;
use axum::http::{Request, StatusCode};
use tower::ServiceExt;

use saliency_server::saliency::{SaliencyService, SpectralResidual};
use saliency_server::{create_router, RouterConfig};

use super::test_utils::{
    body_bytes, body_json, encode_jpeg, encode_jpeg_with_orientation, encode_png, feature_image, is_valid_png, multipart_body,
    raw_upload_request, upload_request, ScriptedEngine,
};

fn spectral_router() -> axum::Router {
    create_router(
        SaliencyService::new(SpectralResidual::new()),
        RouterConfig::default(),
    )
}

// =============================================================================
// Mask Generation
// =============================================================================

#[tokio::test]
async fn test_png_upload_returns_binary_mask() {
    let image = feature_image(128, 96);
    let router = spectral_router();

    let response = router
        .oneshot(upload_request("scene.png", &encode_png(&image)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers().get("content-type").unwrap(), "image/png");
    assert_eq!(response.headers().get("x-saliency-attempts").unwrap(), "1");
    assert!(response.headers().contains_key("x-saliency-threshold"));

    let body = body_bytes(response).await;
    assert!(is_valid_png(&body), "Response should be a valid PNG");

    let mask = image::load_from_memory(&body).unwrap();
    assert_eq!(mask.color(), image::ColorType::L8);
    let mask = mask.to_luma8();
    assert_eq!(mask.dimensions(), (128, 96));
    assert!(mask.pixels().all(|p| p.0[0] == 0 || p.0[0] == 255));
    assert!(mask.pixels().any(|p| p.0[0] == 255));
    assert!(mask.pixels().any(|p| p.0[0] == 0));
}

#[tokio::test]
async fn test_jpeg_upload_with_uppercase_extension() {
    let image = feature_image(160, 120);
    let router = spectral_router();

    let response = router
        .oneshot(upload_request("SCENE.JPEG", &encode_jpeg(&image)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let mask = image::load_from_memory(&body_bytes(response).await)
        .unwrap()
        .to_luma8();
    assert_eq!(mask.dimensions(), (160, 120));
}

#[tokio::test]
async fn test_format_is_sniffed_from_content() {
    // JPEG bytes under a .png name still decode
    let image = feature_image(96, 96);
    let router = spectral_router();

    let response = router
        .oneshot(upload_request("scene.png", &encode_jpeg(&image)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_exif_orientation_is_applied_before_masking() {
    // Orientation 6 means the stored pixels are rotated 90° from the displayed image
    let router = spectral_router();

    for (orientation, expected) in [(1u16, (80, 40)), (6, (40, 80)), (8, (40, 80))] {
        let jpeg = encode_jpeg_with_orientation(&feature_image(80, 40), orientation);
        let response = router
            .clone()
            .oneshot(upload_request("phone.jpg", &jpeg))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK, "orientation {}", orientation);
        let mask = image::load_from_memory(&body_bytes(response).await)
            .unwrap()
            .to_luma8();
        assert_eq!(mask.dimensions(), expected, "orientation {}", orientation);
    }
}

#[tokio::test]
async fn test_oversized_dimensions_rejected() {
    let engine = ScriptedEngine::failing_times(0);
    let calls = engine.call_counter();
    let router = create_router(
        SaliencyService::new(engine).with_max_image_dimension(64),
        RouterConfig::default(),
    );

    let response = router
        .oneshot(upload_request("wide.png", &encode_png(&feature_image(200, 20))))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let error = body_json(response).await;
    assert!(error["detail"]
        .as_str()
        .unwrap()
        .starts_with("Error reading image: "));
    assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_identical_uploads_give_identical_results() {
    let data = encode_png(&feature_image(100, 80));
    let router = spectral_router();

    let first = router
        .clone()
        .oneshot(upload_request("scene.png", &data))
        .await
        .unwrap();
    let second = router
        .oneshot(upload_request("scene.png", &data))
        .await
        .unwrap();

    assert_eq!(first.status(), second.status());
    assert_eq!(body_bytes(first).await, body_bytes(second).await);
}

// =============================================================================
// Client Errors
// =============================================================================

#[tokio::test]
async fn test_unsupported_extensions_rejected() {
    let png = encode_png(&feature_image(32, 32));
    let router = spectral_router();

    for filename in [
        "scene.gif",
        "scene.bmp",
        "scene.png.exe",
        "scene",
        "png",
        "",
    ] {
        let response = router
            .clone()
            .oneshot(upload_request(filename, &png))
            .await
            .unwrap();

        assert_eq!(
            response.status(),
            StatusCode::BAD_REQUEST,
            "filename {:?}",
            filename
        );
        let error = body_json(response).await;
        assert_eq!(
            error["detail"], "Invalid file format. Only PNG/JPEG allowed.",
            "filename {:?}",
            filename
        );
    }
}

#[tokio::test]
async fn test_unsupported_extension_ignores_body() {
    let router = spectral_router();
    let response = router
        .oneshot(upload_request("notes.txt", b"not an image"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let error = body_json(response).await;
    assert_eq!(error["detail"], "Invalid file format. Only PNG/JPEG allowed.");
}

#[tokio::test]
async fn test_undecodable_payloads_rejected() {
    let mut truncated = encode_png(&feature_image(64, 64));
    truncated.truncate(truncated.len() / 3);

    let random: Vec<u8> = (0..512u32)
        .map(|i| (i.wrapping_mul(2_654_435_761) >> 13) as u8)
        .collect();

    let router = spectral_router();
    let payloads: [(&str, Vec<u8>); 3] = [
        ("empty.png", Vec::new()),
        ("truncated.png", truncated),
        ("random.jpg", random),
    ];

    for (filename, payload) in payloads {
        let response = router
            .clone()
            .oneshot(upload_request(filename, &payload))
            .await
            .unwrap();

        assert_eq!(
            response.status(),
            StatusCode::BAD_REQUEST,
            "payload {}",
            filename
        );
        let error = body_json(response).await;
        let detail = error["detail"].as_str().unwrap();
        assert!(
            detail.starts_with("Error reading image: "),
            "payload {}: {}",
            filename,
            detail
        );
    }
}

#[tokio::test]
async fn test_missing_file_field() {
    let router = spectral_router();
    let body = multipart_body("image", Some("scene.png"), b"ignored");

    let response = router.oneshot(raw_upload_request(body)).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let error = body_json(response).await;
    assert_eq!(error["detail"], "Field required: file");
}

#[tokio::test]
async fn test_field_without_filename_is_invalid_format() {
    let router = spectral_router();
    let body = multipart_body("file", None, b"plain form value");

    let response = router.oneshot(raw_upload_request(body)).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let error = body_json(response).await;
    assert_eq!(error["detail"], "Invalid file format. Only PNG/JPEG allowed.");
}

#[tokio::test]
async fn test_non_multipart_body_rejected() {
    let router = spectral_router();
    let request = Request::builder()
        .method("POST")
        .uri("/saliency")
        .header("content-type", "application/json")
        .body(Body::from("{}"))
        .unwrap();

    let response = router.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let error = body_json(response).await;
    assert!(error["detail"]
        .as_str()
        .unwrap()
        .starts_with("Invalid multipart body"));
}

#[tokio::test]
async fn test_upload_over_limit_rejected() {
    let engine = ScriptedEngine::failing_times(0);
    let calls = engine.call_counter();
    let router = create_router(
        SaliencyService::new(engine),
        RouterConfig::default().with_max_upload_bytes(1024),
    );

    let response = router
        .oneshot(upload_request("big.png", &vec![0u8; 64 * 1024]))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_get_saliency_not_allowed() {
    let router = spectral_router();
    let request = Request::builder()
        .uri("/saliency")
        .body(Body::empty())
        .unwrap();

    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
}

// =============================================================================
// Health & CORS
// =============================================================================

#[tokio::test]
async fn test_health_check() {
    let router = spectral_router();

    for _ in 0..2 {
        let request = Request::builder()
            .uri("/health")
            .body(Body::empty())
            .unwrap();

        let response = router.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let health = body_json(response).await;
        assert_eq!(health, serde_json::json!({ "status": "healthy" }));
    }
}

#[tokio::test]
async fn test_cors_preflight_allows_any_origin_with_credentials() {
    let router = spectral_router();
    let request = Request::builder()
        .method("OPTIONS")
        .uri("/saliency")
        .header("origin", "https://app.example.com")
        .header("access-control-request-method", "POST")
        .header("access-control-request-headers", "x-custom-header")
        .body(Body::empty())
        .unwrap();

    let response = router.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let headers = response.headers();
    assert_eq!(
        headers.get("access-control-allow-origin").unwrap(),
        "https://app.example.com"
    );
    assert_eq!(
        headers.get("access-control-allow-credentials").unwrap(),
        "true"
    );
    assert_eq!(headers.get("access-control-allow-methods").unwrap(), "POST");
    assert_eq!(
        headers.get("access-control-allow-headers").unwrap(),
        "x-custom-header"
    );
}

#[tokio::test]
async fn test_cors_specific_origins() {
    let router = create_router(
        SaliencyService::new(SpectralResidual::new()),
        RouterConfig::default().with_cors_origins(vec!["https://allowed.com".to_string()]),
    );

    let request = Request::builder()
        .uri("/health")
        .header("origin", "https://allowed.com")
        .body(Body::empty())
        .unwrap();
    let response = router.clone().oneshot(request).await.unwrap();
    assert_eq!(
        response
            .headers()
            .get("access-control-allow-origin")
            .unwrap(),
        "https://allowed.com"
    );

    let request = Request::builder()
        .uri("/health")
        .header("origin", "https://evil.com")
        .body(Body::empty())
        .unwrap();
    let response = router.oneshot(request).await.unwrap();
    assert!(response
        .headers()
        .get("access-control-allow-origin")
        .is_none());
}
