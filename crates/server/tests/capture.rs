//! HTTP tests for the capture endpoint, with OCR replaced by stubs

use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    Router,
};
use base64::{engine::general_purpose, Engine as _};
use core_pipeline::{CapturePipeline, StandardImageDecoder, TextRecognizer};
use idcapture_server::{router, AppState};
use image::{DynamicImage, GrayImage, ImageBuffer, ImageFormat, Rgb};
use serde_json::{json, Value};
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

struct FixedText(&'static str);

impl TextRecognizer for FixedText {
    fn recognize_text(&self, _image: &GrayImage) -> anyhow::Result<String> {
        Ok(self.0.to_string())
    }
}

struct Unavailable;

impl TextRecognizer for Unavailable {
    fn recognize_text(&self, _image: &GrayImage) -> anyhow::Result<String> {
        anyhow::bail!("Failed to initialize Tesseract")
    }
}

struct Slow(Duration);

impl TextRecognizer for Slow {
    fn recognize_text(&self, _image: &GrayImage) -> anyhow::Result<String> {
        std::thread::sleep(self.0);
        Ok("John Smith 1234567".to_string())
    }
}

/// Records how many recognitions run at once
#[derive(Clone, Default)]
struct Counting {
    running: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
}

impl TextRecognizer for Counting {
    fn recognize_text(&self, _image: &GrayImage) -> anyhow::Result<String> {
        let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        std::thread::sleep(Duration::from_millis(100));
        self.running.fetch_sub(1, Ordering::SeqCst);
        Ok("John Smith 1234567".to_string())
    }
}

fn state_with(
    recognizer: impl TextRecognizer + 'static,
    timeout: Duration,
    max_body: usize,
    slots: usize,
) -> AppState {
    let pipeline = CapturePipeline::new(Arc::new(StandardImageDecoder), Arc::new(recognizer));
    AppState::new(pipeline, timeout, max_body, slots)
}

fn app_with(recognizer: impl TextRecognizer + 'static, timeout: Duration, max_body: usize) -> Router {
    router(state_with(recognizer, timeout, max_body, 4))
}

fn app(recognizer: impl TextRecognizer + 'static) -> Router {
    app_with(recognizer, Duration::from_secs(10), 10 * 1024 * 1024)
}

fn card_png_base64() -> String {
    let img = ImageBuffer::from_fn(80, 50, |x, _| {
        if x % 9 == 0 {
            Rgb([20u8, 20u8, 20u8])
        } else {
            Rgb([235u8, 235u8, 235u8])
        }
    });
    let mut bytes = Vec::new();
    DynamicImage::ImageRgb8(img)
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .unwrap();
    general_purpose::STANDARD.encode(bytes)
}

fn card_data_url() -> String {
    format!("data:image/png;base64,{}", card_png_base64())
}

async fn post_capture(app: Router, body: String) -> (StatusCode, Value) {
    let request = Request::builder()
        .method("POST")
        .uri("/capture")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

#[tokio::test]
async fn test_capture_returns_identity() {
    let app = app(FixedText("RMIT UNIVERSITY\nSTUDENT\nJOHN SMITH\n1234567\nExpiry 12 March 2027"));
    let body = json!({ "imageData": card_data_url() }).to_string();

    let (status, value) = post_capture(app, body).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(value, json!({"name": "John Smith", "studentNumber": "1234567"}));
}

#[tokio::test]
async fn test_capture_accepts_bare_base64() {
    let app = app(FixedText("Jane Doe\n7654321"));
    let body = json!({ "imageData": card_png_base64() }).to_string();

    let (status, value) = post_capture(app, body).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(value, json!({"name": "Jane Doe", "studentNumber": "7654321"}));
}

#[tokio::test]
async fn test_no_match_is_ok_with_error_body() {
    let app = app(FixedText("Jane Doe 123456"));
    let body = json!({ "imageData": card_data_url() }).to_string();

    let (status, value) = post_capture(app, body).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(value, json!({"error": "No match found in the provided ID data"}));
}

#[tokio::test]
async fn test_missing_image_data_is_bad_request() {
    let (status, value) = post_capture(app(FixedText("")), "{}".to_string()).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(value, json!({"error": "No image data provided"}));
}

#[tokio::test]
async fn test_null_image_data_is_missing() {
    let body = json!({ "imageData": null }).to_string();
    let (status, value) = post_capture(app(FixedText("")), body).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(value, json!({"error": "No image data provided"}));
}

#[tokio::test]
async fn test_non_image_bytes_are_undecodable() {
    let encoded = general_purpose::STANDARD.encode(b"this is plain text, not a picture");
    let body = json!({ "imageData": format!("data:image/jpeg;base64,{encoded}") }).to_string();

    let (status, value) = post_capture(app(FixedText("John Smith 1234567")), body).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(value, json!({"error": "Image could not be decoded"}));
}

#[tokio::test]
async fn test_malformed_base64_is_undecodable() {
    let body = json!({ "imageData": "data:image/png;base64,***" }).to_string();

    let (status, value) = post_capture(app(FixedText("John Smith 1234567")), body).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(value, json!({"error": "Image could not be decoded"}));
}

#[tokio::test]
async fn test_invalid_json_is_bad_request() {
    let (status, value) = post_capture(app(FixedText("")), "{not json".to_string()).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(value, json!({"error": "Invalid JSON body"}));
}

#[tokio::test]
async fn test_wrong_field_type_is_bad_request() {
    let body = json!({ "imageData": 42 }).to_string();
    let (status, value) = post_capture(app(FixedText("")), body).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(value, json!({"error": "Invalid JSON body"}));
}

#[tokio::test]
async fn test_ocr_failure_is_server_error() {
    let body = json!({ "imageData": card_data_url() }).to_string();
    let (status, value) = post_capture(app(Unavailable), body).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(value, json!({"error": "Text recognition failed"}));
}

#[tokio::test]
async fn test_slow_ocr_times_out() {
    let app = app_with(
        Slow(Duration::from_millis(500)),
        Duration::from_millis(50),
        10 * 1024 * 1024,
    );
    let body = json!({ "imageData": card_data_url() }).to_string();

    let (status, value) = post_capture(app, body).await;

    assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
    assert_eq!(value, json!({"error": "Text recognition timed out"}));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_captures_are_capped() {
    let counting = Counting::default();
    let app = router(state_with(
        counting.clone(),
        Duration::from_secs(10),
        10 * 1024 * 1024,
        2,
    ));
    let body = json!({ "imageData": card_data_url() }).to_string();

    let requests: Vec<_> = (0..5)
        .map(|_| tokio::spawn(post_capture(app.clone(), body.clone())))
        .collect();
    for request in requests {
        let (status, _) = request.await.unwrap();
        assert_eq!(status, StatusCode::OK);
    }

    assert_eq!(counting.peak.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_timed_out_capture_keeps_its_slot() {
    let state = state_with(
        Slow(Duration::from_millis(300)),
        Duration::from_millis(50),
        10 * 1024 * 1024,
        1,
    );
    let slots = state.capture_slots.clone();
    let app = router(state);
    let body = json!({ "imageData": card_data_url() }).to_string();

    let (status, _) = post_capture(app.clone(), body.clone()).await;
    assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
    assert_eq!(slots.available_permits(), 0);

    // The next request waits for the abandoned job and times out too
    let (status, _) = post_capture(app, body).await;
    assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);

    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(slots.available_permits(), 1);
}

#[tokio::test]
async fn test_oversized_body_is_rejected() {
    let app = app_with(FixedText("John Smith 1234567"), Duration::from_secs(10), 256);
    let body = json!({ "imageData": card_data_url() }).to_string();
    assert!(body.len() > 256);

    let (status, value) = post_capture(app, body).await;

    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(value, json!({"error": "Image data too large"}));
}

#[tokio::test]
async fn test_cross_origin_requests_allowed() {
    let request = Request::builder()
        .method("POST")
        .uri("/capture")
        .header(header::ORIGIN, "http://localhost:5173")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(json!({ "imageData": card_data_url() }).to_string()))
        .unwrap();

    let response = app(FixedText("John Smith 1234567"))
        .oneshot(request)
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response
        .headers()
        .contains_key(header::ACCESS_CONTROL_ALLOW_ORIGIN));
}

#[tokio::test]
async fn test_health_check() {
    let request = Request::builder()
        .uri("/health")
        .body(Body::empty())
        .unwrap();

    let response = app(FixedText("")).oneshot(request).await.unwrap();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();

    assert_eq!(&bytes[..], b"OK");
}
