//! End-to-end tests for the detection API, driven through the router.

use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::Router;
use image::RgbImage;
use tower::ServiceExt;

use fallwatch_core::{overlay, SimulatedPoseOracle};
use fallwatch_service::api::{create_router, AppState};
use fallwatch_service::{AlertDispatcher, ServiceConfig};

const BOUNDARY: &str = "fallwatch-test-boundary";

fn test_app() -> Router {
    let config = ServiceConfig {
        backend_url: None,
        ..ServiceConfig::default()
    };
    let state = AppState::with_parts(
        config,
        Box::new(SimulatedPoseOracle::new()),
        AlertDispatcher::new(),
    );
    create_router(state)
}

fn jpeg_frame() -> Vec<u8> {
    overlay::encode_jpeg(&RgbImage::new(640, 480), 90).expect("encode")
}

/// Builds a multipart body with a `user_id` text field and an `image`
/// file field.
fn multipart_body(user_id: &str, image: &[u8]) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"user_id\"\r\n\r\n{user_id}\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(
        format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"image\"; \
             filename=\"frame.jpg\"\r\nContent-Type: image/jpeg\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(image);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
    body
}

fn detect_request(user_id: &str, image: &[u8]) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/v1/detect-fall")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(multipart_body(user_id, image)))
        .expect("request builds")
}

async fn json_body(response: axum::response::Response) -> serde_json::Value {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body readable");
    serde_json::from_slice(&bytes).expect("body is JSON")
}

#[tokio::test]
async fn test_health_endpoint() {
    let app = test_app();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/health")
                .body(Body::empty())
                .expect("request builds"),
        )
        .await
        .expect("request succeeds");

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["service"], "fallwatch-service");
    assert_eq!(body["active_sessions"], 0);
    assert_eq!(body["tracked_people"], 0);
}

#[tokio::test]
async fn test_detect_fall_scores_uploaded_frame() {
    let app = test_app();

    let response = app
        .oneshot(detect_request("alice", &jpeg_frame()))
        .await
        .expect("request succeeds");

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert!(body["fall_detected"].is_boolean());
    assert!(body["confidence"].is_number());
    assert!(body["angle"].is_number());
    assert!(body["velocity"].is_number());
    assert!(body["landmarks"].is_array());
    assert!(body["timestamp"].is_string());
}

#[tokio::test]
async fn test_detect_fall_requires_image_field() {
    let app = test_app();

    let mut body = Vec::new();
    body.extend_from_slice(
        format!("--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"user_id\"\r\n\r\nalice\r\n--{BOUNDARY}--\r\n")
            .as_bytes(),
    );
    let request = Request::builder()
        .method("POST")
        .uri("/api/v1/detect-fall")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .expect("request builds");

    let response = app.oneshot(request).await.expect("request succeeds");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert_eq!(body["code"], "MISSING_FIELD");
    assert_eq!(body["field"], "image");
}

#[tokio::test]
async fn test_detect_fall_rejects_undecodable_image() {
    let app = test_app();

    let response = app
        .oneshot(detect_request("alice", b"this is not a jpeg"))
        .await
        .expect("request succeeds");

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert_eq!(body["code"], "INVALID_IMAGE");
}

#[tokio::test]
async fn test_detect_fall_rejects_blank_user_id() {
    let app = test_app();

    let response = app
        .oneshot(detect_request("   ", &jpeg_frame()))
        .await
        .expect("request succeeds");

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert_eq!(body["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn test_reset_detector_reports_prior_tracking() {
    let app = test_app();

    // Nothing tracked yet
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/v1/reset-detector/alice")
                .body(Body::empty())
                .expect("request builds"),
        )
        .await
        .expect("request succeeds");
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["was_tracked"], false);

    // Score a frame, then reset again
    let response = app
        .clone()
        .oneshot(detect_request("alice", &jpeg_frame()))
        .await
        .expect("request succeeds");
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/v1/reset-detector/alice")
                .body(Body::empty())
                .expect("request builds"),
        )
        .await
        .expect("request succeeds");
    let body = json_body(response).await;
    assert_eq!(body["was_tracked"], true);
    assert_eq!(body["user_id"], "alice");
}

#[tokio::test]
async fn test_camera_session_lifecycle() {
    let app = test_app();

    let start = |app: Router| async move {
        app.oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/v1/start-camera-detection/alice")
                .body(Body::empty())
                .expect("request builds"),
        )
        .await
        .expect("request succeeds")
    };

    let response = start(app.clone()).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["status"], "started");

    // Second start is refused but harmless
    let response = start(app.clone()).await;
    let body = json_body(response).await;
    assert_eq!(body["status"], "already_active");

    // Frames scored during the session are counted
    let response = app
        .clone()
        .oneshot(detect_request("alice", &jpeg_frame()))
        .await
        .expect("request succeeds");
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/v1/stop-camera-detection/alice")
                .body(Body::empty())
                .expect("request builds"),
        )
        .await
        .expect("request succeeds");
    let body = json_body(response).await;
    assert_eq!(body["status"], "stopped");
    assert_eq!(body["frames"], 1);
    assert_eq!(body["falls"], 0);

    // Stopping again reports no active session
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/v1/stop-camera-detection/alice")
                .body(Body::empty())
                .expect("request builds"),
        )
        .await
        .expect("request succeeds");
    let body = json_body(response).await;
    assert_eq!(body["status"], "not_active");
}

#[tokio::test]
async fn test_reset_evicts_camera_session() {
    let app = test_app();

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/v1/start-camera-detection/alice")
                .body(Body::empty())
                .expect("request builds"),
        )
        .await
        .expect("request succeeds");
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/v1/reset-detector/alice")
                .body(Body::empty())
                .expect("request builds"),
        )
        .await
        .expect("request succeeds");
    assert_eq!(response.status(), StatusCode::OK);

    // The reset dropped the session entry along with the detector state
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/v1/stop-camera-detection/alice")
                .body(Body::empty())
                .expect("request builds"),
        )
        .await
        .expect("request succeeds");
    let body = json_body(response).await;
    assert_eq!(body["status"], "not_active");
}

#[tokio::test]
async fn test_health_counts_tracked_people() {
    let app = test_app();

    for user in ["alice", "bob"] {
        let response = app
            .clone()
            .oneshot(detect_request(user, &jpeg_frame()))
            .await
            .expect("request succeeds");
        assert_eq!(response.status(), StatusCode::OK);
    }

    let response = app
        .oneshot(
            Request::builder()
                .uri("/health")
                .body(Body::empty())
                .expect("request builds"),
        )
        .await
        .expect("request succeeds");
    let body = json_body(response).await;
    assert_eq!(body["tracked_people"], 2);
}
