//! Integration tests for the generation and system status endpoints.

mod common;

use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;
use common::{body_json, get, post_json, post_raw, TestEnv};

// ---------------------------------------------------------------------------
// POST /api/v1/generations
// ---------------------------------------------------------------------------

#[tokio::test]
async fn successful_generation_returns_video_path() {
    let env = TestEnv::new();
    let worker = Arc::new(env.worker(0, ""));
    let app = env.app(worker.clone());

    let response = post_json(app, "/api/v1/generations", &env.request_body()).await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    let data = &json["data"];
    assert_eq!(data["succeeded"], true);
    assert_eq!(data["status"], "Video generated successfully!");
    assert!(data["error_kind"].is_null());

    let path = PathBuf::from(data["video_path"].as_str().expect("video path"));
    assert_eq!(path, env.config.persist_root.join("generated_result_0.mp4"));
    assert!(path.exists());
    assert_eq!(worker.launches.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn missing_image_is_reported_in_body() {
    let env = TestEnv::new();
    let worker = Arc::new(env.worker(0, ""));
    let app = env.app(worker.clone());

    let mut body = env.request_body();
    body.as_object_mut().expect("object").remove("image");
    let response = post_json(app, "/api/v1/generations", &body).await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["data"]["succeeded"], false);
    assert_eq!(json["data"]["status"], "Please upload an image file");
    assert_eq!(json["data"]["error_kind"], "missing_input");
    assert!(json["data"]["video_path"].is_null());
    assert_eq!(worker.launches.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn invalid_overlap_is_reported_in_body() {
    let env = TestEnv::new();
    let worker = Arc::new(env.worker(0, ""));
    let app = env.app(worker.clone());

    let mut body = env.request_body();
    body["overlap_frame"] = serde_json::json!(10);
    let json = body_json(post_json(app, "/api/v1/generations", &body).await).await;

    assert_eq!(json["data"]["error_kind"], "invalid_parameter");
    assert_eq!(
        json["data"]["status"],
        "Error: overlap_frame must be of form 1 + 4×n (like 1, 5, 9, 13, 17, 21, 25). Got: 10"
    );
    assert_eq!(worker.launches.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn worker_failure_is_reported_in_body() {
    let env = TestEnv::new();
    let app = env.app(Arc::new(env.worker(1, "CUDA OOM")));

    let json = body_json(post_json(app, "/api/v1/generations", &env.request_body()).await).await;

    assert_eq!(json["data"]["succeeded"], false);
    assert_eq!(json["data"]["status"], "Error during inference:\nCUDA OOM");
    assert_eq!(json["data"]["error_kind"], "worker_failed");
}

#[tokio::test]
async fn missing_models_are_reported_in_body() {
    let env = TestEnv::new();
    let worker = Arc::new(env.worker(0, ""));
    let app = env.app_without_models(worker.clone());

    let json = body_json(post_json(app, "/api/v1/generations", &env.request_body()).await).await;

    assert_eq!(json["data"]["error_kind"], "missing_dependency");
    let status = json["data"]["status"].as_str().expect("status");
    assert!(status.starts_with("Missing models: "));
    assert!(status.ends_with("Please ensure models are properly mounted and downloaded."));
    assert_eq!(worker.launches.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn malformed_body_is_bad_request() {
    let env = TestEnv::new();
    let app = env.app(Arc::new(env.worker(0, "")));

    let response = post_raw(app, "/api/v1/generations", "{not json".to_string()).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let json = body_json(response).await;
    assert_eq!(json["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn unknown_model_size_is_bad_request() {
    let env = TestEnv::new();
    let app = env.app(Arc::new(env.worker(0, "")));

    let mut body = env.request_body();
    body["model_size"] = serde_json::json!("7B");
    let response = post_json(app, "/api/v1/generations", &body).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert!(json["error"].as_str().expect("message").contains("7B"));
}

#[tokio::test]
async fn concurrent_generations_do_not_overlap() {
    let env = TestEnv::new();
    let mut worker = env.worker(0, "");
    worker.delay = Duration::from_millis(100);
    let worker = Arc::new(worker);
    let app = env.app(worker.clone());

    let body = env.request_body();
    let (a, b) = tokio::join!(
        post_json(app.clone(), "/api/v1/generations", &body),
        post_json(app, "/api/v1/generations", &body),
    );
    let (a, b) = (body_json(a).await, body_json(b).await);

    assert_eq!(a["data"]["succeeded"], true);
    assert_eq!(b["data"]["succeeded"], true);
    assert_ne!(a["data"]["video_path"], b["data"]["video_path"]);
    assert_eq!(worker.launches.load(Ordering::SeqCst), 2);
    assert_eq!(worker.max_in_flight.load(Ordering::SeqCst), 1);
}

// ---------------------------------------------------------------------------
// GET /api/v1/system/status
// ---------------------------------------------------------------------------

#[tokio::test]
async fn status_reports_ready_models() {
    let env = TestEnv::new();
    let app = env.app(Arc::new(env.worker(0, "")));

    let response = get(app, "/api/v1/system/status").await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["data"]["models_ready"], true);
    assert_eq!(json["data"]["missing_models"], serde_json::json!([]));
}

#[tokio::test]
async fn status_reports_missing_acceleration() {
    let env = TestEnv::new();
    let worker = Arc::new(env.worker(0, ""));
    let app = env.app(worker.clone());

    let json = body_json(get(app, "/api/v1/system/status").await).await;

    let acceleration = &json["data"]["acceleration"];
    assert_eq!(acceleration["gpu_summary"], "❌ No GPU detected");
    assert_eq!(acceleration["gpu"]["state"], "not_detected");
    assert_eq!(
        acceleration["flash_attention_summary"],
        "❌ Flash Attention not available"
    );
    assert_eq!(acceleration["flash_attention"]["state"], "unavailable");
    // Host checks are not counted as generation launches.
    assert_eq!(worker.launches.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn status_lists_missing_models() {
    let env = TestEnv::new();
    let app = env.app_without_models(Arc::new(env.worker(0, "")));

    let json = body_json(get(app, "/api/v1/system/status").await).await;

    assert_eq!(json["data"]["models_ready"], false);
    let missing = json["data"]["missing_models"].as_array().expect("array");
    assert_eq!(missing.len(), 5);
    assert!(missing
        .iter()
        .any(|p| p.as_str().is_some_and(|s| s.ends_with("wav2vec2-base-960h"))));
}
