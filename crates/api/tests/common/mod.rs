#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Method, Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use tower::ServiceExt;

use avatar_api::config::ServerConfig;
use avatar_api::router::build_app_router;
use avatar_api::state::AppState;
use avatar_core::assets::FsAssetCheck;
use avatar_core::worker::{RunnerError, WorkerInvocation, WorkerOutput, WorkerRunner};
use avatar_core::{Orchestrator, OrchestratorConfig};

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:7860".to_string()],
        request_timeout_secs: 30,
        json_logs: false,
    }
}

/// Stand-in for the inference program.
///
/// Exits with `exit_code`; on success writes one video per run into the
/// output root. Tracks how many runs overlap.
pub struct FakeWorker {
    pub output_root: PathBuf,
    pub exit_code: i32,
    pub stderr: &'static str,
    pub delay: Duration,
    pub launches: AtomicUsize,
    in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
}

impl FakeWorker {
    pub fn new(output_root: &Path, exit_code: i32, stderr: &'static str) -> Self {
        Self {
            output_root: output_root.to_path_buf(),
            exit_code,
            stderr,
            delay: Duration::ZERO,
            launches: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl WorkerRunner for FakeWorker {
    async fn run(&self, invocation: &WorkerInvocation) -> Result<WorkerOutput, RunnerError> {
        // Host checks (GPU query, package import) find nothing installed.
        if !invocation.command.args.iter().any(|a| a == "--input_file") {
            return Err(RunnerError::Spawn {
                program: invocation.command.program.clone(),
                source: std::io::Error::from(std::io::ErrorKind::NotFound),
            });
        }

        let run = self.launches.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        tokio::time::sleep(self.delay).await;

        if self.exit_code == 0 {
            let path = self.output_root.join(format!("run_{run}/result_{run}.mp4"));
            std::fs::create_dir_all(path.parent().expect("parent"))?;
            std::fs::write(&path, b"video")?;
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        Ok(WorkerOutput {
            stdout: String::new(),
            stderr: self.stderr.to_string(),
            exit_code: self.exit_code,
            duration_ms: 1,
        })
    }
}

/// A temp app root with two uploaded files.
pub struct TestEnv {
    pub dir: tempfile::TempDir,
    pub config: OrchestratorConfig,
    pub image: PathBuf,
    pub audio: PathBuf,
}

impl TestEnv {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("create temp dir");
        let mut config = OrchestratorConfig::with_app_root(dir.path().join("app"));
        config.staging_root = Some(dir.path().join("staging"));
        std::fs::create_dir_all(&config.app_root).expect("create app root");

        let image = dir.path().join("face.png");
        let audio = dir.path().join("voice.wav");
        std::fs::write(&image, b"png").expect("write image");
        std::fs::write(&audio, b"wav").expect("write audio");

        Self {
            dir,
            config,
            image,
            audio,
        }
    }

    pub fn worker(&self, exit_code: i32, stderr: &'static str) -> FakeWorker {
        FakeWorker::new(&self.config.output_root, exit_code, stderr)
    }

    /// App with every model present.
    pub fn app(&self, worker: Arc<FakeWorker>) -> Router {
        let orchestrator = Orchestrator::with_parts(
            self.config.clone(),
            worker,
            Arc::new(FsAssetCheck::new(vec![])),
        );
        build_test_app(orchestrator)
    }

    /// App whose model root is empty.
    pub fn app_without_models(&self, worker: Arc<FakeWorker>) -> Router {
        let orchestrator = Orchestrator::with_parts(
            self.config.clone(),
            worker,
            Arc::new(FsAssetCheck::for_model_root(&self.config.model_root)),
        );
        build_test_app(orchestrator)
    }

    pub fn request_body(&self) -> serde_json::Value {
        serde_json::json!({
            "prompt": "A presenter explaining a chart",
            "image": self.image,
            "audio": self.audio,
        })
    }
}

/// Build the full application router with all middleware layers.
pub fn build_test_app(orchestrator: Orchestrator) -> Router {
    build_app_router(AppState::new(test_config(), orchestrator))
}

pub async fn get(app: Router, uri: &str) -> Response<Body> {
    let request = Request::builder()
        .method(Method::GET)
        .uri(uri)
        .body(Body::empty())
        .expect("build request");
    app.oneshot(request).await.expect("response")
}

pub async fn post_json(app: Router, uri: &str, body: &serde_json::Value) -> Response<Body> {
    post_raw(app, uri, body.to_string()).await
}

pub async fn post_raw(app: Router, uri: &str, body: String) -> Response<Body> {
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body))
        .expect("build request");
    app.oneshot(request).await.expect("response")
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("read body")
        .to_bytes();
    serde_json::from_slice(&bytes).expect("parse JSON body")
}
