//! Handlers for avatar video generation.
//!
//! Routes:
//! - `POST /generations` -- run one generation to completion

use std::path::PathBuf;

use avatar_core::{GenerationRequest, JobResult};
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::error::{AppError, AppResult};
use crate::response::DataResponse;
use crate::state::AppState;

/// Outcome of a generation, success or not.
#[derive(Debug, Serialize)]
pub struct GenerationResponse {
    /// Persisted video, present only on success.
    pub video_path: Option<PathBuf>,
    /// Operator-facing status line.
    pub status: String,
    pub succeeded: bool,
    /// Machine-readable failure category, absent on success.
    pub error_kind: Option<&'static str>,
}

impl From<JobResult> for GenerationResponse {
    fn from(result: JobResult) -> Self {
        Self {
            succeeded: result.succeeded(),
            error_kind: result.error.as_ref().map(|e| e.kind()),
            video_path: result.artifact,
            status: result.status,
        }
    }
}

/// POST /api/v1/generations
///
/// Waits for any running generation to finish, then runs this one. Every
/// orchestrator outcome is a 200; `succeeded` and `status` tell them apart.
/// The job runs on its own task so a dropped connection does not kill the
/// worker halfway through.
pub async fn create_generation(
    State(state): State<AppState>,
    body: Result<Json<GenerationRequest>, JsonRejection>,
) -> AppResult<Json<DataResponse<GenerationResponse>>> {
    let Json(request) = body?;

    let guard = state.generation_lock.clone().lock_owned().await;
    let orchestrator = state.orchestrator.clone();

    tracing::info!(
        model_size = %request.model_size,
        sp_size = request.sp_size,
        num_steps = request.num_steps,
        "Starting generation",
    );

    let result = tokio::spawn(async move {
        let result = orchestrator.generate(&request).await;
        drop(guard);
        result
    })
    .await
    .map_err(|e| AppError::InternalError(format!("generation task failed: {e}")))?;

    Ok(Json(DataResponse {
        data: GenerationResponse::from(result),
    }))
}
