//! Handlers for worker readiness.
//!
//! Routes:
//! - `GET /system/status` -- missing model directories and acceleration status

use std::path::PathBuf;

use avatar_core::acceleration::{FlashAttentionStatus, GpuStatus};
use avatar_core::AccelerationStatus;
use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::response::DataResponse;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct SystemStatus {
    /// True when every required model directory is present.
    pub models_ready: bool,
    pub missing_models: Vec<PathBuf>,
    pub acceleration: AccelerationReport,
}

/// Acceleration status with one-line summaries for display.
#[derive(Debug, Serialize)]
pub struct AccelerationReport {
    pub gpu_summary: String,
    pub flash_attention_summary: String,
    pub gpu: GpuStatus,
    pub flash_attention: FlashAttentionStatus,
}

impl From<AccelerationStatus> for AccelerationReport {
    fn from(status: AccelerationStatus) -> Self {
        Self {
            gpu_summary: status.gpu.to_string(),
            flash_attention_summary: status.flash_attention.to_string(),
            gpu: status.gpu,
            flash_attention: status.flash_attention,
        }
    }
}

/// GET /api/v1/system/status
pub async fn get_status(State(state): State<AppState>) -> Json<DataResponse<SystemStatus>> {
    let missing_models = state.orchestrator.missing_assets();
    let acceleration = state.orchestrator.acceleration_status().await;
    Json(DataResponse {
        data: SystemStatus {
            models_ready: missing_models.is_empty(),
            missing_models,
            acceleration: acceleration.into(),
        },
    })
}
