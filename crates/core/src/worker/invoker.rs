//! Worker invocation: launch, log, and classify the exit.
//!
//! The worker is a black box. Its exit code is the only signal interpreted
//! here; stderr is carried verbatim to the operator on failure and there is
//! no retry.

use crate::environment::{
    ENV_LOCAL_RANK, ENV_MASTER_ADDR, ENV_MASTER_PORT, ENV_RANK, ENV_VISIBLE_DEVICES,
    ENV_WORLD_SIZE,
};
use crate::error::GenerationError;
use crate::plan::Topology;

use super::runner::{RunnerError, WorkerInvocation, WorkerOutput, WorkerRunner};

/// Run the worker once and return its captured output.
///
/// A worker that ran to completion yields `Ok` whatever its exit code; use
/// [`ensure_success`] to turn a non-zero exit into
/// [`GenerationError::WorkerFailed`]. Launch failures and timeouts are
/// returned as errors directly.
pub async fn invoke(
    runner: &dyn WorkerRunner,
    invocation: &WorkerInvocation,
    topology: Topology,
) -> Result<WorkerOutput, GenerationError> {
    tracing::info!(command = %invocation.command, "Running inference command");
    if topology.is_local() {
        let env = &invocation.env;
        tracing::info!(
            rank = env.get(ENV_RANK).unwrap_or_default(),
            local_rank = env.get(ENV_LOCAL_RANK).unwrap_or_default(),
            world_size = env.get(ENV_WORLD_SIZE).unwrap_or_default(),
            visible_devices = env.get(ENV_VISIBLE_DEVICES).unwrap_or_default(),
            master_addr = env.get(ENV_MASTER_ADDR).unwrap_or_default(),
            master_port = env.get(ENV_MASTER_PORT).unwrap_or_default(),
            "Local process group",
        );
    } else {
        tracing::info!(nproc_per_node = topology.degree(), "Distributed launch");
    }

    let output = runner.run(invocation).await.map_err(|err| match err {
        RunnerError::Timeout { elapsed_ms } => GenerationError::WorkerTimedOut {
            elapsed_secs: elapsed_ms / 1000,
        },
        other => GenerationError::Unexpected(other.to_string()),
    })?;

    tracing::debug!(stdout = %output.stdout, "Inference stdout");
    if !output.stderr.is_empty() {
        tracing::warn!(stderr = %output.stderr, "Inference stderr");
    }
    tracing::info!(
        exit_code = output.exit_code,
        duration_ms = output.duration_ms,
        "Inference finished",
    );

    Ok(output)
}

/// Map a non-zero exit to [`GenerationError::WorkerFailed`].
pub fn ensure_success(output: &WorkerOutput) -> Result<(), GenerationError> {
    if output.success() {
        Ok(())
    } else {
        Err(GenerationError::WorkerFailed {
            exit_code: output.exit_code,
            stderr: output.stderr.clone(),
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
