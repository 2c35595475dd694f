//! Worker runner capability and shared types.
//!
//! Defines [`WorkerRunner`], the narrow interface through which the
//! orchestrator launches the external inference program, along with
//! [`WorkerInvocation`], [`WorkerOutput`] and [`RunnerError`]. All
//! model-specific behavior stays on the far side of this trait, so the
//! orchestrator can be driven by a fake runner in tests.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::environment::ProcessEnvironment;
use crate::plan::WorkerCommand;

/// Everything needed to launch the worker once.
#[derive(Debug, Clone)]
pub struct WorkerInvocation {
    pub command: WorkerCommand,
    /// Complete child environment; nothing else is inherited.
    pub env: ProcessEnvironment,
    pub working_directory: PathBuf,
    /// Upper bound on the run. `None` waits for the worker indefinitely.
    pub timeout: Option<Duration>,
}

/// Captured result of a worker run that reached exit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerOutput {
    pub stdout: String,
    pub stderr: String,
    /// Process exit code (`-1` if killed by signal).
    pub exit_code: i32,
    pub duration_ms: u64,
}

impl WorkerOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Failures that prevent a worker run from producing an exit status.
#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    #[error("failed to launch worker `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("worker timed out after {elapsed_ms}ms")]
    Timeout { elapsed_ms: u64 },

    #[error("I/O error while waiting for worker: {0}")]
    Io(#[from] std::io::Error),
}

/// Launches the external worker and blocks until it exits.
#[async_trait]
pub trait WorkerRunner: Send + Sync {
    async fn run(&self, invocation: &WorkerInvocation) -> Result<WorkerOutput, RunnerError>;
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
