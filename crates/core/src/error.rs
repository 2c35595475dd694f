//! Error taxonomy for a single generation job.
//!
//! The [`std::fmt::Display`] output of every [`GenerationError`] variant is
//! the status message shown to the operator, so the wording here is part of
//! the public contract.

use std::path::{Path, PathBuf};

/// Which of the two required uploads is absent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKind {
    Image,
    Audio,
}

impl InputKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Audio => "audio",
        }
    }
}

/// A request parameter outside its accepted domain.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ParameterError {
    #[error(
        "Error: overlap_frame must be of form 1 + 4×n (like 1, 5, 9, 13, 17, 21, 25). Got: {value}"
    )]
    OverlapFrame { value: u32 },

    #[error("Error: {name} must be at least 1. Got: {value}")]
    BelowOne { name: &'static str, value: u32 },

    #[error("Error: {name} must be a finite number. Got: {value}")]
    NotFinite { name: &'static str, value: f64 },

    #[error("Error: {name} must not be negative. Got: {value}")]
    Negative { name: &'static str, value: f64 },
}

/// Every way a generation request can end without an artifact.
#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error(
        "Missing models: {}\nPlease ensure models are properly mounted and downloaded.",
        join_paths(.missing)
    )]
    MissingDependency { missing: Vec<PathBuf> },

    #[error("Please upload an {} file", input_name(.0))]
    MissingInput(InputKind),

    #[error(transparent)]
    InvalidParameter(#[from] ParameterError),

    #[error("Error during inference:\n{stderr}")]
    WorkerFailed { exit_code: i32, stderr: String },

    #[error("Error during inference:\nworker timed out after {elapsed_secs}s")]
    WorkerTimedOut { elapsed_secs: u64 },

    #[error("No {} directory found", dir_name(.path))]
    NoOutputArea { path: PathBuf },

    #[error("No output video generated. Check logs for errors.")]
    NoArtifact { path: PathBuf },

    #[error("Error: {0}")]
    Unexpected(String),
}

impl GenerationError {
    /// Short machine-readable tag, used in logs and API payloads.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MissingDependency { .. } => "missing_dependency",
            Self::MissingInput(_) => "missing_input",
            Self::InvalidParameter(_) => "invalid_parameter",
            Self::WorkerFailed { .. } => "worker_failed",
            Self::WorkerTimedOut { .. } => "worker_timed_out",
            Self::NoOutputArea { .. } => "no_output_area",
            Self::NoArtifact { .. } => "no_artifact",
            Self::Unexpected(_) => "unexpected_failure",
        }
    }

    /// Wrap an I/O failure with the path it concerned.
    pub fn io(context: &str, path: &Path, err: std::io::Error) -> Self {
        Self::Unexpected(format!("{context} {}: {err}", path.display()))
    }
}

fn join_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

fn input_name(kind: &InputKind) -> &'static str {
    kind.as_str()
}

fn dir_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
