//! Execution plan: configuration selection, hyperparameter tokens, topology
//! and the worker command line.
//!
//! Hyperparameters are kept as tagged values instead of pre-joined strings
//! so that presence and absence of each conditional token can be checked
//! directly. The worker treats a missing token differently from an explicit
//! default in some cases (the cache threshold in particular), so optional
//! tokens are only emitted when their enabling condition holds.

use std::fmt;
use std::path::{Path, PathBuf};

use crate::request::{GenerationRequest, ModelSize};

/// Parameter-residency budget passed alongside FSDP on the large model.
pub const PERSISTENT_PARAMS_IN_DIT: u64 = 7_000_000_000;

// ---------------------------------------------------------------------------
// Hyperparameters
// ---------------------------------------------------------------------------

/// One `key=value` token of the worker's `--hp` argument.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HyperParam {
    GuidanceScale(f64),
    AudioScale(f64),
    NumSteps(u32),
    MaxTokens(u32),
    OverlapFrame(u32),
    TeaCacheThreshold(f64),
    UseFsdp,
    PersistentParamsInDit(u64),
    SpSize(u32),
    GradientCheckpointing,
}

impl HyperParam {
    pub fn key(&self) -> &'static str {
        match self {
            Self::GuidanceScale(_) => "guidance_scale",
            Self::AudioScale(_) => "audio_scale",
            Self::NumSteps(_) => "num_steps",
            Self::MaxTokens(_) => "max_tokens",
            Self::OverlapFrame(_) => "overlap_frame",
            Self::TeaCacheThreshold(_) => "tea_cache_l1_thresh",
            Self::UseFsdp => "use_fsdp",
            Self::PersistentParamsInDit(_) => "num_persistent_param_in_dit",
            Self::SpSize(_) => "sp_size",
            Self::GradientCheckpointing => "use_gradient_checkpointing",
        }
    }
}

impl fmt::Display for HyperParam {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let key = self.key();
        match *self {
            Self::GuidanceScale(v) | Self::AudioScale(v) | Self::TeaCacheThreshold(v) => {
                write!(f, "{key}={}", format_float(v))
            }
            Self::NumSteps(v) | Self::MaxTokens(v) | Self::OverlapFrame(v) | Self::SpSize(v) => {
                write!(f, "{key}={v}")
            }
            Self::PersistentParamsInDit(v) => write!(f, "{key}={v}"),
            Self::UseFsdp | Self::GradientCheckpointing => write!(f, "{key}=True"),
        }
    }
}

/// Render a float the way the worker's config parser expects: integral
/// values keep one decimal place (`3.0`, not `3`).
fn format_float(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 {
        format!("{value:.1}")
    } else {
        format!("{value}")
    }
}

/// Build the ordered hyperparameter list for a request.
///
/// Mandatory tokens come first in a fixed order, followed by the optional
/// ones, each emitted only when enabled.
pub fn hyperparameters(request: &GenerationRequest) -> Vec<HyperParam> {
    let mut params = vec![
        HyperParam::GuidanceScale(request.guidance_scale),
        HyperParam::AudioScale(request.audio_scale),
        HyperParam::NumSteps(request.num_steps),
        HyperParam::MaxTokens(request.max_tokens),
        HyperParam::OverlapFrame(request.overlap_frame),
    ];

    if request.tea_cache_thresh > 0.0 {
        params.push(HyperParam::TeaCacheThreshold(request.tea_cache_thresh));
    }

    // The small model neither needs nor accepts the sharding knobs.
    if request.use_fsdp && request.model_size == ModelSize::Large {
        params.push(HyperParam::UseFsdp);
        params.push(HyperParam::PersistentParamsInDit(PERSISTENT_PARAMS_IN_DIT));
    }

    if request.sp_size > 1 {
        params.push(HyperParam::SpSize(request.sp_size));
    }

    if request.use_gradient_checkpointing {
        params.push(HyperParam::GradientCheckpointing);
    }

    params
}

/// Comma-joined `--hp` argument value.
pub fn join_hyperparameters(params: &[HyperParam]) -> String {
    params
        .iter()
        .map(HyperParam::to_string)
        .collect::<Vec<_>>()
        .join(",")
}

// ---------------------------------------------------------------------------
// Topology
// ---------------------------------------------------------------------------

/// How many worker processes cooperate on the job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Topology {
    /// One process, launched directly.
    Local,
    /// `n > 1` processes spawned by the distributed launcher.
    Distributed(u32),
}

impl Topology {
    pub fn from_degree(degree: u32) -> Self {
        if degree > 1 {
            Self::Distributed(degree)
        } else {
            Self::Local
        }
    }

    pub fn degree(&self) -> u32 {
        match self {
            Self::Local => 1,
            Self::Distributed(n) => *n,
        }
    }

    pub fn is_local(&self) -> bool {
        matches!(self, Self::Local)
    }
}

// ---------------------------------------------------------------------------
// Command line
// ---------------------------------------------------------------------------

/// Executables involved in launching the worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerPrograms {
    /// Interpreter used for local runs (`python`).
    pub interpreter: String,
    /// The inference entry point.
    pub script: PathBuf,
    /// Distributed launch front-end (`torchrun`).
    pub launcher: String,
}

/// A fully resolved program plus argument vector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerCommand {
    pub program: String,
    pub args: Vec<String>,
}

impl fmt::Display for WorkerCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Plan
// ---------------------------------------------------------------------------

/// Everything derived from a validated request before the worker runs.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionPlan {
    pub model_size: ModelSize,
    /// Worker configuration file for the selected model size.
    pub config_file: PathBuf,
    pub hyperparameters: Vec<HyperParam>,
    pub topology: Topology,
}

impl ExecutionPlan {
    /// Derive a plan from a validated request.
    pub fn build(request: &GenerationRequest, config_dir: &Path) -> Self {
        Self {
            model_size: request.model_size,
            config_file: config_dir.join(request.model_size.config_file_name()),
            hyperparameters: hyperparameters(request),
            topology: Topology::from_degree(request.sp_size),
        }
    }

    /// Whether a token with `key` is part of the plan.
    pub fn has_param(&self, key: &str) -> bool {
        self.hyperparameters.iter().any(|p| p.key() == key)
    }

    /// The worker command line for this plan, reading its request
    /// descriptor from `input_file`.
    ///
    /// Local: `<interpreter> <script> --config .. --input_file .. --hp ..`
    ///
    /// Distributed: `<launcher> --standalone --nproc_per_node=<n> <script> ..`
    pub fn command(&self, programs: &WorkerPrograms, input_file: &Path) -> WorkerCommand {
        let mut args = Vec::new();
        let program = match self.topology {
            Topology::Local => programs.interpreter.clone(),
            Topology::Distributed(degree) => {
                args.push("--standalone".to_string());
                args.push(format!("--nproc_per_node={degree}"));
                programs.launcher.clone()
            }
        };

        args.push(programs.script.display().to_string());
        args.push("--config".to_string());
        args.push(self.config_file.display().to_string());
        args.push("--input_file".to_string());
        args.push(input_file.display().to_string());
        args.push("--hp".to_string());
        args.push(join_hyperparameters(&self.hyperparameters));

        WorkerCommand { program, args }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
