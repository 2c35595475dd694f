//! Orchestrator configuration.
//!
//! Defaults mirror the container layout the worker ships in (everything
//! under `/app`). Individual locations can be overridden via environment
//! variables; paths not overridden are derived from `AVATAR_APP_ROOT`.

use std::path::PathBuf;
use std::time::Duration;

use crate::environment::LocalRendezvous;
use crate::plan::WorkerPrograms;

pub const DEFAULT_APP_ROOT: &str = "/app";
pub const DEFAULT_INTERPRETER: &str = "python";
pub const DEFAULT_LAUNCHER: &str = "torchrun";

/// An environment variable that is set but cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{key} must be {expected}, got '{value}'")]
pub struct ConfigError {
    pub key: &'static str,
    pub expected: &'static str,
    pub value: String,
}

/// Locations and launch settings for the generation worker.
#[derive(Debug, Clone, PartialEq)]
pub struct OrchestratorConfig {
    /// Working directory of the worker.
    pub app_root: PathBuf,
    pub programs: WorkerPrograms,
    /// Directory holding `inference.yaml` and `inference_1.3B.yaml`.
    pub config_dir: PathBuf,
    /// Root of the pretrained model directories.
    pub model_root: PathBuf,
    /// Shared tree the worker writes its videos into.
    pub output_root: PathBuf,
    /// Where resolved videos are copied for safekeeping.
    pub persist_root: PathBuf,
    /// Parent of per-request staging directories (system temp dir if `None`).
    pub staging_root: Option<PathBuf>,
    pub rendezvous: LocalRendezvous,
    /// Upper bound on a worker run; `None` waits indefinitely.
    pub worker_timeout: Option<Duration>,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self::with_app_root(PathBuf::from(DEFAULT_APP_ROOT))
    }
}

impl OrchestratorConfig {
    /// Standard layout rooted at `app_root`.
    pub fn with_app_root(app_root: PathBuf) -> Self {
        Self {
            programs: WorkerPrograms {
                interpreter: DEFAULT_INTERPRETER.to_string(),
                script: app_root.join("scripts/inference.py"),
                launcher: DEFAULT_LAUNCHER.to_string(),
            },
            config_dir: app_root.join("configs"),
            model_root: app_root.join("pretrained_models"),
            output_root: app_root.join("demo_out"),
            persist_root: app_root.join("outputs"),
            staging_root: None,
            rendezvous: LocalRendezvous::default(),
            worker_timeout: None,
            app_root,
        }
    }

    /// Load configuration from the process environment.
    ///
    /// | Env Var                      | Default                           |
    /// |------------------------------|-----------------------------------|
    /// | `AVATAR_APP_ROOT`            | `/app`                            |
    /// | `AVATAR_PYTHON`              | `python`                          |
    /// | `AVATAR_INFERENCE_SCRIPT`    | `<app_root>/scripts/inference.py` |
    /// | `AVATAR_LAUNCHER`            | `torchrun`                        |
    /// | `AVATAR_CONFIG_DIR`          | `<app_root>/configs`              |
    /// | `AVATAR_MODEL_ROOT`          | `<app_root>/pretrained_models`    |
    /// | `AVATAR_OUTPUT_ROOT`         | `<app_root>/demo_out`             |
    /// | `AVATAR_PERSIST_ROOT`        | `<app_root>/outputs`              |
    /// | `AVATAR_STAGING_ROOT`        | system temp dir                   |
    /// | `AVATAR_MASTER_ADDR`         | `127.0.0.1`                       |
    /// | `AVATAR_MASTER_PORT`         | `12345`                           |
    /// | `AVATAR_DEFAULT_DEVICES`     | `0`                               |
    /// | `AVATAR_WORKER_TIMEOUT_SECS` | unset (no timeout)                |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let app_root = get("AVATAR_APP_ROOT")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_APP_ROOT));
        let mut config = Self::with_app_root(app_root);

        if let Some(v) = get("AVATAR_PYTHON") {
            config.programs.interpreter = v;
        }
        if let Some(v) = get("AVATAR_INFERENCE_SCRIPT") {
            config.programs.script = PathBuf::from(v);
        }
        if let Some(v) = get("AVATAR_LAUNCHER") {
            config.programs.launcher = v;
        }
        if let Some(v) = get("AVATAR_CONFIG_DIR") {
            config.config_dir = PathBuf::from(v);
        }
        if let Some(v) = get("AVATAR_MODEL_ROOT") {
            config.model_root = PathBuf::from(v);
        }
        if let Some(v) = get("AVATAR_OUTPUT_ROOT") {
            config.output_root = PathBuf::from(v);
        }
        if let Some(v) = get("AVATAR_PERSIST_ROOT") {
            config.persist_root = PathBuf::from(v);
        }
        config.staging_root = get("AVATAR_STAGING_ROOT").map(PathBuf::from);

        if let Some(v) = get("AVATAR_MASTER_ADDR") {
            config.rendezvous.master_addr = v;
        }
        if let Some(v) = get("AVATAR_MASTER_PORT") {
            config.rendezvous.master_port = v.trim().parse().map_err(|_| ConfigError {
                key: "AVATAR_MASTER_PORT",
                expected: "a valid port number",
                value: v.clone(),
            })?;
        }
        if let Some(v) = get("AVATAR_DEFAULT_DEVICES") {
            config.rendezvous.default_devices = v;
        }
        if let Some(v) = get("AVATAR_WORKER_TIMEOUT_SECS") {
            let secs: u64 = v.trim().parse().map_err(|_| ConfigError {
                key: "AVATAR_WORKER_TIMEOUT_SECS",
                expected: "a whole number of seconds",
                value: v.clone(),
            })?;
            config.worker_timeout = (secs > 0).then(|| Duration::from_secs(secs));
        }

        Ok(config)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
