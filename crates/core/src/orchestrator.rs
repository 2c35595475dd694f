//! Generation job orchestrator.
//!
//! [`Orchestrator::generate`] runs one request end to end, strictly in order:
//!
//! 1. Validate the request (uploads, parameters, model assets).
//! 2. Build the execution plan (config file, hyperparameters, topology).
//! 3. Stage inputs and the request descriptor in a per-request temp dir.
//! 4. Compose the worker environment for the topology.
//! 5. Run the worker and wait for it to exit.
//! 6. Resolve and persist the newest output video.
//!
//! The call never fails: every outcome is folded into a [`JobResult`]
//! carrying either an artifact path or a status message explaining why
//! there is none. Calls are not coordinated with each other; two
//! concurrent jobs share the output tree and may pick up each other's
//! videos.

use std::path::PathBuf;
use std::sync::Arc;

use crate::acceleration::{self, AccelerationStatus};
use crate::artifact;
use crate::assets::{AssetCheck, FsAssetCheck};
use crate::config::OrchestratorConfig;
use crate::environment::{self, ProcessEnvironment};
use crate::error::GenerationError;
use crate::plan::ExecutionPlan;
use crate::request::GenerationRequest;
use crate::staging::StagingArea;
use crate::validation;
use crate::worker::{self, ProcessRunner, WorkerInvocation, WorkerOutput, WorkerRunner};

/// Status message for a successful run.
pub const SUCCESS_MESSAGE: &str = "Video generated successfully!";

/// Outcome of one [`Orchestrator::generate`] call.
#[derive(Debug)]
pub struct JobResult {
    /// Persisted video, present only on success.
    pub artifact: Option<PathBuf>,
    /// Operator-facing status line.
    pub status: String,
    /// Captured worker output, present whenever the worker ran to exit.
    pub worker: Option<WorkerOutput>,
    /// Failure cause, absent on success.
    pub error: Option<GenerationError>,
}

impl JobResult {
    pub fn succeeded(&self) -> bool {
        self.artifact.is_some()
    }

    /// The `(artifact, status)` pair rendered by the presentation layer.
    pub fn into_pair(self) -> (Option<PathBuf>, String) {
        (self.artifact, self.status)
    }
}

/// Composes validation, planning, staging, worker invocation and artifact
/// resolution behind a single call.
pub struct Orchestrator {
    config: OrchestratorConfig,
    runner: Arc<dyn WorkerRunner>,
    assets: Arc<dyn AssetCheck>,
}

impl Orchestrator {
    /// Production wiring: real subprocesses and filesystem asset checks.
    pub fn new(config: OrchestratorConfig) -> Self {
        let assets = Arc::new(FsAssetCheck::for_model_root(&config.model_root));
        Self::with_parts(config, Arc::new(ProcessRunner), assets)
    }

    /// Wiring with explicit collaborators.
    pub fn with_parts(
        config: OrchestratorConfig,
        runner: Arc<dyn WorkerRunner>,
        assets: Arc<dyn AssetCheck>,
    ) -> Self {
        Self {
            config,
            runner,
            assets,
        }
    }

    /// Model assets that are currently absent.
    pub fn missing_assets(&self) -> Vec<PathBuf> {
        self.assets.missing()
    }

    /// GPU inventory and Flash Attention availability on this host.
    pub async fn acceleration_status(&self) -> AccelerationStatus {
        acceleration::check_host(
            self.runner.as_ref(),
            &self.config.programs.interpreter,
            &self.config.app_root,
        )
        .await
    }

    /// Run one generation request to completion.
    pub async fn generate(&self, request: &GenerationRequest) -> JobResult {
        let mut worker_output = None;
        match self.run(request, &mut worker_output).await {
            Ok(persisted) => {
                tracing::info!(artifact = %persisted.display(), "Generation succeeded");
                JobResult {
                    artifact: Some(persisted),
                    status: SUCCESS_MESSAGE.to_string(),
                    worker: worker_output,
                    error: None,
                }
            }
            Err(err) => {
                tracing::warn!(kind = err.kind(), error = %err, "Generation did not produce a video");
                JobResult {
                    artifact: None,
                    status: err.to_string(),
                    worker: worker_output,
                    error: Some(err),
                }
            }
        }
    }

    async fn run(
        &self,
        request: &GenerationRequest,
        worker_output: &mut Option<WorkerOutput>,
    ) -> Result<PathBuf, GenerationError> {
        validation::validate(request, self.assets.as_ref())?;

        // Validation guarantees both uploads are present.
        let (Some(image), Some(audio)) = (request.image.as_deref(), request.audio.as_deref())
        else {
            return Err(GenerationError::Unexpected(
                "validated request lost its inputs".to_string(),
            ));
        };

        let plan = ExecutionPlan::build(request, &self.config.config_dir);
        tracing::debug!(
            model_size = %plan.model_size,
            topology = ?plan.topology,
            config_file = %plan.config_file.display(),
            "Built execution plan",
        );

        let staging = StagingArea::prepare(
            self.config.staging_root.as_deref(),
            &request.prompt,
            image,
            audio,
        )
        .await?;
        tracing::debug!(
            staging = %staging.path().display(),
            image = %staging.image().display(),
            audio = %staging.audio().display(),
            "Staged inputs",
        );

        let invocation = WorkerInvocation {
            command: plan.command(&self.config.programs, staging.descriptor()),
            env: environment::compose(
                plan.topology,
                &ProcessEnvironment::inherited(),
                &self.config.rendezvous,
            ),
            working_directory: self.config.app_root.clone(),
            timeout: self.config.worker_timeout,
        };

        let output = worker::invoke(self.runner.as_ref(), &invocation, plan.topology).await?;
        let outcome = worker::ensure_success(&output);
        *worker_output = Some(output);
        outcome?;

        let resolved = artifact::resolve(&self.config.output_root, &self.config.persist_root)?;

        // Staged inputs must stay readable until the worker has exited.
        drop(staging);

        Ok(resolved.persisted)
    }
}
