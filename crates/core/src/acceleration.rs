//! GPU and attention-kernel availability on the worker host.
//!
//! Both checks go through the same [`WorkerRunner`] as generation: the GPU
//! inventory comes from `nvidia-smi`, and Flash Attention is detected by
//! importing it with the worker's interpreter. Neither check can fail the
//! caller; every problem is folded into a status.

use std::fmt;
use std::path::Path;
use std::time::Duration;

use serde::Serialize;

use crate::environment::ProcessEnvironment;
use crate::plan::WorkerCommand;
use crate::worker::{RunnerError, WorkerInvocation, WorkerOutput, WorkerRunner};

pub const GPU_QUERY_PROGRAM: &str = "nvidia-smi";
pub const GPU_QUERY_ARGS: &[&str] = &[
    "--query-gpu=name,memory.total",
    "--format=csv,noheader,nounits",
];
/// Printed by the driver tool when it runs but finds no device.
const NO_DEVICES_MARKER: &str = "No devices were found";
const FLASH_ATTENTION_IMPORT: &str = "import flash_attn; print(flash_attn.__version__)";
const HOST_CHECK_TIMEOUT: Duration = Duration::from_secs(30);

/// One GPU as reported by the driver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GpuDevice {
    pub name: String,
    pub memory_mib: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum GpuStatus {
    Available { devices: Vec<GpuDevice> },
    NotDetected,
    CheckFailed { reason: String },
}

impl fmt::Display for GpuStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            // Summarised from the first device, the one a local run uses.
            Self::Available { devices } => match devices.first() {
                Some(first) => write!(
                    f,
                    "✅ {}x {} ({:.1}GB)",
                    devices.len(),
                    first.name,
                    first.memory_mib as f64 / 1024.0
                ),
                None => f.write_str("❌ No GPU detected"),
            },
            Self::NotDetected => f.write_str("❌ No GPU detected"),
            Self::CheckFailed { .. } => f.write_str("❌ GPU check failed"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum FlashAttentionStatus {
    Available { version: String },
    Unavailable,
}

impl fmt::Display for FlashAttentionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Available { version } => write!(f, "✅ Flash Attention {version}"),
            Self::Unavailable => f.write_str("❌ Flash Attention not available"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccelerationStatus {
    pub gpu: GpuStatus,
    pub flash_attention: FlashAttentionStatus,
}

/// Parse `nvidia-smi --format=csv,noheader,nounits` output: one
/// `name, memory_mib` line per device.
pub fn parse_gpu_inventory(stdout: &str) -> Result<Vec<GpuDevice>, String> {
    stdout
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| {
            let (name, memory) = line
                .rsplit_once(',')
                .ok_or_else(|| format!("unexpected GPU query line '{line}'"))?;
            let memory_mib = memory
                .trim()
                .parse()
                .map_err(|_| format!("unexpected GPU memory value in '{line}'"))?;
            Ok(GpuDevice {
                name: name.trim().to_string(),
                memory_mib,
            })
        })
        .collect()
}

/// Interpret the GPU query result. A missing driver tool means no GPU.
pub fn gpu_status(result: Result<WorkerOutput, RunnerError>) -> GpuStatus {
    match result {
        Err(RunnerError::Spawn { source, .. })
            if source.kind() == std::io::ErrorKind::NotFound =>
        {
            GpuStatus::NotDetected
        }
        Err(e) => GpuStatus::CheckFailed {
            reason: e.to_string(),
        },
        Ok(output) if output.stdout.contains(NO_DEVICES_MARKER) => GpuStatus::NotDetected,
        Ok(output) if !output.success() => GpuStatus::CheckFailed {
            reason: output.stderr.trim().to_string(),
        },
        Ok(output) => match parse_gpu_inventory(&output.stdout) {
            Ok(devices) if devices.is_empty() => GpuStatus::NotDetected,
            Ok(devices) => GpuStatus::Available { devices },
            Err(reason) => GpuStatus::CheckFailed { reason },
        },
    }
}

/// Interpret the import check. Anything but a clean import is unavailable.
pub fn flash_attention_status(result: Result<WorkerOutput, RunnerError>) -> FlashAttentionStatus {
    match result {
        Ok(output) if output.success() && !output.stdout.trim().is_empty() => {
            FlashAttentionStatus::Available {
                version: output.stdout.trim().to_string(),
            }
        }
        _ => FlashAttentionStatus::Unavailable,
    }
}

fn host_check_invocation(
    program: &str,
    args: Vec<String>,
    working_directory: &Path,
) -> WorkerInvocation {
    WorkerInvocation {
        command: WorkerCommand {
            program: program.to_string(),
            args,
        },
        env: ProcessEnvironment::inherited(),
        working_directory: working_directory.to_path_buf(),
        timeout: Some(HOST_CHECK_TIMEOUT),
    }
}

/// Run both checks concurrently.
pub async fn check_host(
    runner: &dyn WorkerRunner,
    interpreter: &str,
    working_directory: &Path,
) -> AccelerationStatus {
    let gpu_query = host_check_invocation(
        GPU_QUERY_PROGRAM,
        GPU_QUERY_ARGS.iter().map(|a| a.to_string()).collect(),
        working_directory,
    );
    let flash_query = host_check_invocation(
        interpreter,
        vec!["-c".to_string(), FLASH_ATTENTION_IMPORT.to_string()],
        working_directory,
    );

    let (gpu, flash) = tokio::join!(runner.run(&gpu_query), runner.run(&flash_query));
    let status = AccelerationStatus {
        gpu: gpu_status(gpu),
        flash_attention: flash_attention_status(flash),
    };

    if let GpuStatus::CheckFailed { reason } = &status.gpu {
        tracing::warn!(reason = %reason, "GPU check failed");
    }
    tracing::debug!(
        gpu = %status.gpu,
        flash_attention = %status.flash_attention,
        "Checked acceleration status",
    );
    status
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
