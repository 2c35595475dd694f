//! Subprocess execution for the real worker.
//!
//! [`ProcessRunner`] turns a [`WorkerInvocation`] into a
//! [`tokio::process::Command`] and delegates spawn, stream capture and the
//! optional timeout to [`run_command`].

use std::process::Stdio;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;

use super::runner::{RunnerError, WorkerInvocation, WorkerOutput, WorkerRunner};

/// Maximum stdout or stderr size captured per stream (10 MiB).
///
/// Inference runs log progress bars for every denoising step; anything past
/// this limit is dropped.
const MAX_OUTPUT_BYTES: usize = 10 * 1024 * 1024;

/// [`WorkerRunner`] that launches a real child process.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessRunner;

#[async_trait]
impl WorkerRunner for ProcessRunner {
    async fn run(&self, invocation: &WorkerInvocation) -> Result<WorkerOutput, RunnerError> {
        let mut cmd = Command::new(&invocation.command.program);
        cmd.args(&invocation.command.args)
            .env_clear()
            .envs(invocation.env.iter())
            .current_dir(&invocation.working_directory);
        run_command(&mut cmd, invocation.timeout).await
    }
}

/// Spawn `cmd`, capture stdout/stderr, and wait for exit.
///
/// The child runs in its own process group so that a timeout can take down
/// the launcher together with every rank it spawned. With `timeout` set to
/// `None` the wait is unbounded.
pub async fn run_command(
    cmd: &mut Command,
    timeout: Option<Duration>,
) -> Result<WorkerOutput, RunnerError> {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    #[cfg(unix)]
    cmd.process_group(0);

    let program = cmd.as_std().get_program().to_string_lossy().into_owned();
    let start = Instant::now();

    let mut child = cmd
        .spawn()
        .map_err(|source| RunnerError::Spawn { program, source })?;
    // `kill_on_drop` only reaches the direct child; the guard takes down the
    // ranks a launcher spawned if this future is dropped mid-run.
    let mut group = GroupGuard::new(child.id());

    // Read both pipes in spawned tasks so `child.wait()` can borrow `child`.
    let stdout_handle = child.stdout.take();
    let stderr_handle = child.stderr.take();
    let stdout_task = tokio::spawn(async move { read_stream(stdout_handle).await });
    let stderr_task = tokio::spawn(async move { read_stream(stderr_handle).await });

    let status = match timeout {
        Some(limit) => match tokio::time::timeout(limit, child.wait()).await {
            Ok(status) => status?,
            Err(_elapsed) => {
                group.terminate();
                let _ = child.kill().await;
                return Err(RunnerError::Timeout {
                    elapsed_ms: start.elapsed().as_millis() as u64,
                });
            }
        },
        None => child.wait().await?,
    };
    group.disarm();

    let duration_ms = start.elapsed().as_millis() as u64;
    let stdout_bytes = stdout_task.await.unwrap_or_default();
    let stderr_bytes = stderr_task.await.unwrap_or_default();

    Ok(WorkerOutput {
        stdout: String::from_utf8_lossy(&stdout_bytes).into_owned(),
        stderr: String::from_utf8_lossy(&stderr_bytes).into_owned(),
        exit_code: status.code().unwrap_or(-1),
        duration_ms,
    })
}

/// Kills the child's process group when dropped while still armed.
struct GroupGuard {
    pid: Option<u32>,
}

impl GroupGuard {
    fn new(pid: Option<u32>) -> Self {
        Self { pid }
    }

    fn terminate(&mut self) {
        terminate_group(self.pid.take());
    }

    /// The child exited on its own; its group is no longer ours to kill.
    fn disarm(&mut self) {
        self.pid = None;
    }
}

impl Drop for GroupGuard {
    fn drop(&mut self) {
        self.terminate();
    }
}

/// Kill every process in the child's process group.
#[cfg(unix)]
fn terminate_group(pid: Option<u32>) {
    let Some(pid) = pid else {
        return;
    };
    // SAFETY: killpg has no memory-safety preconditions; the group id is the
    // pid of a child we spawned with `process_group(0)`.
    let rc = unsafe { libc::killpg(pid as libc::pid_t, libc::SIGKILL) };
    if rc != 0 {
        tracing::warn!(
            pid,
            error = %std::io::Error::last_os_error(),
            "Failed to kill worker process group",
        );
    }
}

#[cfg(not(unix))]
fn terminate_group(_pid: Option<u32>) {}

/// Read an entire output stream into a byte buffer, capped at [`MAX_OUTPUT_BYTES`].
///
/// Bytes past the cap are still drained so the child never blocks on a full
/// pipe.
async fn read_stream<R: AsyncRead + Unpin>(handle: Option<R>) -> Vec<u8> {
    let mut buf = Vec::new();
    if let Some(mut h) = handle {
        let _ = (&mut h)
            .take(MAX_OUTPUT_BYTES as u64)
            .read_to_end(&mut buf)
            .await;
        let _ = tokio::io::copy(&mut h, &mut tokio::io::sink()).await;
    }
    buf
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use assert_matches::assert_matches;

    use super::*;
    use crate::environment::ProcessEnvironment;
    use crate::plan::WorkerCommand;

    fn bash(script: &str) -> WorkerInvocation {
        WorkerInvocation {
            command: WorkerCommand {
                program: "bash".to_string(),
                args: vec!["-c".to_string(), script.to_string()],
            },
            env: ProcessEnvironment::inherited(),
            working_directory: std::env::temp_dir(),
            timeout: None,
        }
    }

    #[tokio::test]
    async fn captures_stdout_and_stderr() {
        let out = ProcessRunner
            .run(&bash("echo out; echo err >&2"))
            .await
            .expect("run");
        assert_eq!(out.exit_code, 0);
        assert_eq!(out.stdout.trim(), "out");
        assert_eq!(out.stderr.trim(), "err");
    }

    #[tokio::test]
    async fn nonzero_exit_is_reported_not_errored() {
        let out = ProcessRunner
            .run(&bash("echo 'CUDA OOM' >&2; exit 3"))
            .await
            .expect("run");
        assert_eq!(out.exit_code, 3);
        assert!(!out.success());
        assert_eq!(out.stderr.trim(), "CUDA OOM");
    }

    #[tokio::test]
    async fn env_is_exactly_the_given_map() {
        let mut invocation = bash("echo \"[$RANK][$USER]\"");
        invocation.env = [("RANK", "0"), ("PATH", "/usr/bin:/bin")]
            .into_iter()
            .collect();

        let out = ProcessRunner.run(&invocation).await.expect("run");
        assert_eq!(out.stdout.trim(), "[0][]");
    }

    #[tokio::test]
    async fn runs_in_working_directory() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let mut invocation = bash("pwd -P");
        invocation.working_directory = dir.path().to_path_buf();

        let out = ProcessRunner.run(&invocation).await.expect("run");
        let expected = dir.path().canonicalize().expect("canonicalize dir");
        assert_eq!(PathBuf::from(out.stdout.trim()), expected);
    }

    #[tokio::test]
    async fn timeout_kills_worker() {
        let mut invocation = bash("sleep 60");
        invocation.timeout = Some(Duration::from_millis(200));

        let result = ProcessRunner.run(&invocation).await;
        assert_matches!(result, Err(RunnerError::Timeout { .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn non_utf8_env_reaches_child() {
        use std::ffi::OsString;
        use std::os::unix::ffi::OsStringExt;

        let mut invocation = bash("printf '%s' \"$HF_HOME\" | wc -c");
        invocation.env = [
            (OsString::from("HF_HOME"), OsString::from_vec(b"run\xff".to_vec())),
            (OsString::from("PATH"), OsString::from("/usr/bin:/bin")),
        ]
        .into_iter()
        .collect();

        let out = ProcessRunner.run(&invocation).await.expect("run");
        assert_eq!(out.stdout.trim(), "4");
    }

    /// Whether `pid` is gone or only a zombie awaiting reaping.
    #[cfg(target_os = "linux")]
    fn is_dead(pid: u32) -> bool {
        match std::fs::read_to_string(format!("/proc/{pid}/stat")) {
            Err(_) => true,
            Ok(stat) => stat
                .rsplit_once(')')
                .is_some_and(|(_, rest)| rest.trim_start().starts_with(['Z', 'X'])),
        }
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn dropped_run_kills_spawned_ranks() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let pid_file = dir.path().join("rank.pid");
        let script = format!("sleep 60 & echo $! > {}; wait", pid_file.display());
        let invocation = bash(&script);

        let run = ProcessRunner.run(&invocation);
        let pid_file_for_wait = pid_file.clone();
        let outcome = tokio::time::timeout(Duration::from_secs(5), async move {
            tokio::select! {
                _ = run => panic!("worker should still be running"),
                _ = async {
                    while !pid_file_for_wait.exists() {
                        tokio::time::sleep(Duration::from_millis(20)).await;
                    }
                    tokio::time::sleep(Duration::from_millis(50)).await;
                } => {}
            }
        })
        .await;
        assert!(outcome.is_ok(), "rank never started");

        let rank: u32 = std::fs::read_to_string(&pid_file)
            .expect("read pid")
            .trim()
            .parse()
            .expect("pid");
        for _ in 0..50 {
            if is_dead(rank) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!("rank {rank} outlived the dropped run");
    }

    #[tokio::test]
    async fn missing_program_is_spawn_error() {
        let mut invocation = bash("true");
        invocation.command.program = "/nonexistent/worker-binary".to_string();

        let result = ProcessRunner.run(&invocation).await;
        assert_matches!(
            result,
            Err(RunnerError::Spawn { program, .. }) if program == "/nonexistent/worker-binary"
        );
    }
}
