//! Subprocess backend: one restricted interpreter process per execution

use super::context::SandboxContext;
use super::harness::{self, HarnessPolicy};
use super::outcome::{RunOutcome, Termination};
use super::pipeline::Pipeline;
use super::Sandbox;
use crate::config::SandboxConfig;
use crate::error::{SandboxError, SandboxResult};
use crate::limits::apply_process_limits;
use crate::models::{ExecutionRequest, ExecutionResult, FilesystemAccess, SandboxKind};
use crate::monitor::{ExecutionMonitor, Interruption, ProcessProbe, spawn_sampler};
use async_trait::async_trait;
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Interval between memory samples of the guest process
const SAMPLE_INTERVAL: Duration = Duration::from_millis(50);

/// How long stream readers may keep draining after the process is gone
const READER_GRACE: Duration = Duration::from_secs(2);

/// Bound for the interpreter probe run by `initialize`
const PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// Bytes kept per stream on top of the configured output size
const CAPTURE_SLACK: usize = 64 * 1024;

/// Runs guest code in a fresh `python3` subprocess.
///
/// The harness swaps the guest's built-ins for an enumerated allow-list, the
/// process gets POSIX rlimits and its own process group, and on timeout or
/// cancellation the whole group is killed with SIGKILL.
pub struct LocalSandbox {
    config: Arc<SandboxConfig>,
    pipeline: Pipeline,
    initialized: AtomicBool,
}

impl LocalSandbox {
    pub fn new(config: Arc<SandboxConfig>, context: SandboxContext) -> SandboxResult<Self> {
        let pipeline = Pipeline::new(SandboxKind::Local, &config, context)?;
        Ok(Self {
            config,
            pipeline,
            initialized: AtomicBool::new(false),
        })
    }

    pub fn config(&self) -> &SandboxConfig {
        &self.config
    }

    async fn ensure_initialized(&self) -> SandboxResult<()> {
        if self.is_initialized() {
            return Ok(());
        }
        self.initialize().await
    }

    async fn run(
        &self,
        request: &ExecutionRequest,
        monitor: Arc<ExecutionMonitor>,
        cancel: &CancellationToken,
    ) -> SandboxResult<RunOutcome> {
        self.ensure_initialized().await?;

        let workspace = self
            .pipeline
            .context()
            .temp_files
            .create_workspace(self.pipeline.owner())?;
        let policy = HarnessPolicy::new(&self.config, true);
        let staged = harness::stage(&workspace, request, policy, workspace.path(), false)?;

        let working_dir = match (&request.filesystem_access, &request.working_dir) {
            (FilesystemAccess::Full, Some(dir)) => dir.clone(),
            _ => workspace.path().to_path_buf(),
        };

        let mut cmd = Command::new(&self.config.python_executable);
        cmd.args(staged.interpreter_args())
            .current_dir(&working_dir)
            .env_clear()
            .env("HOME", workspace.path())
            .env("LANG", "C.UTF-8")
            .envs(&request.env_vars)
            .stdin(if request.input_data.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(path) = std::env::var_os("PATH") {
            cmd.env("PATH", path);
        }
        #[cfg(unix)]
        cmd.process_group(0);
        apply_process_limits(&mut cmd, &self.pipeline.limiter().process_limits(request));

        let mut child = cmd.spawn().map_err(|e| {
            SandboxError::SpawnFailed(format!("{}: {}", self.config.python_executable, e))
        })?;
        let pid = child.id();
        tracing::debug!(pid, workspace = %workspace.path().display(), "Spawned guest process");

        if let (Some(mut stdin), Some(input)) = (child.stdin.take(), request.input_data.clone()) {
            tokio::spawn(async move {
                if let Err(e) = stdin.write_all(input.as_bytes()).await {
                    tracing::debug!("Guest closed stdin early: {}", e);
                }
            });
        }

        let cap = self.config.max_output_size.saturating_mul(4) + CAPTURE_SLACK;
        let stdout_task = child.stdout.take().map(|s| spawn_reader(s, cap));
        let stderr_task = child.stderr.take().map(|s| spawn_reader(s, cap));

        let sampler = pid.map(|pid| {
            let mut probe = ProcessProbe::new(pid);
            spawn_sampler(Arc::clone(&monitor), SAMPLE_INTERVAL, move || {
                let snapshot = probe.sample();
                async move { snapshot }
            })
        });

        let timeout = self.pipeline.limiter().timeout(request);
        let waited = self
            .pipeline
            .timeouts()
            .run_cancellable(timeout, child.wait(), cancel, None)
            .await;

        let termination = match waited {
            Ok(Ok(status)) => Ok(termination_of(status)),
            Ok(Err(e)) => Err(SandboxError::Io(e)),
            Err(Interruption::TimedOut(limit)) => Ok(Termination::TimedOut(limit)),
            Err(Interruption::Cancelled) => {
                monitor.cancel();
                Ok(Termination::Cancelled)
            }
        };

        // Reap the whole group on every path so no descendant keeps a pipe open
        kill_group(pid, &mut child).await;
        if let Some(sampler) = sampler {
            sampler.stop().await;
        }

        let stdout = collect(stdout_task).await;
        let stderr = collect(stderr_task).await;
        drop(workspace);

        Ok(RunOutcome::new(termination?, stdout, stderr).with_peak_memory(monitor.peak_memory()))
    }

    async fn probe_interpreter(&self) -> SandboxResult<String> {
        let output = tokio::time::timeout(
            PROBE_TIMEOUT,
            Command::new(&self.config.python_executable)
                .args(["-I", "-c", "import sys; print('%d.%d' % sys.version_info[:2])"])
                .stdin(Stdio::null())
                .kill_on_drop(true)
                .output(),
        )
        .await
        .map_err(|_| SandboxError::Timeout(PROBE_TIMEOUT))?
        .map_err(|e| {
            SandboxError::InitializationFailed(format!(
                "cannot run {}: {}",
                self.config.python_executable, e
            ))
        })?;

        let version = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if !output.status.success() || !version.starts_with("3.") {
            return Err(SandboxError::InitializationFailed(format!(
                "{} is not a Python 3 interpreter",
                self.config.python_executable
            )));
        }
        Ok(version)
    }
}

#[async_trait]
impl Sandbox for LocalSandbox {
    fn kind(&self) -> SandboxKind {
        SandboxKind::Local
    }

    async fn initialize(&self) -> SandboxResult<()> {
        tokio::fs::create_dir_all(self.pipeline.context().temp_files.root()).await?;
        let version = self.probe_interpreter().await?;
        self.initialized.store(true, Ordering::SeqCst);
        tracing::info!(
            "Local sandbox initialized with {} (Python {})",
            self.config.python_executable,
            version
        );
        Ok(())
    }

    async fn execute_cancellable(
        &self,
        request: &ExecutionRequest,
        cancel: &CancellationToken,
    ) -> ExecutionResult {
        self.pipeline
            .execute(request, move |clamped, monitor| async move {
                self.run(&clamped, monitor, cancel).await
            })
            .await
    }

    async fn cleanup(&self) -> SandboxResult<()> {
        let removed = self
            .pipeline
            .context()
            .temp_files
            .release_owned(self.pipeline.owner());
        self.initialized.store(false, Ordering::SeqCst);
        tracing::debug!("Local sandbox cleaned up {} workspaces", removed);
        Ok(())
    }

    async fn health_check(&self) -> bool {
        match self.probe_interpreter().await {
            Ok(_) => true,
            Err(e) => {
                tracing::warn!("Local sandbox health check failed: {}", e);
                false
            }
        }
    }

    fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::SeqCst)
    }
}

fn spawn_reader<R>(reader: R, cap: usize) -> JoinHandle<Vec<u8>>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(read_bounded(reader, cap))
}

/// Read `reader` to EOF, keeping at most `cap` bytes
async fn read_bounded<R: AsyncRead + Unpin>(mut reader: R, cap: usize) -> Vec<u8> {
    let mut kept = Vec::new();
    let mut chunk = [0u8; 8192];
    loop {
        match reader.read(&mut chunk).await {
            Ok(0) => break,
            Ok(n) => {
                let room = cap.saturating_sub(kept.len());
                kept.extend_from_slice(&chunk[..n.min(room)]);
            }
            Err(e) => {
                tracing::debug!("Stream read failed: {}", e);
                break;
            }
        }
    }
    kept
}

async fn collect(task: Option<JoinHandle<Vec<u8>>>) -> String {
    let Some(task) = task else {
        return String::new();
    };
    match tokio::time::timeout(READER_GRACE, task).await {
        Ok(Ok(bytes)) => String::from_utf8_lossy(&bytes).into_owned(),
        Ok(Err(e)) => {
            tracing::debug!("Stream reader failed: {}", e);
            String::new()
        }
        Err(_) => {
            tracing::warn!("Stream reader did not finish within {:?}", READER_GRACE);
            String::new()
        }
    }
}

fn termination_of(status: ExitStatus) -> Termination {
    if let Some(code) = status.code() {
        return Termination::Exited(i64::from(code));
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return Termination::Signaled(signal);
        }
    }
    Termination::Exited(-1)
}

/// SIGKILL the guest's process group and reap the leader
async fn kill_group(pid: Option<u32>, child: &mut Child) {
    #[cfg(unix)]
    if let Some(pid) = pid.and_then(|p| i32::try_from(p).ok()) {
        use nix::sys::signal::{Signal, killpg};
        use nix::unistd::Pid;
        match killpg(Pid::from_raw(pid), Signal::SIGKILL) {
            Ok(()) | Err(nix::errno::Errno::ESRCH) => {}
            Err(e) => tracing::warn!("Failed to kill process group {}: {}", pid, e),
        }
    }
    #[cfg(not(unix))]
    let _ = pid;

    if let Err(e) = child.start_kill() {
        tracing::debug!("Guest process already gone: {}", e);
    }
    if let Err(e) = child.wait().await {
        tracing::warn!("Failed to reap guest process: {}", e);
    }
}
