//! Docker backend: one throwaway container per execution

use super::context::SandboxContext;
use super::harness::{self, HarnessPolicy, StagedScript};
use super::outcome::{RunOutcome, Termination};
use super::pipeline::Pipeline;
use super::Sandbox;
use crate::cleanup::{ContainerCleanup, MANAGED_LABEL, RUN_ID_LABEL};
use crate::config::SandboxConfig;
use crate::error::{SandboxError, SandboxResult};
use crate::limits::ContainerLimits;
use crate::models::{ExecutionRequest, ExecutionResult, FilesystemAccess, SandboxKind};
use crate::monitor::{
    ExecutionMonitor, Interruption, ResourceSnapshot, TimeoutCallback, spawn_sampler,
};
use async_trait::async_trait;
use bollard::Docker;
use bollard::container::LogOutput;
use bollard::models::{ContainerCreateBody, HostConfig, ResourcesUlimits};
use bollard::query_parameters::{
    CreateContainerOptions, CreateImageOptions, KillContainerOptions, LogsOptions,
    StartContainerOptions, StatsOptions, WaitContainerOptions,
};
use futures::{FutureExt, StreamExt};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Mount point of the read-only workspace inside the container
pub const GUEST_ROOT: &str = "/workspace";

/// Mount point of a caller-supplied directory with full filesystem access
pub const DATA_ROOT: &str = "/data";

const GUEST_USER: &str = "65534:65534";
const TMPFS_OPTIONS: &str = "rw,noexec,nosuid,size=64m";
const STATS_INTERVAL: Duration = Duration::from_millis(250);

/// Runs guest code in a locked-down Docker container.
///
/// The container gets no network (unless requested), no capabilities, a
/// read-only root filesystem, swap disabled and a pid cap. It is force-removed
/// after every run.
pub struct ContainerSandbox {
    config: Arc<SandboxConfig>,
    pipeline: Pipeline,
    docker: Docker,
    containers: ContainerCleanup,
    initialized: AtomicBool,
}

impl ContainerSandbox {
    pub fn new(config: Arc<SandboxConfig>, context: SandboxContext) -> SandboxResult<Self> {
        let docker = Docker::connect_with_local_defaults()?;
        Self::with_docker(config, context, docker)
    }

    pub fn with_docker(
        config: Arc<SandboxConfig>,
        context: SandboxContext,
        docker: Docker,
    ) -> SandboxResult<Self> {
        let containers = ContainerCleanup::new(docker.clone(), Arc::clone(&context.containers));
        let pipeline = Pipeline::new(SandboxKind::Container, &config, context)?;
        Ok(Self {
            config,
            pipeline,
            docker,
            containers,
            initialized: AtomicBool::new(false),
        })
    }

    pub fn docker(&self) -> &Docker {
        &self.docker
    }

    async fn ensure_initialized(&self) -> SandboxResult<()> {
        if self.is_initialized() {
            return Ok(());
        }
        self.initialize().await
    }

    async fn ensure_image(&self) -> SandboxResult<()> {
        let image = &self.config.image;
        if self.docker.inspect_image(image).await.is_ok() {
            tracing::debug!("Image {} already present", image);
            return Ok(());
        }

        tracing::info!("Pulling image {}", image);
        let mut pull = self.docker.create_image(
            Some(CreateImageOptions {
                from_image: Some(image.clone()),
                ..Default::default()
            }),
            None,
            None,
        );
        while let Some(progress) = pull.next().await {
            match progress {
                Ok(info) => tracing::trace!("Pull progress: {:?}", info.status),
                Err(e) => {
                    return Err(SandboxError::InitializationFailed(format!(
                        "failed to pull image {}: {}",
                        image, e
                    )));
                }
            }
        }
        Ok(())
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
        let policy = HarnessPolicy::new(&self.config, false);
        let staged = harness::stage(&workspace, request, policy, Path::new(GUEST_ROOT), true)?;
        workspace.make_world_readable()?;

        let run_id = Uuid::new_v4().simple().to_string();
        let limits = self.pipeline.limiter().container_limits(request);
        let body = container_body(
            &self.config,
            request,
            &staged,
            &limits,
            workspace.path(),
            &run_id,
        );

        let created = self
            .docker
            .create_container(
                Some(CreateContainerOptions {
                    name: Some(format!("runbox-{}", run_id)),
                    ..Default::default()
                }),
                body,
            )
            .await?;
        let id = created.id;
        self.pipeline
            .context()
            .containers
            .register(&id, self.pipeline.owner());
        tracing::debug!(container = %id, run_id = %run_id, "Created sandbox container");

        let outcome = self.drive(&id, request, &monitor, cancel).await;

        // Unconditional teardown, whatever `drive` returned
        if let Err(e) = self.containers.remove(&id).await {
            tracing::warn!("Container {} left behind for the sweeper: {}", id, e);
        }
        drop(workspace);
        outcome
    }

    async fn drive(
        &self,
        id: &str,
        request: &ExecutionRequest,
        monitor: &Arc<ExecutionMonitor>,
        cancel: &CancellationToken,
    ) -> SandboxResult<RunOutcome> {
        self.docker
            .start_container(id, None::<StartContainerOptions>)
            .await?;

        let sampler = {
            let docker = self.docker.clone();
            let id = id.to_string();
            spawn_sampler(Arc::clone(monitor), STATS_INTERVAL, move || {
                let docker = docker.clone();
                let id = id.clone();
                async move {
                    memory_usage(&docker, &id)
                        .await
                        .map(|bytes| ResourceSnapshot::now(bytes, None))
                }
            })
        };

        let limit = self.pipeline.limiter().timeout(request);
        let on_timeout: TimeoutCallback = {
            let docker = self.docker.clone();
            let id = id.to_string();
            Box::new(move || async move { kill(&docker, &id).await }.boxed())
        };
        let waited = self
            .pipeline
            .timeouts()
            .run_cancellable(
                limit + self.config.container_grace_period,
                wait_exit(&self.docker, id),
                cancel,
                Some(on_timeout),
            )
            .await;

        let termination = match waited {
            Ok(Ok(code)) => Ok(Termination::Exited(code)),
            Ok(Err(e)) => Err(e),
            Err(Interruption::TimedOut(_)) => Ok(Termination::TimedOut(limit)),
            Err(Interruption::Cancelled) => {
                kill(&self.docker, id).await;
                monitor.cancel();
                Ok(Termination::Cancelled)
            }
        };
        sampler.stop().await;

        let termination = termination?;
        let cap = self.config.max_output_size.saturating_mul(4) + 64 * 1024;
        let (stdout, stderr) = collect_logs(&self.docker, id, cap).await;
        Ok(RunOutcome::new(termination, stdout, stderr))
    }
}

#[async_trait]
impl Sandbox for ContainerSandbox {
    fn kind(&self) -> SandboxKind {
        SandboxKind::Container
    }

    async fn initialize(&self) -> SandboxResult<()> {
        self.docker.ping().await.map_err(|e| {
            SandboxError::InitializationFailed(format!("Docker daemon unreachable: {}", e))
        })?;
        tokio::fs::create_dir_all(self.pipeline.context().temp_files.root()).await?;
        self.ensure_image().await?;
        self.initialized.store(true, Ordering::SeqCst);
        tracing::info!("Container sandbox initialized with image {}", self.config.image);
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
        let owner = self.pipeline.owner();
        let containers = self.containers.remove_owned(owner).await;
        let workspaces = self.pipeline.context().temp_files.release_owned(owner);
        self.initialized.store(false, Ordering::SeqCst);
        tracing::debug!(containers, workspaces, "Container sandbox cleaned up");
        Ok(())
    }

    async fn health_check(&self) -> bool {
        match self.docker.ping().await {
            Ok(_) => true,
            Err(e) => {
                tracing::warn!("Container sandbox health check failed: {}", e);
                false
            }
        }
    }

    fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::SeqCst)
    }
}

/// Creation request for one run's container
fn container_body(
    config: &SandboxConfig,
    request: &ExecutionRequest,
    staged: &StagedScript,
    limits: &ContainerLimits,
    host_workspace: &Path,
    run_id: &str,
) -> ContainerCreateBody {
    let mut cmd = vec!["python3".to_string()];
    cmd.extend(staged.interpreter_args());

    let mut env: Vec<String> = request
        .env_vars
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect();
    env.sort();
    env.push("HOME=/tmp".to_string());

    let mut binds = vec![format!("{}:{}:ro", host_workspace.display(), GUEST_ROOT)];
    let mut working_dir = GUEST_ROOT.to_string();
    if let (FilesystemAccess::Full, Some(dir)) = (&request.filesystem_access, &request.working_dir)
    {
        binds.push(format!("{}:{}:rw", dir.display(), DATA_ROOT));
        working_dir = DATA_ROOT.to_string();
    }

    let ulimits = limits
        .ulimits
        .iter()
        .map(|u| ResourcesUlimits {
            name: Some(u.name.clone()),
            soft: Some(u.soft),
            hard: Some(u.hard),
        })
        .collect();

    ContainerCreateBody {
        image: Some(config.image.clone()),
        cmd: Some(cmd),
        working_dir: Some(working_dir),
        env: Some(env),
        user: Some(GUEST_USER.to_string()),
        labels: Some(HashMap::from([
            (MANAGED_LABEL.to_string(), "true".to_string()),
            (RUN_ID_LABEL.to_string(), run_id.to_string()),
        ])),
        network_disabled: Some(limits.network_disabled),
        attach_stdout: Some(true),
        attach_stderr: Some(true),
        host_config: Some(HostConfig {
            binds: Some(binds),
            memory: Some(limits.memory_bytes),
            memory_swap: Some(limits.memory_swap_bytes),
            cpu_period: Some(limits.cpu_period),
            cpu_quota: Some(limits.cpu_quota),
            pids_limit: Some(limits.pids_limit),
            ulimits: Some(ulimits),
            network_mode: Some(
                if limits.network_disabled { "none" } else { "bridge" }.to_string(),
            ),
            readonly_rootfs: Some(true),
            tmpfs: Some(HashMap::from([(
                "/tmp".to_string(),
                TMPFS_OPTIONS.to_string(),
            )])),
            cap_drop: Some(vec!["ALL".to_string()]),
            security_opt: Some(vec!["no-new-privileges".to_string()]),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Exit code of the container once it stops
async fn wait_exit(docker: &Docker, id: &str) -> SandboxResult<i64> {
    let mut stream = docker.wait_container(id, None::<WaitContainerOptions>);
    match stream.next().await {
        Some(Ok(response)) => Ok(response.status_code),
        // Non-zero exits surface as an error carrying the code
        Some(Err(bollard::errors::Error::DockerContainerWaitError { code, .. })) => Ok(code),
        Some(Err(e)) => Err(e.into()),
        None => Err(SandboxError::Internal(format!(
            "wait stream for container {} ended unexpectedly",
            id
        ))),
    }
}

async fn kill(docker: &Docker, id: &str) {
    match docker.kill_container(id, None::<KillContainerOptions>).await {
        Ok(()) => tracing::debug!("Killed container {}", id),
        Err(e) => tracing::debug!("Kill of container {} failed: {}", id, e),
    }
}

/// Current (or peak, when the kernel reports it) memory of a running container
async fn memory_usage(docker: &Docker, id: &str) -> Option<u64> {
    let mut stream = docker.stats(
        id,
        Some(StatsOptions {
            stream: false,
            one_shot: true,
        }),
    );
    match stream.next().await {
        Some(Ok(stats)) => stats.memory_stats.and_then(|m| m.max_usage.or(m.usage)),
        _ => None,
    }
}

/// Split container logs into stdout and stderr, keeping at most `cap` bytes each
async fn collect_logs(docker: &Docker, id: &str, cap: usize) -> (String, String) {
    let mut stream = docker.logs(
        id,
        Some(LogsOptions {
            stdout: true,
            stderr: true,
            ..Default::default()
        }),
    );

    let mut stdout = Vec::new();
    let mut stderr = Vec::new();
    while let Some(item) = stream.next().await {
        match item {
            Ok(LogOutput::StdOut { message }) => append_bounded(&mut stdout, &message, cap),
            Ok(LogOutput::StdErr { message }) => append_bounded(&mut stderr, &message, cap),
            Ok(_) => {}
            Err(e) => {
                tracing::warn!("Failed to read logs of container {}: {}", id, e);
                break;
            }
        }
    }
    (
        String::from_utf8_lossy(&stdout).into_owned(),
        String::from_utf8_lossy(&stderr).into_owned(),
    )
}

fn append_bounded(buffer: &mut Vec<u8>, chunk: &[u8], cap: usize) {
    let room = cap.saturating_sub(buffer.len());
    buffer.extend_from_slice(&chunk[..chunk.len().min(room)]);
}
