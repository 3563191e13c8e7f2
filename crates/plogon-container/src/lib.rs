//! Sandboxed container build execution (spec §4.6).
//!
//! Creates one container per task, with network disabled, privileged
//! off, IPC namespacing off, and a fixed five-mount volume topology.
//! Streams the multiplexed log output to a [`Reporter`] while
//! concurrently polling container state, then reads the final exit code
//! via inspect. The container is force-removed on every exit path.
//!
//! # Example
//!
//! ```ignore
//! use plogon_container::{ContainerExecutor, ContainerSpec};
//! use plogon_types::NullReporter;
//!
//! # async fn run() -> anyhow::Result<()> {
//! let executor = ContainerExecutor::connect()?;
//! let mut reporter = NullReporter;
//! let outcome = executor.run(ContainerSpec::default(), &mut reporter).await?;
//! # Ok(()) }
//! ```

use std::path::PathBuf;

use bollard::container::{
    Config, CreateContainerOptions, LogsOptions, RemoveContainerOptions, StartContainerOptions,
};
use bollard::models::{HostConfig, Mount, MountTypeEnum};
use bollard::Docker;
use futures_util::stream::StreamExt;
use plogon_types::Reporter;

/// Bind-mount topology and environment for a single container run (spec
/// §4.6).
#[derive(Debug, Clone)]
pub struct ContainerSpec {
    /// Container image to run.
    pub image: String,
    /// `<work>` → `/work/repo`, read-write.
    pub work_dir: PathBuf,
    /// `<toolchain>` → `/work/dalamud`, read-only.
    pub toolchain_dir: PathBuf,
    /// `<static>` → `/static`, read-only; holds `entrypoint.sh`.
    pub static_dir: PathBuf,
    /// `<output>` → `/output`, read-write.
    pub output_dir: PathBuf,
    /// `<packages>` → `/packages`, read-only.
    pub packages_dir: PathBuf,
    /// `PLOGON_PROJECT_DIR`.
    pub project_dir: String,
    /// `PLOGON_PLUGIN_NAME`.
    pub plugin_name: String,
    /// `PLOGON_PLUGIN_COMMIT`.
    pub plugin_commit: String,
    /// `PLOGON_PLUGIN_VERSION`, if the manifest or a PR override declared one.
    pub plugin_version: Option<String>,
}

impl Default for ContainerSpec {
    fn default() -> Self {
        Self {
            image: String::new(),
            work_dir: PathBuf::new(),
            toolchain_dir: PathBuf::new(),
            static_dir: PathBuf::new(),
            output_dir: PathBuf::new(),
            packages_dir: PathBuf::new(),
            project_dir: String::new(),
            plugin_name: String::new(),
            plugin_commit: String::new(),
            plugin_version: None,
        }
    }
}

/// The result of a completed container run.
#[derive(Debug, Clone)]
pub enum BuildOutcome {
    /// Exit code 0.
    Success,
    /// Non-zero exit code. Not a [`ContainerError`] — the build ran to
    /// completion and failed on its own terms (spec §4.6).
    Failed {
        /// The container's exit code.
        exit_code: i64,
    },
}

/// Failures from the container engine itself, as distinct from a build
/// that ran and failed (spec §7: a system error, not a build failure).
#[derive(Debug, thiserror::Error)]
pub enum ContainerError {
    /// Could not reach or negotiate with the container engine.
    #[error("failed to connect to container engine: {0}")]
    Connect(#[source] bollard::errors::Error),
    /// Container create or start failed.
    #[error("failed to start container: {0}")]
    Start(#[source] bollard::errors::Error),
    /// Inspecting the exited container failed.
    #[error("failed to inspect container: {0}")]
    Inspect(#[source] bollard::errors::Error),
}

/// Abstracts "run a spec to completion" so the orchestrator can be
/// exercised against a fake in tests without a real container engine
/// behind it.
#[async_trait::async_trait(?Send)]
pub trait ContainerRuntime {
    /// Run `spec` to completion and report its outcome.
    async fn run(&self, spec: ContainerSpec, reporter: &mut dyn Reporter) -> Result<BuildOutcome, ContainerError>;
}

/// Runs one container per task against a connected container engine.
pub struct ContainerExecutor {
    docker: Docker,
}

impl ContainerExecutor {
    /// Connect using the local Docker-compatible socket conventions
    /// (`DOCKER_HOST`, or the platform default).
    pub fn connect() -> Result<Self, ContainerError> {
        let docker = Docker::connect_with_local_defaults().map_err(ContainerError::Connect)?;
        Ok(Self { docker })
    }
}

#[async_trait::async_trait(?Send)]
impl ContainerRuntime for ContainerExecutor {
    /// Run `spec` to completion: create with the fixed mount topology and
    /// network disabled, start, stream logs to `reporter` while polling
    /// for exit, inspect for the final code, and force-remove the
    /// container on every exit path.
    async fn run(&self, spec: ContainerSpec, reporter: &mut dyn Reporter) -> Result<BuildOutcome, ContainerError> {
        let name = format!(
            "plogon-{}-{}",
            sanitize(&spec.plugin_name),
            &spec.plugin_commit[..spec.plugin_commit.len().min(12)]
        );

        let container_id = self.create(&name, &spec).await?;
        self.start(&container_id).await?;

        let log_drain = self.drain_logs(&container_id, reporter);
        let state_poll = self.poll_until_exited(&container_id);

        let join_result = tokio::try_join!(state_poll, log_drain);

        let remove_result = self.force_remove(&container_id).await;

        let (exit_code, ()) = join_result?;
        remove_result?;

        Ok(if exit_code == 0 {
            BuildOutcome::Success
        } else {
            BuildOutcome::Failed { exit_code }
        })
    }
}

impl ContainerExecutor {
    async fn create(&self, name: &str, spec: &ContainerSpec) -> Result<String, ContainerError> {
        let mounts = vec![
            bind_mount(&spec.work_dir, "/work/repo", false),
            bind_mount(&spec.toolchain_dir, "/work/dalamud", true),
            bind_mount(&spec.static_dir, "/static", true),
            bind_mount(&spec.output_dir, "/output", false),
            bind_mount(&spec.packages_dir, "/packages", true),
        ];

        let mut env = vec![
            format!("PLOGON_PROJECT_DIR={}", spec.project_dir),
            format!("PLOGON_PLUGIN_NAME={}", spec.plugin_name),
            format!("PLOGON_PLUGIN_COMMIT={}", spec.plugin_commit),
            "DALAMUD_LIB_PATH=/work/dalamud/".to_string(),
        ];
        if let Some(version) = &spec.plugin_version {
            env.push(format!("PLOGON_PLUGIN_VERSION={version}"));
        }

        let config = Config {
            image: Some(spec.image.clone()),
            env: Some(env),
            entrypoint: Some(vec!["/static/entrypoint.sh".to_string()]),
            host_config: Some(HostConfig {
                mounts: Some(mounts),
                network_mode: Some("none".to_string()),
                privileged: Some(false),
                ipc_mode: Some("none".to_string()),
                auto_remove: Some(false),
                ..Default::default()
            }),
            ..Default::default()
        };

        let options = CreateContainerOptions {
            name: name.to_string(),
            platform: None,
        };

        self.docker
            .create_container(Some(options), config)
            .await
            .map(|response| response.id)
            .map_err(ContainerError::Start)
    }

    async fn start(&self, container_id: &str) -> Result<(), ContainerError> {
        self.docker
            .start_container(container_id, None::<StartContainerOptions<String>>)
            .await
            .map_err(ContainerError::Start)
    }

    async fn drain_logs(&self, container_id: &str, reporter: &mut dyn Reporter) -> Result<(), ContainerError> {
        let options = LogsOptions::<String> {
            follow: true,
            stdout: true,
            stderr: true,
            ..Default::default()
        };

        let mut stream = self.docker.logs(container_id, Some(options));
        while let Some(chunk) = stream.next().await {
            match chunk {
                Ok(output) => {
                    let text = output.to_string();
                    for line in text.lines() {
                        reporter.info(line);
                    }
                }
                Err(err) => {
                    reporter.warn(&format!("log stream error: {err}"));
                    break;
                }
            }
        }
        Ok(())
    }

    async fn poll_until_exited(&self, container_id: &str) -> Result<i64, ContainerError> {
        loop {
            let inspect = self
                .docker
                .inspect_container(container_id, None)
                .await
                .map_err(ContainerError::Inspect)?;

            if let Some(state) = inspect.state {
                if state.running == Some(false) {
                    return Ok(state.exit_code.unwrap_or(-1));
                }
            }

            tokio::time::sleep(std::time::Duration::from_millis(200)).await;
        }
    }

    async fn force_remove(&self, container_id: &str) -> Result<(), ContainerError> {
        let options = RemoveContainerOptions {
            force: true,
            ..Default::default()
        };
        match self.docker.remove_container(container_id, Some(options)).await {
            Ok(()) => Ok(()),
            // Already gone (e.g. engine auto-reaped it) is not a failure here.
            Err(bollard::errors::Error::DockerResponseServerError {
                status_code: 404, ..
            }) => Ok(()),
            Err(err) => Err(ContainerError::Inspect(err)),
        }
    }
}

fn bind_mount(source: &std::path::Path, target: &str, read_only: bool) -> Mount {
    Mount {
        source: Some(source.to_string_lossy().to_string()),
        target: Some(target.to_string()),
        typ: Some(MountTypeEnum::BIND),
        read_only: Some(read_only),
        ..Default::default()
    }
}

fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
        .collect()
}
