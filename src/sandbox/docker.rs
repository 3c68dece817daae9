use anyhow::{Context, Result};
use async_trait::async_trait;
use bollard::Docker;
use bollard::container::{
    Config, CreateContainerOptions, KillContainerOptions, LogOutput, LogsOptions,
    RemoveContainerOptions, StartContainerOptions, StopContainerOptions,
};
use bollard::models::{ContainerStateStatusEnum, HostConfig, Mount, MountTypeEnum};
use futures_util::StreamExt;
use futures_util::stream::BoxStream;
use uuid::Uuid;

use super::{ContainerRuntime, ContainerState, ContainerStatus, SandboxSpec};

/// Docker-backed sandbox runtime.
///
/// Sandboxes run `/bin/bash <script>` in `/usr/src` with networking
/// disabled, no tty/stdin, unrestricted process count and CPU, and only
/// memory (+swap) capped.
pub struct DockerRuntime {
    docker: Docker,
}

impl DockerRuntime {
    pub fn connect() -> Result<Self> {
        let docker = Docker::connect_with_local_defaults()
            .context("failed to connect to the Docker daemon")?;
        Ok(Self { docker })
    }
}

#[async_trait]
impl ContainerRuntime for DockerRuntime {
    async fn create(&self, spec: &SandboxSpec) -> Result<String> {
        let name = format!("judged-{}", Uuid::new_v4());
        let mounts = spec
            .mounts
            .iter()
            .map(|binding| Mount {
                target: Some(binding.target.clone()),
                source: Some(binding.source.clone()),
                typ: Some(MountTypeEnum::BIND),
                read_only: Some(binding.read_only),
                ..Default::default()
            })
            .collect();

        let config = Config {
            image: Some(spec.image.clone()),
            entrypoint: Some(vec!["/bin/bash".to_string()]),
            cmd: Some(vec![spec.command.clone()]),
            working_dir: Some("/usr/src".to_string()),
            network_disabled: Some(true),
            attach_stdout: Some(true),
            attach_stderr: Some(true),
            tty: Some(false),
            open_stdin: Some(false),
            host_config: Some(HostConfig {
                mounts: Some(mounts),
                memory: spec.memory_limit.map(|bytes| bytes as i64),
                memory_swap: spec.memswap_limit,
                pids_limit: Some(-1),
                readonly_rootfs: Some(spec.read_only),
                ..Default::default()
            }),
            ..Default::default()
        };

        let created = self
            .docker
            .create_container(
                Some(CreateContainerOptions {
                    name: name.as_str(),
                    platform: None,
                }),
                config,
            )
            .await
            .context("failed to create sandbox container")?;
        Ok(created.id)
    }

    async fn start(&self, id: &str) -> Result<()> {
        self.docker
            .start_container(id, None::<StartContainerOptions<String>>)
            .await
            .context("failed to start sandbox container")
    }

    fn output(&self, id: &str) -> BoxStream<'static, Result<String>> {
        let options = LogsOptions::<String> {
            stdout: true,
            stderr: true,
            follow: true,
            ..Default::default()
        };
        self.docker
            .logs(id, Some(options))
            .map(|entry| match entry {
                Ok(
                    LogOutput::StdOut { message }
                    | LogOutput::StdErr { message }
                    | LogOutput::Console { message },
                ) => Ok(String::from_utf8_lossy(&message).into_owned()),
                Ok(LogOutput::StdIn { .. }) => Ok(String::new()),
                Err(e) => Err(anyhow::Error::new(e).context("failed to read sandbox output")),
            })
            .boxed()
    }

    async fn inspect(&self, id: &str) -> Result<ContainerState> {
        let response = self
            .docker
            .inspect_container(id, None)
            .await
            .context("failed to inspect sandbox container")?;
        let state = response.state.unwrap_or_default();
        let status = match state.status {
            Some(ContainerStateStatusEnum::CREATED) => ContainerStatus::Created,
            Some(ContainerStateStatusEnum::RUNNING) => ContainerStatus::Running,
            Some(ContainerStateStatusEnum::EXITED) => ContainerStatus::Exited,
            _ => ContainerStatus::Other,
        };
        Ok(ContainerState {
            status,
            exit_code: state.exit_code.unwrap_or(-1),
            oom_killed: state.oom_killed.unwrap_or(false),
        })
    }

    async fn kill(&self, id: &str) -> Result<()> {
        self.docker
            .kill_container(id, None::<KillContainerOptions<String>>)
            .await
            .context("failed to kill sandbox container")
    }

    async fn stop(&self, id: &str) -> Result<()> {
        self.docker
            .stop_container(id, None::<StopContainerOptions>)
            .await
            .context("failed to stop sandbox container")
    }

    async fn remove(&self, id: &str) -> Result<()> {
        self.docker
            .remove_container(id, None::<RemoveContainerOptions>)
            .await
            .context("failed to remove sandbox container")
    }
}
