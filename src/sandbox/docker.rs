//! Docker-backed sandbox provider.
//!
//! Each sandbox is a long-running container kept alive by the agent's
//! configured command. Stopping halts the container but keeps it around,
//! so a later session can start it again.

use async_trait::async_trait;
use bollard::container::{
    Config as ContainerConfig, CreateContainerOptions, InspectContainerOptions,
    RemoveContainerOptions, StartContainerOptions, StopContainerOptions,
};
use bollard::service::{ContainerStateStatusEnum, HostConfig};
use bollard::Docker;
use std::collections::HashMap;
use std::future::Future;
use tracing::{debug, info, warn};

use super::{SandboxError, SandboxInfo, SandboxProvider, SandboxState};
use crate::config::{AgentConfig, ProviderConfig};
use crate::fingerprint::fingerprint;

/// Label carrying the owning agent's name.
const AGENT_LABEL: &str = "berth.agent";
/// Label carrying the config fingerprint the container was built from.
const FINGERPRINT_LABEL: &str = "berth.fingerprint";

/// Provisions agent sandboxes as local Docker containers
pub struct DockerProvider {
    docker: Docker,
    stop_grace_secs: i64,
}

impl DockerProvider {
    /// Connects to the local Docker daemon and checks it responds.
    pub async fn connect(config: &ProviderConfig) -> Result<Self, SandboxError> {
        let docker = Docker::connect_with_local_defaults()
            .map_err(|e| SandboxError::unavailable(format!("{e}. Is Docker running?")))?;

        docker
            .ping()
            .await
            .map_err(|e| SandboxError::unavailable(format!("cannot ping Docker daemon: {e}")))?;

        Ok(Self {
            docker,
            stop_grace_secs: config.stop_grace_secs,
        })
    }

    fn build_container_config(
        agent_name: &str,
        config: &AgentConfig,
    ) -> Result<ContainerConfig<String>, SandboxError> {
        let memory = config.memory_bytes().map_err(SandboxError::creation_failed)?;
        let nano_cpus = config.nano_cpus().map_err(SandboxError::creation_failed)?;

        let env = config
            .env
            .iter()
            .map(|(key, value)| format!("{key}={value}"))
            .collect();

        let mut labels: HashMap<String, String> = config
            .labels
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        labels.insert(AGENT_LABEL.to_string(), agent_name.to_string());
        labels.insert(
            FINGERPRINT_LABEL.to_string(),
            fingerprint(config).to_string(),
        );

        Ok(ContainerConfig {
            image: Some(config.image.clone()),
            cmd: Some(config.command.clone()),
            env: Some(env),
            labels: Some(labels),
            host_config: Some(HostConfig {
                memory: Some(memory),
                nano_cpus: Some(nano_cpus),
                ..Default::default()
            }),
            ..Default::default()
        })
    }

    async fn inspect(&self, id: &str) -> Result<SandboxInfo, SandboxError> {
        let response = self
            .docker
            .inspect_container(id, None::<InspectContainerOptions>)
            .await
            .map_err(|e| {
                if status_code(&e) == Some(404) {
                    SandboxError::not_found(id)
                } else {
                    SandboxError::lookup_failed(e.to_string())
                }
            })?;

        let status = response.state.and_then(|state| state.status);
        Ok(SandboxInfo {
            id: response.id.unwrap_or_else(|| id.to_string()),
            state: map_status(status),
        })
    }

    /// Start a freshly created container and confirm it is running.
    async fn start_created(
        &self,
        id: &str,
        container_name: &str,
    ) -> Result<SandboxInfo, SandboxError> {
        debug!(container = %container_name, "Starting container");
        self.docker
            .start_container(id, None::<StartContainerOptions<String>>)
            .await
            .map_err(|e| SandboxError::creation_failed(e.to_string()))?;

        let info = self
            .inspect(id)
            .await
            .map_err(|e| SandboxError::creation_failed(e.to_string()))?;

        if !info.state.is_running() {
            return Err(SandboxError::creation_failed(format!(
                "container {container_name} is {} after start",
                info.state
            )));
        }
        Ok(info)
    }

    /// Force-remove a container that never became a usable sandbox.
    async fn discard(&self, id: &str, container_name: &str) {
        let options = RemoveContainerOptions {
            force: true,
            ..Default::default()
        };
        match self.docker.remove_container(id, Some(options)).await {
            Ok(()) => warn!(container = %container_name, "Removed container that failed to start"),
            Err(e) => warn!(
                container = %container_name,
                error = %e,
                "Failed to remove container that failed to start"
            ),
        }
    }
}

/// Await `attempt`, running `cleanup` before returning its error.
async fn or_cleanup<T, A, C, F>(attempt: A, cleanup: C) -> Result<T, SandboxError>
where
    A: Future<Output = Result<T, SandboxError>>,
    C: FnOnce() -> F,
    F: Future<Output = ()>,
{
    match attempt.await {
        Ok(value) => Ok(value),
        Err(e) => {
            cleanup().await;
            Err(e)
        }
    }
}

#[async_trait]
impl SandboxProvider for DockerProvider {
    fn name(&self) -> &'static str {
        "docker"
    }

    async fn create(
        &self,
        agent_name: &str,
        config: &AgentConfig,
    ) -> Result<SandboxInfo, SandboxError> {
        let container_config = Self::build_container_config(agent_name, config)?;
        let suffix = uuid::Uuid::new_v4().simple().to_string();
        let container_name = format!("berth-{agent_name}-{}", &suffix[..8]);

        debug!(container = %container_name, image = %config.image, "Creating container");
        let created = self
            .docker
            .create_container(
                Some(CreateContainerOptions {
                    name: container_name.clone(),
                    platform: None,
                }),
                container_config,
            )
            .await
            .map_err(|e| match status_code(&e) {
                Some(404) => SandboxError::creation_failed(format!(
                    "image not found: {}",
                    config.image
                )),
                _ => SandboxError::creation_failed(e.to_string()),
            })?;

        let info = or_cleanup(self.start_created(&created.id, &container_name), || {
            self.discard(&created.id, &container_name)
        })
        .await?;

        info!(container = %container_name, id = %info.id, "Sandbox container running");
        Ok(info)
    }

    async fn get(&self, id: &str) -> Result<SandboxInfo, SandboxError> {
        self.inspect(id).await
    }

    async fn start(&self, id: &str) -> Result<SandboxInfo, SandboxError> {
        self.docker
            .start_container(id, None::<StartContainerOptions<String>>)
            .await
            .or_else(|e| match status_code(&e) {
                // Already running
                Some(304) => Ok(()),
                Some(404) => Err(SandboxError::not_found(id)),
                _ => Err(SandboxError::start_failed(e.to_string())),
            })?;

        let info = self.inspect(id).await?;
        if !info.state.is_running() {
            return Err(SandboxError::start_failed(format!(
                "container {id} is {} after start",
                info.state
            )));
        }
        Ok(info)
    }

    async fn stop(&self, id: &str) -> Result<(), SandboxError> {
        self.docker
            .stop_container(
                id,
                Some(StopContainerOptions {
                    t: self.stop_grace_secs,
                }),
            )
            .await
            .or_else(|e| match status_code(&e) {
                // Already stopped
                Some(304) => Ok(()),
                Some(404) => Err(SandboxError::not_found(id)),
                _ => Err(SandboxError::stop_failed(e.to_string())),
            })
    }
}

fn status_code(error: &bollard::errors::Error) -> Option<u16> {
    match error {
        bollard::errors::Error::DockerResponseServerError { status_code, .. } => {
            Some(*status_code)
        }
        _ => None,
    }
}

/// Map Docker's container status onto provider-neutral sandbox states
fn map_status(status: Option<ContainerStateStatusEnum>) -> SandboxState {
    match status {
        Some(ContainerStateStatusEnum::RUNNING | ContainerStateStatusEnum::RESTARTING) => {
            SandboxState::Running
        }
        Some(ContainerStateStatusEnum::CREATED) => SandboxState::Provisioning,
        Some(ContainerStateStatusEnum::PAUSED | ContainerStateStatusEnum::EXITED) => {
            SandboxState::Stopped
        }
        Some(
            ContainerStateStatusEnum::REMOVING
            | ContainerStateStatusEnum::DEAD
            | ContainerStateStatusEnum::EMPTY,
        )
        | None => SandboxState::Terminated,
    }
}
