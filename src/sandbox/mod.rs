//! Sandbox providers for agent sessions.
//!
//! A provider owns remote sandboxes; this crate only ever holds their ids.
//! The lifecycle manager talks to providers exclusively through the
//! [`SandboxProvider`] trait, so tests can swap in [`MockSandboxProvider`].

mod docker;
mod error;
#[cfg(test)]
mod mock;

pub(crate) use docker::DockerProvider;
pub(crate) use error::SandboxError;
#[cfg(test)]
pub(crate) use mock::{MockCall, MockSandboxProvider};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::AgentConfig;

/// Provider-visible state of a sandbox.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SandboxState {
    /// Created but not yet running.
    Provisioning,
    /// Up and usable.
    Running,
    /// Halted but resumable.
    Stopped,
    /// Gone for good.
    Terminated,
}

impl SandboxState {
    /// Returns true if the sandbox can serve a session right now.
    pub fn is_running(self) -> bool {
        matches!(self, Self::Running)
    }

    /// Returns true if a `start` could bring the sandbox back.
    pub fn is_resumable(self) -> bool {
        matches!(self, Self::Provisioning | Self::Stopped)
    }
}

impl std::fmt::Display for SandboxState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Provisioning => write!(f, "provisioning"),
            Self::Running => write!(f, "running"),
            Self::Stopped => write!(f, "stopped"),
            Self::Terminated => write!(f, "terminated"),
        }
    }
}

/// A provider's view of one sandbox.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SandboxInfo {
    pub id: String,
    pub state: SandboxState,
}

/// Trait for remote sandbox providers.
#[async_trait]
pub trait SandboxProvider: Send + Sync {
    /// Returns the provider name for display.
    fn name(&self) -> &'static str;

    /// Provisions a new sandbox and returns it once running.
    async fn create(&self, agent_name: &str, config: &AgentConfig)
        -> Result<SandboxInfo, SandboxError>;

    /// Looks up a sandbox by id. Missing sandboxes yield `SandboxError::NotFound`.
    async fn get(&self, id: &str) -> Result<SandboxInfo, SandboxError>;

    /// Resumes a stopped or still-provisioning sandbox.
    async fn start(&self, id: &str) -> Result<SandboxInfo, SandboxError>;

    /// Stops a sandbox without destroying it.
    async fn stop(&self, id: &str) -> Result<(), SandboxError>;
}
