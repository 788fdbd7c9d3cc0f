use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::config::AgentConfig;
use crate::fingerprint::Fingerprint;
use crate::sandbox::{SandboxError, SandboxInfo, SandboxProvider};

/// The agent a session was requested for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Agent {
    pub name: String,
    pub config: AgentConfig,
}

/// A live sandbox handed to the caller.
///
/// The sandbox was confirmed running when the session was built. Stopping the
/// session leaves the persisted record in place, so the next request can
/// find out for itself whether the sandbox is still usable.
pub struct Session {
    sandbox: SandboxInfo,
    agent: Agent,
    fingerprint: Fingerprint,
    provider: Arc<dyn SandboxProvider>,
    stop_timeout: Duration,
}

impl Session {
    pub(crate) fn new(
        sandbox: SandboxInfo,
        agent: Agent,
        fingerprint: Fingerprint,
        provider: Arc<dyn SandboxProvider>,
        stop_timeout: Duration,
    ) -> Self {
        Self {
            sandbox,
            agent,
            fingerprint,
            provider,
            stop_timeout,
        }
    }

    pub fn sandbox_id(&self) -> &str {
        &self.sandbox.id
    }

    pub fn sandbox(&self) -> &SandboxInfo {
        &self.sandbox
    }

    pub fn agent(&self) -> &Agent {
        &self.agent
    }

    pub fn fingerprint(&self) -> &Fingerprint {
        &self.fingerprint
    }

    /// Ask the provider to stop the sandbox.
    pub async fn stop(self) -> Result<(), SandboxError> {
        tokio::time::timeout(self.stop_timeout, self.provider.stop(&self.sandbox.id))
            .await
            .map_err(|_| SandboxError::timeout("stop", self.stop_timeout))??;

        info!(agent = %self.agent.name, sandbox = %self.sandbox.id, "Stopped sandbox");
        Ok(())
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("sandbox", &self.sandbox)
            .field("agent", &self.agent.name)
            .field("fingerprint", &self.fingerprint.short())
            .field("provider", &self.provider.name())
            .finish()
    }
}
