//! Create-or-reuse decisions for agent sandboxes.
//!
//! A persisted record is only trusted when its fingerprint matches the
//! requested configuration and the provider confirms the sandbox is alive.
//! Everything else falls through to provisioning a fresh sandbox. Only
//! invalid input and a failed creation abort the request.

use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::{AgentConfig, StalePolicy, Timeouts};
use crate::fingerprint::{fingerprint, Fingerprint};
use crate::sandbox::{SandboxError, SandboxInfo, SandboxProvider};

use super::error::SessionError;
use super::handle::{Agent, Session};
use super::locks::KeyedLocks;
use super::record::{validate_agent_name, SessionRecord};
use super::store::{SessionStore, StoreLock};

/// Binds agent names to sandboxes, reusing them while the config is unchanged.
pub struct SessionManager {
    provider: Arc<dyn SandboxProvider>,
    store: Arc<dyn SessionStore>,
    timeouts: Timeouts,
    stale_policy: StalePolicy,
    locks: KeyedLocks,
}

impl SessionManager {
    pub fn new(provider: Arc<dyn SandboxProvider>, store: Arc<dyn SessionStore>) -> Self {
        Self {
            provider,
            store,
            timeouts: Timeouts::default(),
            stale_policy: StalePolicy::default(),
            locks: KeyedLocks::new(),
        }
    }

    #[must_use]
    pub fn with_timeouts(mut self, timeouts: Timeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    #[must_use]
    pub fn with_stale_policy(mut self, stale_policy: StalePolicy) -> Self {
        self.stale_policy = stale_policy;
        self
    }

    /// Return a session for `agent_name`, reusing its sandbox when possible.
    ///
    /// The boolean is true when an existing sandbox was reused. With
    /// `persist` false no record is read or written and a new sandbox is
    /// always created.
    pub async fn create_or_reuse(
        &self,
        agent_name: &str,
        config: &AgentConfig,
        persist: bool,
    ) -> Result<(Session, bool), SessionError> {
        validate_agent_name(agent_name).map_err(SessionError::config)?;
        config.validate().map_err(SessionError::config)?;

        let fp = fingerprint(config);
        let agent = Agent {
            name: agent_name.to_string(),
            config: config.clone(),
        };

        if !persist {
            let sandbox = self.provision(agent_name, config).await?;
            info!(agent = %agent_name, sandbox = %sandbox.id, "Created ephemeral sandbox");
            return Ok((self.session(sandbox, agent, fp), false));
        }

        // Held until the outcome is saved
        let _guard = self.locks.lock(agent_name).await;
        let _store_lock = self.store_lock(agent_name).await;

        if let Some(mut record) = self.store.load(agent_name).await {
            if record.fingerprint == fp {
                if let Some(sandbox) = self.confirm_live(&record.sandbox_id).await {
                    record.touch();
                    if let Err(e) = self.store.save(&record).await {
                        warn!(agent = %agent_name, error = %e, "Failed to refresh session record");
                    }
                    info!(agent = %agent_name, sandbox = %sandbox.id, "Reusing sandbox");
                    return Ok((self.session(sandbox, agent, fp), true));
                }
            } else {
                info!(
                    agent = %agent_name,
                    sandbox = %record.sandbox_id,
                    old = %record.fingerprint.short(),
                    new = %fp.short(),
                    "Configuration changed, not reusing sandbox"
                );
                self.retire(&record).await;
            }
        }

        let sandbox = self.provision(agent_name, config).await?;
        let record = SessionRecord::new(agent_name, &sandbox.id, fp.clone());
        if let Err(e) = self.store.save(&record).await {
            warn!(
                agent = %agent_name,
                sandbox = %sandbox.id,
                error = %e,
                "Failed to persist session record; sandbox will not be reused"
            );
        }

        info!(agent = %agent_name, sandbox = %sandbox.id, "Created sandbox");
        Ok((self.session(sandbox, agent, fp), false))
    }

    /// The persisted record for an agent, if any.
    ///
    /// A name that could never have been saved has no record.
    pub async fn load_persisted_session(&self, agent_name: &str) -> Option<SessionRecord> {
        if let Err(e) = validate_agent_name(agent_name) {
            debug!(error = %e, "Not loading record for invalid agent name");
            return None;
        }
        self.store.load(agent_name).await
    }

    /// Remove an agent's record regardless of its sandbox's state.
    pub async fn delete_persisted_session(&self, agent_name: &str) -> Result<(), SessionError> {
        validate_agent_name(agent_name).map_err(SessionError::config)?;

        let _guard = self.locks.lock(agent_name).await;
        let _store_lock = self.store_lock(agent_name).await;
        self.store.delete(agent_name).await?;
        debug!(agent = %agent_name, "Deleted persisted session");
        Ok(())
    }

    /// Every persisted record.
    pub async fn list_persisted_sessions(&self) -> Result<Vec<SessionRecord>, SessionError> {
        Ok(self.store.list().await?)
    }

    /// Stop the sandbox an agent's record points at, keeping the record.
    ///
    /// Returns the stopped sandbox id, or `None` if there is no record.
    pub async fn stop_persisted_sandbox(
        &self,
        agent_name: &str,
    ) -> Result<Option<String>, SessionError> {
        validate_agent_name(agent_name).map_err(SessionError::config)?;

        let Some(record) = self.store.load(agent_name).await else {
            return Ok(None);
        };

        tokio::time::timeout(self.timeouts.stop, self.provider.stop(&record.sandbox_id))
            .await
            .map_err(|_| SandboxError::timeout("stop", self.timeouts.stop))??;

        info!(agent = %agent_name, sandbox = %record.sandbox_id, "Stopped sandbox");
        Ok(Some(record.sandbox_id))
    }

    /// Cross-process lock on an agent's record. Failing to take it is logged
    /// and the caller proceeds unlocked.
    async fn store_lock(&self, agent_name: &str) -> Option<StoreLock> {
        match self.store.lock(agent_name).await {
            Ok(lock) => Some(lock),
            Err(e) => {
                warn!(agent = %agent_name, error = %e, "Could not take store lock, continuing");
                None
            }
        }
    }

    fn session(&self, sandbox: SandboxInfo, agent: Agent, fp: Fingerprint) -> Session {
        Session::new(
            sandbox,
            agent,
            fp,
            Arc::clone(&self.provider),
            self.timeouts.stop,
        )
    }

    async fn provision(
        &self,
        agent_name: &str,
        config: &AgentConfig,
    ) -> Result<SandboxInfo, SessionError> {
        debug!(agent = %agent_name, provider = self.provider.name(), "Provisioning sandbox");
        tokio::time::timeout(self.timeouts.create, self.provider.create(agent_name, config))
            .await
            .map_err(|_| SandboxError::timeout("create", self.timeouts.create))
            .and_then(|created| created)
            .map_err(|e| SessionError::provider_creation(agent_name, e))
    }

    /// Returns the sandbox if the provider confirms it running, resuming it
    /// if it is stopped. Any failure counts as a miss.
    async fn confirm_live(&self, id: &str) -> Option<SandboxInfo> {
        let info = match tokio::time::timeout(self.timeouts.lookup, self.provider.get(id)).await {
            Ok(Ok(info)) => info,
            Ok(Err(e)) if e.is_not_found() => {
                info!(sandbox = %id, "Recorded sandbox no longer exists");
                return None;
            }
            Ok(Err(e)) => {
                warn!(sandbox = %id, error = %e, "Sandbox lookup failed, creating a new one");
                return None;
            }
            Err(_) => {
                warn!(
                    sandbox = %id,
                    timeout_secs = self.timeouts.lookup.as_secs_f64(),
                    "Sandbox lookup timed out, creating a new one"
                );
                return None;
            }
        };

        if info.state.is_running() {
            return Some(info);
        }
        if !info.state.is_resumable() {
            info!(sandbox = %id, state = %info.state, "Recorded sandbox is not usable");
            return None;
        }

        debug!(sandbox = %id, state = %info.state, "Resuming sandbox");
        match tokio::time::timeout(self.timeouts.create, self.provider.start(id)).await {
            Ok(Ok(info)) if info.state.is_running() => Some(info),
            Ok(Ok(info)) => {
                warn!(sandbox = %id, state = %info.state, "Sandbox did not resume");
                None
            }
            Ok(Err(e)) => {
                warn!(sandbox = %id, error = %e, "Failed to resume sandbox");
                None
            }
            Err(_) => {
                warn!(sandbox = %id, "Resuming sandbox timed out");
                None
            }
        }
    }

    /// Apply the stale policy to a sandbox built from an outdated config
    async fn retire(&self, record: &SessionRecord) {
        if self.stale_policy == StalePolicy::Leave {
            return;
        }

        let id = &record.sandbox_id;
        match tokio::time::timeout(self.timeouts.stop, self.provider.stop(id)).await {
            Ok(Ok(())) => info!(sandbox = %id, "Stopped stale sandbox"),
            Ok(Err(e)) if e.is_not_found() => debug!(sandbox = %id, "Stale sandbox already gone"),
            Ok(Err(e)) => warn!(sandbox = %id, error = %e, "Failed to stop stale sandbox"),
            Err(_) => warn!(sandbox = %id, "Stopping stale sandbox timed out"),
        }
    }
}
