//! CLI command implementations.
//!
//! Each submodule implements a berth CLI command with pure formatting
//! separated from IO for testability.

pub mod forget;
pub mod status;
pub mod stop;
pub mod up;

use anyhow::Result;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

use crate::config::Config;
use crate::sandbox::DockerProvider;
use crate::session::{FileSessionStore, SessionManager};

/// Everything a command needs, resolved from flags and `berth.toml`.
pub struct Context {
    pub config: Config,
    pub store: Arc<FileSessionStore>,
}

impl Context {
    /// Load the config file and resolve the state directory.
    ///
    /// An explicit `state_dir` wins over the one in the config file.
    pub fn load(config_path: &Path, state_dir: Option<PathBuf>) -> Result<Self> {
        let config = Config::load(config_path)?;
        let root = match state_dir {
            Some(dir) => dir,
            None => config.session.resolve_state_dir()?,
        };
        let store = Arc::new(FileSessionStore::new(root));
        debug!(state_dir = %store.root().display(), "Using session store");

        Ok(Self { config, store })
    }

    /// Connect to Docker and build a session manager over the store.
    pub async fn manager(&self) -> Result<SessionManager> {
        let provider = DockerProvider::connect(&self.config.provider).await?;
        Ok(SessionManager::new(Arc::new(provider), self.store.clone())
            .with_timeouts(self.config.provider.timeouts())
            .with_stale_policy(self.config.session.stale_policy))
    }
}
