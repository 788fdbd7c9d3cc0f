//! Errors that abort a session request.
//!
//! Only invalid input and failed provisioning reach the caller of
//! `create_or_reuse`. Lookup and persistence failures are absorbed by the
//! lifecycle manager.

use crate::sandbox::SandboxError;

use super::store::StoreError;

/// Fatal errors from the session lifecycle.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Agent name or configuration failed validation.
    #[error("Invalid configuration: {message}")]
    Config { message: String },

    /// Provider could not create a sandbox.
    #[error("Failed to provision sandbox for agent '{agent_name}': {source}")]
    ProviderCreation {
        agent_name: String,
        #[source]
        source: SandboxError,
    },

    /// Explicit store operation failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Explicit provider operation on a recorded sandbox failed.
    #[error(transparent)]
    Sandbox(#[from] SandboxError),
}

impl SessionError {
    /// Creates a `Config` error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates a `ProviderCreation` error.
    pub fn provider_creation(agent_name: &str, source: SandboxError) -> Self {
        Self::ProviderCreation {
            agent_name: agent_name.to_string(),
            source,
        }
    }

    /// Returns true if this is a configuration error.
    #[allow(dead_code)] // Public API for callers
    pub fn is_config(&self) -> bool {
        matches!(self, Self::Config { .. })
    }

    /// Returns true if the provider failed to create a sandbox.
    #[allow(dead_code)] // Public API for callers
    pub fn is_provider_creation(&self) -> bool {
        matches!(self, Self::ProviderCreation { .. })
    }
}
