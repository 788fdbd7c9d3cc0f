//! Domain-specific error types for sandbox provider operations.
//!
//! Typed errors let the lifecycle manager decide which failures are fatal
//! (creation) and which degrade to a cache miss (lookup).

use std::time::Duration;

/// Errors that can occur while talking to a sandbox provider.
#[derive(Debug, thiserror::Error)]
pub enum SandboxError {
    /// Provider backend is not running or not accessible.
    #[error("Sandbox provider is not available: {message}")]
    Unavailable { message: String },

    /// No sandbox with this id exists.
    #[error("Sandbox not found: {id}")]
    NotFound { id: String },

    /// Provider call exceeded its time bound.
    #[error("Sandbox {operation} timed out after {timeout_secs} seconds")]
    Timeout {
        operation: &'static str,
        timeout_secs: u64,
    },

    /// Provider could not create a sandbox.
    #[error("Sandbox creation failed: {message}")]
    CreationFailed { message: String },

    /// Provider could not report on a sandbox.
    #[error("Sandbox lookup failed: {message}")]
    LookupFailed { message: String },

    /// Provider could not start a sandbox.
    #[error("Sandbox start failed: {message}")]
    StartFailed { message: String },

    /// Provider could not stop a sandbox.
    #[error("Sandbox stop failed: {message}")]
    StopFailed { message: String },
}

impl SandboxError {
    /// Creates an `Unavailable` error.
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
        }
    }

    /// Creates a `NotFound` error.
    pub fn not_found(id: impl Into<String>) -> Self {
        Self::NotFound { id: id.into() }
    }

    /// Creates a `Timeout` error from a `Duration`.
    pub fn timeout(operation: &'static str, duration: Duration) -> Self {
        Self::Timeout {
            operation,
            timeout_secs: duration.as_secs(),
        }
    }

    /// Creates a `CreationFailed` error.
    pub fn creation_failed(message: impl Into<String>) -> Self {
        Self::CreationFailed {
            message: message.into(),
        }
    }

    /// Creates a `LookupFailed` error.
    pub fn lookup_failed(message: impl Into<String>) -> Self {
        Self::LookupFailed {
            message: message.into(),
        }
    }

    /// Creates a `StartFailed` error.
    pub fn start_failed(message: impl Into<String>) -> Self {
        Self::StartFailed {
            message: message.into(),
        }
    }

    /// Creates a `StopFailed` error.
    pub fn stop_failed(message: impl Into<String>) -> Self {
        Self::StopFailed {
            message: message.into(),
        }
    }

    /// Returns true if this is a timeout error.
    #[allow(dead_code)] // Public API for callers
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// Returns true if the sandbox does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}
