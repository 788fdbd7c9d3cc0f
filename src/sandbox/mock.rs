//! Mock sandbox provider for testing.
//!
//! Keeps sandboxes in memory, records every call, and can be scripted to
//! fail or stall so the lifecycle manager's fallback paths can be exercised
//! without a live provider.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use super::{SandboxError, SandboxInfo, SandboxProvider, SandboxState};
use crate::config::AgentConfig;

/// A provider call, recorded for assertions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockCall {
    Create { agent_name: String },
    Get { id: String },
    Start { id: String },
    Stop { id: String },
}

#[derive(Debug, Default)]
struct MockState {
    sandboxes: HashMap<String, SandboxState>,
    calls: Vec<MockCall>,
    fail_create: Option<String>,
    fail_lookup: Option<String>,
    fail_start: Option<String>,
    fail_stop: Option<String>,
    create_delay: Option<Duration>,
    lookup_delay: Option<Duration>,
}

/// An in-memory sandbox provider for testing.
#[derive(Debug, Clone, Default)]
pub struct MockSandboxProvider {
    state: Arc<Mutex<MockState>>,
    next_id: Arc<AtomicUsize>,
}

impl MockSandboxProvider {
    /// Create a provider with no sandboxes and no scripted failures.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap()
    }

    /// Make every `create` fail with the given message.
    pub fn fail_create(&self, message: &str) {
        self.lock().fail_create = Some(message.to_string());
    }

    /// Make every `get` fail with a lookup error.
    pub fn fail_lookup(&self, message: &str) {
        self.lock().fail_lookup = Some(message.to_string());
    }

    /// Make every `start` fail with the given message.
    pub fn fail_start(&self, message: &str) {
        self.lock().fail_start = Some(message.to_string());
    }

    /// Make every `stop` fail with the given message.
    pub fn fail_stop(&self, message: &str) {
        self.lock().fail_stop = Some(message.to_string());
    }

    /// Delay every `create` by the given duration.
    pub fn delay_create(&self, delay: Duration) {
        self.lock().create_delay = Some(delay);
    }

    /// Delay every `get` by the given duration.
    pub fn delay_lookup(&self, delay: Duration) {
        self.lock().lookup_delay = Some(delay);
    }

    /// Force a sandbox into a state, as if the provider changed it.
    pub fn set_state(&self, id: &str, state: SandboxState) {
        self.lock().sandboxes.insert(id.to_string(), state);
    }

    /// Forget a sandbox entirely, as if it was garbage collected.
    pub fn remove(&self, id: &str) {
        self.lock().sandboxes.remove(id);
    }

    /// Current state of a sandbox, if the provider knows it.
    pub fn state_of(&self, id: &str) -> Option<SandboxState> {
        self.lock().sandboxes.get(id).copied()
    }

    /// All calls made so far, in order.
    pub fn calls(&self) -> Vec<MockCall> {
        self.lock().calls.clone()
    }

    /// Number of `create` calls made so far.
    pub fn create_count(&self) -> usize {
        self.lock()
            .calls
            .iter()
            .filter(|c| matches!(c, MockCall::Create { .. }))
            .count()
    }
}

#[async_trait]
impl SandboxProvider for MockSandboxProvider {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn create(
        &self,
        agent_name: &str,
        _config: &AgentConfig,
    ) -> Result<SandboxInfo, SandboxError> {
        let delay = {
            let mut state = self.lock();
            state.calls.push(MockCall::Create {
                agent_name: agent_name.to_string(),
            });
            if let Some(message) = &state.fail_create {
                return Err(SandboxError::creation_failed(message.clone()));
            }
            state.create_delay
        };

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let id = format!("sb-{}", self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
        self.lock()
            .sandboxes
            .insert(id.clone(), SandboxState::Running);
        Ok(SandboxInfo {
            id,
            state: SandboxState::Running,
        })
    }

    async fn get(&self, id: &str) -> Result<SandboxInfo, SandboxError> {
        let delay = {
            let mut state = self.lock();
            state.calls.push(MockCall::Get { id: id.to_string() });
            if let Some(message) = &state.fail_lookup {
                return Err(SandboxError::lookup_failed(message.clone()));
            }
            state.lookup_delay
        };

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        match self.state_of(id) {
            Some(state) => Ok(SandboxInfo {
                id: id.to_string(),
                state,
            }),
            None => Err(SandboxError::not_found(id)),
        }
    }

    async fn start(&self, id: &str) -> Result<SandboxInfo, SandboxError> {
        let mut state = self.lock();
        state.calls.push(MockCall::Start { id: id.to_string() });
        if let Some(message) = &state.fail_start {
            return Err(SandboxError::start_failed(message.clone()));
        }
        match state.sandboxes.get_mut(id) {
            Some(SandboxState::Terminated) => Err(SandboxError::start_failed(format!(
                "sandbox {id} is terminated"
            ))),
            Some(current) => {
                *current = SandboxState::Running;
                Ok(SandboxInfo {
                    id: id.to_string(),
                    state: SandboxState::Running,
                })
            }
            None => Err(SandboxError::not_found(id)),
        }
    }

    async fn stop(&self, id: &str) -> Result<(), SandboxError> {
        let mut state = self.lock();
        state.calls.push(MockCall::Stop { id: id.to_string() });
        if let Some(message) = &state.fail_stop {
            return Err(SandboxError::stop_failed(message.clone()));
        }
        match state.sandboxes.get_mut(id) {
            Some(current) => {
                if *current != SandboxState::Terminated {
                    *current = SandboxState::Stopped;
                }
                Ok(())
            }
            None => Err(SandboxError::not_found(id)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_provider_name() {
        assert_eq!(MockSandboxProvider::new().name(), "mock");
    }

    #[tokio::test]
    async fn test_mock_create_assigns_sequential_ids() {
        let provider = MockSandboxProvider::new();
        let config = AgentConfig::default();

        let first = provider.create("a", &config).await.unwrap();
        let second = provider.create("b", &config).await.unwrap();

        assert_eq!(first.id, "sb-1");
        assert_eq!(second.id, "sb-2");
        assert_eq!(first.state, SandboxState::Running);
        assert_eq!(provider.create_count(), 2);
    }

    #[tokio::test]
    async fn test_mock_get_missing_is_not_found() {
        let provider = MockSandboxProvider::new();
        let err = provider.get("sb-404").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_mock_stop_then_start() {
        let provider = MockSandboxProvider::new();
        let sandbox = provider.create("a", &AgentConfig::default()).await.unwrap();

        provider.stop(&sandbox.id).await.unwrap();
        assert_eq!(provider.state_of(&sandbox.id), Some(SandboxState::Stopped));

        let resumed = provider.start(&sandbox.id).await.unwrap();
        assert_eq!(resumed.state, SandboxState::Running);
    }

    #[tokio::test]
    async fn test_mock_scripted_failures() {
        let provider = MockSandboxProvider::new();
        provider.fail_create("quota exceeded");
        provider.fail_lookup("502 bad gateway");

        let err = provider
            .create("a", &AgentConfig::default())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("quota exceeded"));

        let err = provider.get("sb-1").await.unwrap_err();
        assert!(!err.is_not_found());
        assert!(err.to_string().contains("502"));
    }

    #[tokio::test]
    async fn test_mock_records_calls() {
        let provider = MockSandboxProvider::new();
        let sandbox = provider.create("a", &AgentConfig::default()).await.unwrap();
        let _ = provider.get(&sandbox.id).await;
        let _ = provider.stop(&sandbox.id).await;

        assert_eq!(
            provider.calls(),
            vec![
                MockCall::Create {
                    agent_name: "a".to_string()
                },
                MockCall::Get {
                    id: "sb-1".to_string()
                },
                MockCall::Stop {
                    id: "sb-1".to_string()
                },
            ]
        );
    }
}
