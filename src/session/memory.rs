//! In-memory session store, for tests and short-lived embedders.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use super::record::SessionRecord;
use super::store::{SessionStore, StoreError, StoreLock};

/// Keeps records in a map; nothing survives the process.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    records: Mutex<BTreeMap<String, SessionRecord>>,
    read_only: AtomicBool,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject every subsequent save and delete with `StoreError::ReadOnly`.
    pub fn set_read_only(&self, read_only: bool) {
        self.read_only.store(read_only, Ordering::SeqCst);
    }

    fn check_writable(&self) -> Result<(), StoreError> {
        if self.read_only.load(Ordering::SeqCst) {
            Err(StoreError::ReadOnly)
        } else {
            Ok(())
        }
    }

    fn records(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, SessionRecord>> {
        // A panic while holding the lock cannot leave a half-written record
        self.records
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn load(&self, agent_name: &str) -> Option<SessionRecord> {
        self.records().get(agent_name).cloned()
    }

    async fn save(&self, record: &SessionRecord) -> Result<(), StoreError> {
        self.check_writable()?;
        self.records()
            .insert(record.agent_name.clone(), record.clone());
        Ok(())
    }

    async fn delete(&self, agent_name: &str) -> Result<(), StoreError> {
        self.check_writable()?;
        self.records().remove(agent_name);
        Ok(())
    }

    async fn list(&self) -> Result<Vec<SessionRecord>, StoreError> {
        Ok(self.records().values().cloned().collect())
    }

    async fn lock(&self, _agent_name: &str) -> Result<StoreLock, StoreError> {
        Ok(StoreLock::none())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AgentConfig;
    use crate::fingerprint::fingerprint;

    fn record(name: &str) -> SessionRecord {
        SessionRecord::new(name, "sb-1", fingerprint(&AgentConfig::default()))
    }

    #[tokio::test]
    async fn test_memory_store_roundtrip() {
        let store = MemorySessionStore::new();
        let saved = record("agent");
        store.save(&saved).await.unwrap();
        assert_eq!(store.load("agent").await, Some(saved));

        store.delete("agent").await.unwrap();
        assert!(store.load("agent").await.is_none());
        store.delete("agent").await.unwrap();
    }

    #[tokio::test]
    async fn test_memory_store_lists_sorted() {
        let store = MemorySessionStore::new();
        store.save(&record("zeta")).await.unwrap();
        store.save(&record("alpha")).await.unwrap();

        let names: Vec<String> = store
            .list()
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.agent_name)
            .collect();
        assert_eq!(names, vec!["alpha", "zeta"]);
    }

    #[tokio::test]
    async fn test_memory_store_read_only() {
        let store = MemorySessionStore::new();
        store.save(&record("agent")).await.unwrap();
        store.set_read_only(true);

        assert!(matches!(
            store.save(&record("other")).await,
            Err(StoreError::ReadOnly)
        ));
        assert!(matches!(
            store.delete("agent").await,
            Err(StoreError::ReadOnly)
        ));
        assert!(store.load("agent").await.is_some());
    }
}
