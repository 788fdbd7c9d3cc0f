//! Durable storage for session records.
//!
//! One JSON file per agent under an injected root directory. Reads never
//! fail: a missing, unreadable or malformed file is a cache miss. Writes go
//! to a temporary file that is synced and renamed over the record, so a
//! crash leaves either the old record or the new one.

use async_trait::async_trait;
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use super::record::SessionRecord;

/// Errors from writing or deleting session records.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Filesystem operation failed.
    #[error("Failed to {action} {}: {source}", .path.display())]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Record could not be serialized.
    #[error("Failed to serialize session record: {0}")]
    Serialize(#[from] serde_json::Error),

    /// Background storage task panicked or was cancelled.
    #[error("Storage task failed: {0}")]
    Task(String),

    /// Store was told to reject writes.
    #[cfg_attr(not(test), allow(dead_code))]
    #[error("Session store is read-only")]
    ReadOnly,
}

impl StoreError {
    fn io(action: &'static str, path: &Path, source: io::Error) -> Self {
        Self::Io {
            action,
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Held while an agent's record is being read, decided on and rewritten.
///
/// Dropping the guard releases the lock.
#[derive(Debug)]
pub struct StoreLock {
    _file: Option<File>,
}

impl StoreLock {
    /// A guard for stores that need no cross-process locking.
    pub fn none() -> Self {
        Self { _file: None }
    }
}

/// Key-value storage from agent name to session record.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Load an agent's record. Missing or corrupt records yield `None`.
    async fn load(&self, agent_name: &str) -> Option<SessionRecord>;

    /// Atomically write a record, replacing any previous one for the agent.
    async fn save(&self, record: &SessionRecord) -> Result<(), StoreError>;

    /// Delete an agent's record. Deleting a missing record succeeds.
    async fn delete(&self, agent_name: &str) -> Result<(), StoreError>;

    /// Every readable record, sorted by agent name.
    async fn list(&self) -> Result<Vec<SessionRecord>, StoreError>;

    /// Take the advisory lock for an agent's record.
    async fn lock(&self, agent_name: &str) -> Result<StoreLock, StoreError>;
}

/// File-backed store: `<root>/<agent_name>.json`.
#[derive(Debug, Clone)]
pub struct FileSessionStore {
    root: PathBuf,
}

impl FileSessionStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the record file for an agent.
    pub fn record_path(&self, agent_name: &str) -> PathBuf {
        self.root.join(format!("{agent_name}.json"))
    }

    fn lock_path(&self, agent_name: &str) -> PathBuf {
        self.root.join(format!("{agent_name}.lock"))
    }
}

#[async_trait]
impl SessionStore for FileSessionStore {
    async fn load(&self, agent_name: &str) -> Option<SessionRecord> {
        let path = self.record_path(agent_name);
        let name = agent_name.to_string();

        match tokio::task::spawn_blocking(move || read_record(&path, &name)).await {
            Ok(record) => record,
            Err(e) => {
                warn!(agent = %agent_name, error = %e, "Session load task failed");
                None
            }
        }
    }

    async fn save(&self, record: &SessionRecord) -> Result<(), StoreError> {
        let path = self.record_path(&record.agent_name);
        let json = serde_json::to_string_pretty(record)?;

        tokio::task::spawn_blocking(move || write_atomic(&path, json.as_bytes()))
            .await
            .map_err(|e| StoreError::Task(e.to_string()))?
    }

    async fn delete(&self, agent_name: &str) -> Result<(), StoreError> {
        let path = self.record_path(agent_name);

        tokio::task::spawn_blocking(move || match fs::remove_file(&path) {
            Ok(()) => {
                debug!(path = %path.display(), "Deleted session record");
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StoreError::io("delete", &path, e)),
        })
        .await
        .map_err(|e| StoreError::Task(e.to_string()))?
    }

    async fn list(&self) -> Result<Vec<SessionRecord>, StoreError> {
        let root = self.root.clone();

        tokio::task::spawn_blocking(move || list_records(&root))
            .await
            .map_err(|e| StoreError::Task(e.to_string()))?
    }

    async fn lock(&self, agent_name: &str) -> Result<StoreLock, StoreError> {
        let root = self.root.clone();
        let path = self.lock_path(agent_name);

        tokio::task::spawn_blocking(move || {
            fs::create_dir_all(&root).map_err(|e| StoreError::io("create", &root, e))?;
            let file = OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(false)
                .open(&path)
                .map_err(|e| StoreError::io("open", &path, e))?;
            file.lock_exclusive()
                .map_err(|e| StoreError::io("lock", &path, e))?;
            Ok(StoreLock { _file: Some(file) })
        })
        .await
        .map_err(|e| StoreError::Task(e.to_string()))?
    }
}

fn read_record(path: &Path, agent_name: &str) -> Option<SessionRecord> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return None,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Unreadable session record, ignoring");
            return None;
        }
    };

    let record: SessionRecord = match serde_json::from_str(&content) {
        Ok(record) => record,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Corrupt session record, ignoring");
            return None;
        }
    };

    if record.agent_name != agent_name {
        warn!(
            path = %path.display(),
            expected = %agent_name,
            found = %record.agent_name,
            "Session record belongs to another agent, ignoring"
        );
        return None;
    }

    Some(record)
}

/// Write to a temp file, sync it, then rename it over the target
fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| StoreError::io("create", parent, e))?;
    }

    let tmp_path = path.with_extension("json.tmp");
    let result = (|| -> io::Result<()> {
        let mut file = File::create(&tmp_path)?;
        file.write_all(bytes)?;
        file.sync_all()?;
        fs::rename(&tmp_path, path)
    })();

    if let Err(e) = result {
        let _ = fs::remove_file(&tmp_path);
        return Err(StoreError::io("write", path, e));
    }

    debug!(path = %path.display(), "Saved session record");
    Ok(())
}

fn list_records(root: &Path) -> Result<Vec<SessionRecord>, StoreError> {
    let entries = match fs::read_dir(root) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(StoreError::io("read", root, e)),
    };

    let mut records = Vec::new();
    for entry in entries {
        let path = entry.map_err(|e| StoreError::io("read", root, e))?.path();
        if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
            continue;
        }
        let Some(name) = path.file_stem().and_then(|stem| stem.to_str()) else {
            continue;
        };
        if let Some(record) = read_record(&path, name) {
            records.push(record);
        }
    }

    records.sort_by(|a, b| a.agent_name.cmp(&b.agent_name));
    Ok(records)
}
