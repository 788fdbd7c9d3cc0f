use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::fingerprint::Fingerprint;

/// Longest agent name accepted as a record key.
const MAX_AGENT_NAME_LEN: usize = 128;

/// Durable binding of an agent name to its last-known sandbox.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub agent_name: String,
    pub sandbox_id: String,
    pub fingerprint: Fingerprint,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SessionRecord {
    /// Record for a freshly provisioned sandbox.
    pub fn new(agent_name: &str, sandbox_id: &str, fingerprint: Fingerprint) -> Self {
        let now = Utc::now();
        Self {
            agent_name: agent_name.to_string(),
            sandbox_id: sandbox_id.to_string(),
            fingerprint,
            created_at: now,
            updated_at: now,
        }
    }

    /// Mark the binding as confirmed just now.
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// Check that an agent name is usable as a record key and file name.
pub fn validate_agent_name(name: &str) -> Result<(), String> {
    if name.is_empty() {
        return Err("agent name must not be empty".to_string());
    }
    if name.len() > MAX_AGENT_NAME_LEN {
        return Err(format!(
            "agent name is longer than {MAX_AGENT_NAME_LEN} characters"
        ));
    }
    if name.starts_with('.') {
        return Err(format!("agent name must not start with '.': '{name}'"));
    }
    if let Some(c) = name
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.')))
    {
        return Err(format!("invalid character {c:?} in agent name '{name}'"));
    }
    Ok(())
}
