use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_FILE: &str = "berth.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub agent: AgentConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub provider: ProviderConfig,
}

/// Agent configuration - everything the provider needs to build a sandbox
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Container image the sandbox is built from
    #[serde(default = "default_image")]
    pub image: String,

    /// Memory limit (e.g., "8g", "512m")
    #[serde(default = "default_memory")]
    pub memory: String,

    /// CPU limit (e.g., "4", "0.5")
    #[serde(default = "default_cpus")]
    pub cpus: String,

    /// Environment passed into the sandbox
    #[serde(default)]
    pub env: BTreeMap<String, String>,

    /// Long-running command that keeps the sandbox alive
    #[serde(default = "default_command")]
    pub command: Vec<String>,

    /// Free-form description, not part of the fingerprint
    #[serde(default)]
    pub description: Option<String>,

    /// Cosmetic labels, not part of the fingerprint
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            image: default_image(),
            memory: default_memory(),
            cpus: default_cpus(),
            env: BTreeMap::new(),
            command: default_command(),
            description: None,
            labels: BTreeMap::new(),
        }
    }
}

impl AgentConfig {
    /// Check the configuration before anything is sent to a provider.
    ///
    /// Returns a human-readable reason on failure.
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.image.trim().is_empty() {
            return Err("agent image must not be empty".to_string());
        }
        parse_memory_limit(&self.memory)?;
        parse_cpus(&self.cpus)?;
        if self.command.is_empty() {
            return Err("agent command must not be empty".to_string());
        }
        if let Some(key) = self.env.keys().find(|k| k.is_empty() || k.contains('=')) {
            return Err(format!("invalid environment variable name: '{key}'"));
        }
        Ok(())
    }

    /// Memory limit in bytes.
    pub fn memory_bytes(&self) -> std::result::Result<i64, String> {
        parse_memory_limit(&self.memory)
    }

    /// CPU limit in nano-CPUs as understood by Docker.
    #[allow(clippy::cast_possible_truncation)]
    pub fn nano_cpus(&self) -> std::result::Result<i64, String> {
        parse_cpus(&self.cpus).map(|cpus| (cpus * 1_000_000_000.0) as i64)
    }
}

/// What to do with the old sandbox when the configuration has drifted
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StalePolicy {
    /// Leave the old sandbox alone; it is simply no longer referenced
    #[default]
    Leave,
    /// Ask the provider to stop the old sandbox before creating a new one
    Stop,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Directory holding one record file per agent.
    /// Defaults to `~/.berth/sessions`.
    #[serde(default)]
    pub state_dir: Option<PathBuf>,

    /// Policy for sandboxes whose configuration no longer matches
    #[serde(default)]
    pub stale_policy: StalePolicy,
}

impl SessionConfig {
    /// Resolve the state directory, falling back to the home directory.
    pub fn resolve_state_dir(&self) -> Result<PathBuf> {
        match &self.state_dir {
            Some(dir) => expand_path(dir),
            None => default_state_dir(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Timeout for creating (or resuming) a sandbox, in seconds
    #[serde(default = "default_create_timeout")]
    pub create_timeout_secs: u64,

    /// Timeout for looking up a recorded sandbox, in seconds
    #[serde(default = "default_lookup_timeout")]
    pub lookup_timeout_secs: u64,

    /// Timeout for stopping a sandbox, in seconds
    #[serde(default = "default_stop_timeout")]
    pub stop_timeout_secs: u64,

    /// Grace period Docker gives the container before killing it, in seconds
    #[serde(default = "default_stop_grace")]
    pub stop_grace_secs: i64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            create_timeout_secs: default_create_timeout(),
            lookup_timeout_secs: default_lookup_timeout(),
            stop_timeout_secs: default_stop_timeout(),
            stop_grace_secs: default_stop_grace(),
        }
    }
}

impl ProviderConfig {
    pub fn timeouts(&self) -> Timeouts {
        Timeouts {
            create: Duration::from_secs(self.create_timeout_secs),
            lookup: Duration::from_secs(self.lookup_timeout_secs),
            stop: Duration::from_secs(self.stop_timeout_secs),
        }
    }
}

/// Bounds applied to every provider call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    pub create: Duration,
    pub lookup: Duration,
    pub stop: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        ProviderConfig::default().timeouts()
    }
}

// Default value functions
fn default_image() -> String {
    "ubuntu:24.04".to_string()
}

fn default_memory() -> String {
    "4g".to_string()
}

fn default_cpus() -> String {
    "2".to_string()
}

fn default_command() -> Vec<String> {
    vec!["sleep".to_string(), "infinity".to_string()]
}

fn default_create_timeout() -> u64 {
    300
}

fn default_lookup_timeout() -> u64 {
    30
}

fn default_stop_timeout() -> u64 {
    60
}

fn default_stop_grace() -> i64 {
    10
}

fn default_state_dir() -> Result<PathBuf> {
    let home = dirs::home_dir().context("Could not determine home directory")?;
    Ok(home.join(".berth").join("sessions"))
}

/// Expand a leading `~` to the home directory
fn expand_path(path: &Path) -> Result<PathBuf> {
    match path.strip_prefix("~") {
        Ok(rest) => {
            let home = dirs::home_dir().context("Could not determine home directory")?;
            Ok(home.join(rest))
        }
        Err(_) => Ok(path.to_path_buf()),
    }
}

/// Parse memory limit string (e.g., "8g", "512m") to bytes
fn parse_memory_limit(limit: &str) -> std::result::Result<i64, String> {
    let lower = limit.trim().to_lowercase();
    let invalid = || format!("invalid memory limit: '{limit}'");

    let (num, unit) = if let Some(num) = lower.strip_suffix('g') {
        (num, 1_i64 << 30)
    } else if let Some(num) = lower.strip_suffix('m') {
        (num, 1_i64 << 20)
    } else {
        (lower.as_str(), 1)
    };

    let bytes = num
        .parse::<i64>()
        .ok()
        .and_then(|n| n.checked_mul(unit))
        .ok_or_else(invalid)?;

    if bytes <= 0 {
        return Err(invalid());
    }
    Ok(bytes)
}

fn parse_cpus(cpus: &str) -> std::result::Result<f64, String> {
    match cpus.trim().parse::<f64>() {
        Ok(n) if n.is_finite() && n > 0.0 => Ok(n),
        _ => Err(format!("invalid cpu limit: '{cpus}'")),
    }
}

impl Config {
    /// Load configuration from file, using defaults if not found
    pub fn load(config_path: &Path) -> Result<Self> {
        if !config_path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", config_path.display()))?;

        Ok(config)
    }
}
