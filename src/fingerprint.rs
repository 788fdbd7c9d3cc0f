//! Configuration fingerprinting.
//!
//! A fingerprint is a SHA-256 digest over a canonical JSON rendering of the
//! provisioning-relevant parts of an [`AgentConfig`]. Two sandboxes built from
//! configs with equal fingerprints are interchangeable.
//!
//! Excluded from the digest: `description` and `labels`. Both are cosmetic
//! and never reach the provider's provisioning decision.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

use crate::config::AgentConfig;

/// Bumped whenever the canonical form changes, so old records stop matching.
const CANONICAL_VERSION: u32 = 2;

/// Hex-encoded SHA-256 digest of an agent configuration.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Returns the digest as lowercase hex.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the first 12 hex characters, for display.
    pub fn short(&self) -> &str {
        &self.0[..self.0.len().min(12)]
    }
}

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Canonical view of the fields that affect provisioning.
///
/// Field order here is the serialization order. Maps are `BTreeMap`, so key
/// order is independent of insertion order.
#[derive(Serialize)]
struct Canonical<'a> {
    version: u32,
    image: &'a str,
    memory_bytes: Option<i64>,
    nano_cpus: Option<i64>,
    env: &'a BTreeMap<String, String>,
    command: &'a [String],
}

/// Computes the fingerprint of an agent configuration.
pub fn fingerprint(config: &AgentConfig) -> Fingerprint {
    let canonical = Canonical {
        version: CANONICAL_VERSION,
        image: config.image.trim(),
        // "1g" and "1024m" provision the same sandbox, as do "2" and "2.0"
        memory_bytes: config.memory_bytes().ok(),
        nano_cpus: config.nano_cpus().ok(),
        env: &config.env,
        command: &config.command,
    };

    // Serializing borrowed strings and maps cannot fail.
    let json = serde_json::to_string(&canonical).unwrap_or_default();
    let digest = Sha256::digest(json.as_bytes());
    Fingerprint(format!("{digest:x}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> AgentConfig {
        AgentConfig {
            image: "python:3.12".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_fingerprint_is_deterministic() {
        assert_eq!(fingerprint(&base()), fingerprint(&base()));
    }

    #[test]
    fn test_fingerprint_is_hex_sha256() {
        let fp = fingerprint(&base());
        assert_eq!(fp.as_str().len(), 64);
        assert!(fp.as_str().chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(fp.short().len(), 12);
        assert!(fp.as_str().starts_with(fp.short()));
    }

    #[test]
    fn test_env_insertion_order_is_irrelevant() {
        let mut a = base();
        a.env.insert("A".to_string(), "1".to_string());
        a.env.insert("B".to_string(), "2".to_string());

        let mut b = base();
        b.env.insert("B".to_string(), "2".to_string());
        b.env.insert("A".to_string(), "1".to_string());

        assert_eq!(fingerprint(&a), fingerprint(&b));
    }

    #[test]
    fn test_provisioning_fields_change_fingerprint() {
        let original = fingerprint(&base());

        let variants: Vec<Box<dyn Fn(&mut AgentConfig)>> = vec![
            Box::new(|c| c.image = "python:3.13".to_string()),
            Box::new(|c| c.memory = "16g".to_string()),
            Box::new(|c| c.cpus = "8".to_string()),
            Box::new(|c| {
                c.env.insert("DEBUG".to_string(), "1".to_string());
            }),
            Box::new(|c| c.command = vec!["tail".to_string(), "-f".to_string()]),
        ];

        for mutate in variants {
            let mut config = base();
            mutate(&mut config);
            assert_ne!(fingerprint(&config), original, "{config:?}");
        }
    }

    #[test]
    fn test_cosmetic_fields_are_excluded() {
        let mut config = base();
        config.description = Some("a helpful agent".to_string());
        config.labels.insert("owner".to_string(), "ops".to_string());
        assert_eq!(fingerprint(&config), fingerprint(&base()));
    }

    #[test]
    fn test_equivalent_memory_units_match() {
        let mut gigs = base();
        gigs.memory = "1g".to_string();
        let mut megs = base();
        megs.memory = "1024m".to_string();
        assert_eq!(fingerprint(&gigs), fingerprint(&megs));
    }

    #[test]
    fn test_equivalent_cpu_spellings_match() {
        let mut whole = base();
        whole.cpus = "2".to_string();
        let mut decimal = base();
        decimal.cpus = " 2.0 ".to_string();
        assert_eq!(fingerprint(&whole), fingerprint(&decimal));

        let mut half = base();
        half.cpus = "0.5".to_string();
        assert_ne!(fingerprint(&half), fingerprint(&whole));
    }

    #[test]
    fn test_env_value_vs_key_boundaries() {
        let mut a = base();
        a.env.insert("AB".to_string(), "C".to_string());
        let mut b = base();
        b.env.insert("A".to_string(), "BC".to_string());
        assert_ne!(fingerprint(&a), fingerprint(&b));
    }

    #[test]
    fn test_serializes_as_plain_string() {
        let fp = fingerprint(&base());
        let json = serde_json::to_string(&fp).unwrap();
        assert_eq!(json, format!("\"{fp}\""));
        let back: Fingerprint = serde_json::from_str(&json).unwrap();
        assert_eq!(back, fp);
    }
}
