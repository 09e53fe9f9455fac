//! Engine configuration and rule file loading

use crate::error::{AuthzError, Result};
use crate::privilege::Privilege;
use crate::resolver::AttributePrecedence;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Engine configuration
///
/// Every field has a default, so an empty TOML document is a valid config.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct EngineConfig {
    /// Which side wins when static and dynamic attributes collide
    #[serde(default)]
    pub attribute_precedence: AttributePrecedence,

    /// Log every decision through `tracing`
    #[serde(default = "default_true")]
    pub log_decisions: bool,

    /// Collect decision counters and latency
    #[serde(default = "default_true")]
    pub enable_metrics: bool,

    /// In-memory audit trail
    #[serde(default)]
    pub audit: AuditConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct AuditConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_audit_capacity")]
    pub capacity: usize,
}

fn default_true() -> bool { true }
fn default_audit_capacity() -> usize { 10_000 }

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            attribute_precedence: AttributePrecedence::default(),
            log_decisions: true,
            enable_metrics: true,
            audit: AuditConfig::default(),
        }
    }
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            capacity: default_audit_capacity(),
        }
    }
}

impl EngineConfig {
    /// Parse from a TOML document
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: EngineConfig = toml::from_str(contents)
            .map_err(|e| AuthzError::Config(format!("failed to parse engine config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&contents)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.audit.enabled && self.audit.capacity == 0 {
            return Err(AuthzError::Config(
                "audit capacity must be greater than zero when audit is enabled".to_string(),
            ));
        }
        Ok(())
    }
}

/// Static rules declared in a file
///
/// ```toml
/// [[privileges]]
/// resource = "Book"
/// action = "list"
///
/// [[groups]]
/// role = "admin"
/// privileges = [{ resource = "User", action = "edit" }]
/// ```
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct RuleSet {
    /// Privileges registered as written
    #[serde(default)]
    pub privileges: Vec<Privilege>,

    /// Privileges registered with a forced role
    #[serde(default)]
    pub groups: Vec<RuleGroup>,
}

/// Privileges sharing one role
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct RuleGroup {
    pub role: String,
    #[serde(default)]
    pub privileges: Vec<Privilege>,
}

impl RuleSet {
    /// Parse from a TOML document; invalid privileges fail here
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        toml::from_str(contents)
            .map_err(|e| AuthzError::Config(format!("failed to parse rule set: {}", e)))
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&contents)
    }

    /// Total entries across plain privileges and groups
    pub fn len(&self) -> usize {
        self.privileges.len() + self.groups.iter().map(|g| g.privileges.len()).sum::<usize>()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
