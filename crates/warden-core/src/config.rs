use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{Result, WardenError};

/// Top-level configuration for the Warden engine.
///
/// Loaded from `~/.warden/config.toml` by default. Every section is optional
/// and falls back to its defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WardenConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub executor: ExecutorConfig,
    #[serde(default)]
    pub idempotency: IdempotencyConfig,
    #[serde(default)]
    pub audit: AuditConfig,
    #[serde(default)]
    pub policy: PolicyConfig,
}

impl WardenConfig {
    /// Load configuration from a TOML file.
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: WardenConfig = toml::from_str(&content)?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Load configuration from a TOML file, falling back to defaults if the
    /// file does not exist or cannot be parsed.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(
                    "Failed to load config from {}: {}. Using defaults.",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Save the current configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| WardenError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }
}

/// General process settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level: trace, debug, info, warn, error.
    pub log_level: String,
    /// Directory the built-in file capabilities are confined to.
    pub workspace_root: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            workspace_root: ".".to_string(),
        }
    }
}

/// What the executor does when the audit sink fails to record an event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditFailureMode {
    /// Abort the call and return the sink's error to the caller.
    #[default]
    Propagate,
    /// Log the failure and carry on with the primary result path.
    Isolate,
}

impl fmt::Display for AuditFailureMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuditFailureMode::Propagate => write!(f, "propagate"),
            AuditFailureMode::Isolate => write!(f, "isolate"),
        }
    }
}

impl std::str::FromStr for AuditFailureMode {
    type Err = WardenError;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "propagate" => Ok(AuditFailureMode::Propagate),
            "isolate" => Ok(AuditFailureMode::Isolate),
            _ => Err(WardenError::InvalidValue {
                field: "audit_failure".to_string(),
                value: s.to_string(),
            }),
        }
    }
}

/// Executor behaviour switches.
///
/// Setting every flag to its non-default value reproduces the unguarded
/// check-then-act behaviour: raw shared keys, cached dry runs, no locking.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    /// Prefix idempotency keys with the action type before touching the store.
    pub namespace_idempotency_keys: bool,
    /// Persist completed dry-run results to the idempotency store.
    pub cache_dry_run_results: bool,
    /// Serialize concurrent calls that share an idempotency key.
    pub single_flight: bool,
    /// Behaviour when the audit sink returns an error.
    pub audit_failure: AuditFailureMode,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            namespace_idempotency_keys: true,
            cache_dry_run_results: false,
            single_flight: true,
            audit_failure: AuditFailureMode::Propagate,
        }
    }
}

/// In-memory idempotency cache settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IdempotencyConfig {
    /// Maximum cached results; the oldest entry is evicted first.
    pub max_entries: usize,
    /// Seconds a cached result stays valid. `0` disables expiry.
    pub ttl_secs: u64,
}

impl Default for IdempotencyConfig {
    fn default() -> Self {
        Self {
            max_entries: 10_000,
            ttl_secs: 86_400,
        }
    }
}

/// Audit trail settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditConfig {
    /// Mirror audit events into the tracing log.
    pub tracing: bool,
    /// Append audit events as JSON lines to this file.
    pub jsonl_path: Option<String>,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            tracing: true,
            jsonl_path: None,
        }
    }
}

/// Role rules for the access policy.
///
/// With no rules the executor keeps its default risk-based policy.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    pub rules: Vec<RoleRule>,
}

/// Callers of actions whose type starts with `prefix` must hold `role`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleRule {
    pub prefix: String,
    pub role: String,
}
