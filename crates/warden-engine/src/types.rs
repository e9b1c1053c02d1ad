//! Core types and value objects for the execution engine.
//!
//! Defines the request envelope, the structured result, audit events,
//! policy decisions and their supporting enumerations.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;
use warden_core::types::Timestamp;

// =============================================================================
// Enums
// =============================================================================

/// How dangerous a capability is. Drives the default confirmation policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Read,
    Write,
    Destructive,
    Access,
    Billing,
    Network,
    Install,
}

impl RiskLevel {
    /// Risk levels the default policy always routes through confirmation.
    pub fn is_elevated(&self) -> bool {
        matches!(
            self,
            RiskLevel::Destructive
                | RiskLevel::Access
                | RiskLevel::Billing
                | RiskLevel::Network
                | RiskLevel::Install
        )
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RiskLevel::Read => write!(f, "read"),
            RiskLevel::Write => write!(f, "write"),
            RiskLevel::Destructive => write!(f, "destructive"),
            RiskLevel::Access => write!(f, "access"),
            RiskLevel::Billing => write!(f, "billing"),
            RiskLevel::Network => write!(f, "network"),
            RiskLevel::Install => write!(f, "install"),
        }
    }
}

impl std::str::FromStr for RiskLevel {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "read" => Ok(RiskLevel::Read),
            "write" => Ok(RiskLevel::Write),
            "destructive" => Ok(RiskLevel::Destructive),
            "access" => Ok(RiskLevel::Access),
            "billing" => Ok(RiskLevel::Billing),
            "network" => Ok(RiskLevel::Network),
            "install" => Ok(RiskLevel::Install),
            _ => Err(format!("Unknown risk level: {}", s)),
        }
    }
}

/// The widest surface a capability's side effects can reach.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SideEffectScope {
    Ui,
    Workspace,
    Project,
    Account,
    System,
}

impl fmt::Display for SideEffectScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SideEffectScope::Ui => write!(f, "ui"),
            SideEffectScope::Workspace => write!(f, "workspace"),
            SideEffectScope::Project => write!(f, "project"),
            SideEffectScope::Account => write!(f, "account"),
            SideEffectScope::System => write!(f, "system"),
        }
    }
}

impl std::str::FromStr for SideEffectScope {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ui" => Ok(SideEffectScope::Ui),
            "workspace" => Ok(SideEffectScope::Workspace),
            "project" => Ok(SideEffectScope::Project),
            "account" => Ok(SideEffectScope::Account),
            "system" => Ok(SideEffectScope::System),
            _ => Err(format!("Unknown side effect scope: {}", s)),
        }
    }
}

/// Terminal status of one `execute` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionStatus {
    Completed,
    Blocked,
    Failed,
}

impl fmt::Display for ActionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActionStatus::Completed => write!(f, "completed"),
            ActionStatus::Blocked => write!(f, "blocked"),
            ActionStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Lifecycle transition recorded in the audit trail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditStatus {
    Started,
    Completed,
    Failed,
    Blocked,
}

impl fmt::Display for AuditStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuditStatus::Started => write!(f, "started"),
            AuditStatus::Completed => write!(f, "completed"),
            AuditStatus::Failed => write!(f, "failed"),
            AuditStatus::Blocked => write!(f, "blocked"),
        }
    }
}

// =============================================================================
// Request / Result
// =============================================================================

/// One caller-issued request to run a capability.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActionEnvelope {
    pub action_type: String,
    #[serde(default)]
    pub args: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<BTreeMap<String, String>>,
    /// Overrides the descriptor's risk level for policy evaluation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub risk_level: Option<RiskLevel>,
    /// Overrides every other source of the confirmation requirement.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requires_confirmation: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub idempotency_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dry_run: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audit_context: Option<Map<String, Value>>,
}

impl ActionEnvelope {
    pub fn new(action_type: impl Into<String>, args: Value) -> Self {
        Self {
            action_type: action_type.into(),
            args,
            ..Self::default()
        }
    }

    pub fn with_target(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.target
            .get_or_insert_with(BTreeMap::new)
            .insert(key.into(), value.into());
        self
    }

    pub fn with_risk_level(mut self, risk_level: RiskLevel) -> Self {
        self.risk_level = Some(risk_level);
        self
    }

    pub fn with_requires_confirmation(mut self, requires: bool) -> Self {
        self.requires_confirmation = Some(requires);
        self
    }

    pub fn with_idempotency_key(mut self, key: impl Into<String>) -> Self {
        self.idempotency_key = Some(key.into());
        self
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = Some(dry_run);
        self
    }

    pub fn with_audit_context(mut self, key: impl Into<String>, value: Value) -> Self {
        self.audit_context
            .get_or_insert_with(Map::new)
            .insert(key.into(), value);
        self
    }
}

/// The structured outcome of one `execute` call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionResult {
    pub status: ActionStatus,
    pub request_id: Uuid,
    pub action_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default)]
    pub blocked_by_policy: bool,
    #[serde(default)]
    pub requires_confirmation: bool,
    #[serde(default)]
    pub idempotent_replay: bool,
}

impl ActionResult {
    fn base(status: ActionStatus, request_id: Uuid, action_type: &str) -> Self {
        Self {
            status,
            request_id,
            action_type: action_type.to_string(),
            result: None,
            error: None,
            reason: None,
            blocked_by_policy: false,
            requires_confirmation: false,
            idempotent_replay: false,
        }
    }

    pub fn completed(request_id: Uuid, action_type: &str, result: Value) -> Self {
        Self {
            result: Some(result),
            ..Self::base(ActionStatus::Completed, request_id, action_type)
        }
    }

    pub fn failed(request_id: Uuid, action_type: &str, error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::base(ActionStatus::Failed, request_id, action_type)
        }
    }

    pub fn blocked(request_id: Uuid, action_type: &str, reason: impl Into<String>) -> Self {
        Self {
            reason: Some(reason.into()),
            ..Self::base(ActionStatus::Blocked, request_id, action_type)
        }
    }

    /// Copy of a cached result re-addressed to a new request.
    pub fn replay(&self, request_id: Uuid, action_type: &str) -> Self {
        Self {
            request_id,
            action_type: action_type.to_string(),
            idempotent_replay: true,
            ..self.clone()
        }
    }

    pub fn is_completed(&self) -> bool {
        self.status == ActionStatus::Completed
    }

    pub fn is_blocked(&self) -> bool {
        self.status == ActionStatus::Blocked
    }

    pub fn is_failed(&self) -> bool {
        self.status == ActionStatus::Failed
    }
}

/// An append-only lifecycle record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEvent {
    pub request_id: Uuid,
    pub timestamp: Timestamp,
    pub action_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actor: Option<String>,
    pub status: AuditStatus,
    #[serde(default)]
    pub details: Map<String, Value>,
}

/// Outcome of a policy evaluation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyDecision {
    pub allow: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requires_confirmation: Option<bool>,
}

impl PolicyDecision {
    pub fn allow() -> Self {
        Self {
            allow: true,
            ..Self::default()
        }
    }

    pub fn allow_with_confirmation() -> Self {
        Self {
            allow: true,
            reason: None,
            requires_confirmation: Some(true),
        }
    }

    /// A denial. `None` lets the executor fall back to its generic reason.
    pub fn deny(reason: Option<String>) -> Self {
        Self {
            allow: false,
            reason,
            requires_confirmation: None,
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
