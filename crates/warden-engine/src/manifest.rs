//! Capability manifest: the externally safe, sorted view of a registry.
//!
//! Planners and UIs consume this instead of descriptors, which carry
//! handlers and validators that must not leave the process.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::descriptor::CapabilityDescriptor;
use crate::types::{RiskLevel, SideEffectScope};

/// Point-in-time summary of one capability, with defaults applied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub action_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    pub summary: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub args_schema: Option<Value>,
    pub risk_level: RiskLevel,
    pub side_effect_scope: SideEffectScope,
    pub requires_confirmation_by_default: bool,
    pub supports_dry_run: bool,
    pub reversible: bool,
    pub tags: BTreeSet<String>,
}

impl<C> From<&CapabilityDescriptor<C>> for ManifestEntry {
    fn from(descriptor: &CapabilityDescriptor<C>) -> Self {
        Self {
            action_type: descriptor.action_type.clone(),
            namespace: descriptor.namespace.clone(),
            summary: descriptor
                .summary
                .clone()
                .unwrap_or_else(|| descriptor.action_type.clone()),
            description: descriptor.description.clone(),
            args_schema: descriptor.args_schema.clone(),
            risk_level: descriptor.risk_level.unwrap_or(RiskLevel::Write),
            side_effect_scope: descriptor
                .side_effect_scope
                .unwrap_or(SideEffectScope::Project),
            requires_confirmation_by_default: descriptor
                .requires_confirmation_by_default
                .unwrap_or(false),
            supports_dry_run: descriptor.supports_dry_run.unwrap_or(true),
            reversible: descriptor.reversible.unwrap_or(false),
            tags: descriptor.tags.clone(),
        }
    }
}

/// Project descriptors into manifest entries sorted by action type.
///
/// Accepts a live registry (`registry.iter()`) or any slice of descriptors.
pub fn build_capability_manifest<'a, C, I>(descriptors: I) -> Vec<ManifestEntry>
where
    C: 'a,
    I: IntoIterator<Item = &'a CapabilityDescriptor<C>>,
{
    let mut entries: Vec<ManifestEntry> = descriptors.into_iter().map(ManifestEntry::from).collect();
    entries.sort_by(|a, b| a.action_type.cmp(&b.action_type));
    entries
}
