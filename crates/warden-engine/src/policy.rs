//! Policy evaluation: the allow/deny and confirmation decision per request.
//!
//! The executor accepts any [`PolicyEvaluator`]. [`DefaultPolicy`] never
//! denies; it only derives a confirmation requirement from the risk level.
//! [`RolePolicy`] layers role checks on top of it.

use async_trait::async_trait;
use warden_core::types::Actor;

use crate::descriptor::CapabilityDescriptor;
use crate::types::{ActionEnvelope, PolicyDecision, RiskLevel};

/// Everything a policy may look at for one request.
pub struct PolicyRequest<'a, C> {
    pub action: &'a ActionEnvelope,
    pub descriptor: &'a CapabilityDescriptor<C>,
    pub actor: Option<&'a Actor>,
    pub context: &'a C,
}

impl<C> PolicyRequest<'_, C> {
    /// Envelope override, then descriptor, then `write`.
    pub fn effective_risk(&self) -> RiskLevel {
        self.action
            .risk_level
            .or(self.descriptor.risk_level)
            .unwrap_or(RiskLevel::Write)
    }
}

/// Pluggable decision function consulted before every handler invocation.
#[async_trait]
pub trait PolicyEvaluator<C>: Send + Sync {
    async fn evaluate(&self, request: PolicyRequest<'_, C>) -> PolicyDecision;
}

/// Risk-based policy used when the host does not supply one.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultPolicy;

impl DefaultPolicy {
    pub fn decide(risk: RiskLevel) -> PolicyDecision {
        if risk.is_elevated() {
            PolicyDecision::allow_with_confirmation()
        } else {
            PolicyDecision {
                allow: true,
                reason: None,
                requires_confirmation: Some(false),
            }
        }
    }
}

#[async_trait]
impl<C: Send + Sync + 'static> PolicyEvaluator<C> for DefaultPolicy {
    async fn evaluate(&self, request: PolicyRequest<'_, C>) -> PolicyDecision {
        Self::decide(request.effective_risk())
    }
}

pub(crate) struct FnPolicy<F>(pub(crate) F);

#[async_trait]
impl<C, F> PolicyEvaluator<C> for FnPolicy<F>
where
    C: Send + Sync + 'static,
    F: Fn(&PolicyRequest<'_, C>) -> PolicyDecision + Send + Sync,
{
    async fn evaluate(&self, request: PolicyRequest<'_, C>) -> PolicyDecision {
        (self.0)(&request)
    }
}

/// Role-based access on top of [`DefaultPolicy`].
///
/// Rules map an action-type prefix to a role. The longest matching prefix
/// wins; actions without a rule fall straight through to the default policy.
#[derive(Debug, Clone, Default)]
pub struct RolePolicy {
    rules: Vec<(String, String)>,
}

impl RolePolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn require_role(mut self, action_prefix: impl Into<String>, role: impl Into<String>) -> Self {
        self.rules.push((action_prefix.into(), role.into()));
        self
    }

    fn required_role(&self, action_type: &str) -> Option<&str> {
        self.rules
            .iter()
            .filter(|(prefix, _)| action_type.starts_with(prefix.as_str()))
            .max_by_key(|(prefix, _)| prefix.len())
            .map(|(_, role)| role.as_str())
    }
}

#[async_trait]
impl<C: Send + Sync + 'static> PolicyEvaluator<C> for RolePolicy {
    async fn evaluate(&self, request: PolicyRequest<'_, C>) -> PolicyDecision {
        let action_type = request.descriptor.action_type.as_str();
        if let Some(role) = self.required_role(action_type) {
            match request.actor {
                None => {
                    return PolicyDecision::deny(Some(format!(
                        "Action '{}' requires an authenticated actor",
                        action_type
                    )));
                }
                Some(actor) if !actor.has_role(role) => {
                    return PolicyDecision::deny(Some(format!(
                        "Actor '{}' lacks role '{}' for '{}'",
                        actor.id, role, action_type
                    )));
                }
                Some(_) => {}
            }
        }
        DefaultPolicy::decide(request.effective_risk())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn descriptor(action_type: &str, risk: Option<RiskLevel>) -> CapabilityDescriptor<()> {
        let d = CapabilityDescriptor::new(action_type, |_args, _ctx| async { Ok(json!(null)) });
        match risk {
            Some(r) => d.with_risk_level(r),
            None => d,
        }
    }

    async fn evaluate<P: PolicyEvaluator<()>>(
        policy: &P,
        envelope: &ActionEnvelope,
        descriptor: &CapabilityDescriptor<()>,
        actor: Option<&Actor>,
    ) -> PolicyDecision {
        policy
            .evaluate(PolicyRequest {
                action: envelope,
                descriptor,
                actor,
                context: &(),
            })
            .await
    }

    #[tokio::test]
    async fn test_default_read_allows_without_confirmation() {
        let d = descriptor("fs.read", Some(RiskLevel::Read));
        let env = ActionEnvelope::new("fs.read", json!({}));
        let decision = evaluate(&DefaultPolicy, &env, &d, None).await;
        assert!(decision.allow);
        assert_eq!(decision.requires_confirmation, Some(false));
    }

    #[tokio::test]
    async fn test_default_elevated_risks_require_confirmation() {
        for risk in [
            RiskLevel::Destructive,
            RiskLevel::Access,
            RiskLevel::Billing,
            RiskLevel::Network,
            RiskLevel::Install,
        ] {
            let d = descriptor("x", Some(risk));
            let env = ActionEnvelope::new("x", json!({}));
            let decision = evaluate(&DefaultPolicy, &env, &d, None).await;
            assert!(decision.allow, "{} must be allowed", risk);
            assert_eq!(decision.requires_confirmation, Some(true), "{}", risk);
        }
    }

    #[tokio::test]
    async fn test_default_unset_risk_is_write() {
        let d = descriptor("x", None);
        let env = ActionEnvelope::new("x", json!({}));
        let request = PolicyRequest {
            action: &env,
            descriptor: &d,
            actor: None,
            context: &(),
        };
        assert_eq!(request.effective_risk(), RiskLevel::Write);
        let decision = evaluate(&DefaultPolicy, &env, &d, None).await;
        assert!(decision.allow);
        assert_ne!(decision.requires_confirmation, Some(true));
    }

    #[tokio::test]
    async fn test_envelope_risk_overrides_descriptor() {
        let d = descriptor("x", Some(RiskLevel::Read));
        let env = ActionEnvelope::new("x", json!({})).with_risk_level(RiskLevel::Billing);
        let decision = evaluate(&DefaultPolicy, &env, &d, None).await;
        assert_eq!(decision.requires_confirmation, Some(true));

        let d = descriptor("x", Some(RiskLevel::Destructive));
        let env = ActionEnvelope::new("x", json!({})).with_risk_level(RiskLevel::Read);
        let decision = evaluate(&DefaultPolicy, &env, &d, None).await;
        assert_eq!(decision.requires_confirmation, Some(false));
    }

    #[tokio::test]
    async fn test_fn_policy_delegates_to_closure() {
        let policy = FnPolicy(|request: &PolicyRequest<'_, ()>| {
            if request.action.action_type.starts_with("billing.") {
                PolicyDecision::deny(Some("billing frozen".to_string()))
            } else {
                PolicyDecision::allow()
            }
        });
        let d = descriptor("billing.charge", None);
        let env = ActionEnvelope::new("billing.charge", json!({}));
        let decision = evaluate(&policy, &env, &d, None).await;
        assert!(!decision.allow);
        assert_eq!(decision.reason.as_deref(), Some("billing frozen"));
    }

    #[tokio::test]
    async fn test_role_policy_denies_anonymous() {
        let policy = RolePolicy::new().require_role("workspace.", "operator");
        let d = descriptor("workspace.delete", Some(RiskLevel::Destructive));
        let env = ActionEnvelope::new("workspace.delete", json!({}));
        let decision = evaluate(&policy, &env, &d, None).await;
        assert!(!decision.allow);
        assert!(decision.reason.unwrap().contains("authenticated actor"));
    }

    #[tokio::test]
    async fn test_role_policy_denies_missing_role() {
        let policy = RolePolicy::new().require_role("workspace.", "operator");
        let d = descriptor("workspace.delete", None);
        let env = ActionEnvelope::new("workspace.delete", json!({}));
        let actor = Actor::new("bob").with_role("viewer");
        let decision = evaluate(&policy, &env, &d, Some(&actor)).await;
        assert!(!decision.allow);
        assert_eq!(
            decision.reason.as_deref(),
            Some("Actor 'bob' lacks role 'operator' for 'workspace.delete'")
        );
    }

    #[tokio::test]
    async fn test_role_policy_defers_to_default_when_permitted() {
        let policy = RolePolicy::new()
            .require_role("workspace.", "operator")
            .require_role("workspace.billing.", "finance");
        let actor = Actor::new("ann").with_role("operator");

        let d = descriptor("workspace.delete", Some(RiskLevel::Destructive));
        let env = ActionEnvelope::new("workspace.delete", json!({}));
        let decision = evaluate(&policy, &env, &d, Some(&actor)).await;
        assert!(decision.allow);
        assert_eq!(decision.requires_confirmation, Some(true));

        // Longest prefix wins: operator is not enough for billing.
        let d = descriptor("workspace.billing.charge", None);
        let env = ActionEnvelope::new("workspace.billing.charge", json!({}));
        let decision = evaluate(&policy, &env, &d, Some(&actor)).await;
        assert!(!decision.allow);

        // Unruled actions pass without an actor.
        let d = descriptor("ui.toast", Some(RiskLevel::Read));
        let env = ActionEnvelope::new("ui.toast", json!({}));
        assert!(evaluate(&policy, &env, &d, None).await.allow);
    }
}
