//! Request executor.
//!
//! Runs one invocation end to end: descriptor lookup, idempotent replay,
//! policy, confirmation gate, argument validation, preconditions, handler,
//! result caching and audit emission. Every capability-level failure becomes
//! a structured [`ActionResult`].

use std::sync::Arc;

use serde_json::{json, Map, Value};
use tracing::Instrument;
use uuid::Uuid;
use warden_core::config::{AuditFailureMode, ExecutorConfig};
use warden_core::types::Timestamp;

use crate::audit::AuditSink;
use crate::context::{HandlerContext, Invocation};
use crate::descriptor::CapabilityDescriptor;
use crate::error::ExecutorError;
use crate::manifest::{build_capability_manifest, ManifestEntry};
use crate::policy::{DefaultPolicy, FnPolicy, PolicyEvaluator, PolicyRequest};
use crate::registry::CapabilityRegistry;
use crate::single_flight::KeyedLocks;
use crate::store::IdempotencyStore;
use crate::types::{ActionEnvelope, ActionResult, AuditEvent, AuditStatus, PolicyDecision};

const DENIED_BY_POLICY: &str = "Action denied by policy";
const CONFIRMATION_REQUIRED: &str = "Action requires confirmation";

/// Executes capability invocations against a frozen registry.
pub struct Executor<C> {
    registry: Arc<CapabilityRegistry<C>>,
    policy: Arc<dyn PolicyEvaluator<C>>,
    idempotency: Option<Arc<dyn IdempotencyStore>>,
    audit: Option<Arc<dyn AuditSink>>,
    config: ExecutorConfig,
    in_flight: KeyedLocks,
}

impl<C: Send + Sync + 'static> Executor<C> {
    /// Create an executor with the default policy and no stores.
    pub fn new(registry: Arc<CapabilityRegistry<C>>) -> Self {
        Self {
            registry,
            policy: Arc::new(DefaultPolicy),
            idempotency: None,
            audit: None,
            config: ExecutorConfig::default(),
            in_flight: KeyedLocks::new(),
        }
    }

    pub fn with_config(mut self, config: ExecutorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_policy<P>(mut self, policy: P) -> Self
    where
        P: PolicyEvaluator<C> + 'static,
    {
        self.policy = Arc::new(policy);
        self
    }

    pub fn with_policy_fn<F>(self, policy: F) -> Self
    where
        F: Fn(&PolicyRequest<'_, C>) -> PolicyDecision + Send + Sync + 'static,
    {
        self.with_policy(FnPolicy(policy))
    }

    pub fn with_idempotency_store(mut self, store: Arc<dyn IdempotencyStore>) -> Self {
        self.idempotency = Some(store);
        self
    }

    pub fn with_audit_sink(mut self, sink: Arc<dyn AuditSink>) -> Self {
        self.audit = Some(sink);
        self
    }

    pub fn registry(&self) -> &CapabilityRegistry<C> {
        &self.registry
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Sorted, externally safe summary of the registered capabilities.
    pub fn manifest(&self) -> Vec<ManifestEntry> {
        build_capability_manifest(self.registry.iter())
    }

    /// Execute one invocation.
    ///
    /// Returns `Err` only when the audit sink fails and the executor is
    /// configured with [`AuditFailureMode::Propagate`].
    pub async fn execute(&self, invocation: Invocation<C>) -> Result<ActionResult, ExecutorError> {
        let request_id = Uuid::new_v4();
        let action_type = invocation.envelope.action_type.clone();
        let span = tracing::debug_span!("execute", %request_id, %action_type);

        async move {
            let Some(descriptor) = self.registry.get(&action_type) else {
                tracing::warn!("Unknown action requested");
                return Ok(ActionResult::failed(
                    request_id,
                    &action_type,
                    format!("Unknown action '{}'", action_type),
                ));
            };

            let cache_key = self.cache_key(&invocation.envelope);
            let _in_flight = match &cache_key {
                Some(key) if self.config.single_flight => Some(self.in_flight.acquire(key).await),
                _ => None,
            };

            if let Some(key) = &cache_key {
                if let Some(cached) = self.lookup(key).await {
                    tracing::debug!(key = %key, "Idempotent replay");
                    return Ok(cached.replay(request_id, &action_type));
                }
            }

            self.run(request_id, &descriptor, invocation, cache_key.as_deref())
                .await
        }
        .instrument(span)
        .await
    }

    async fn run(
        &self,
        request_id: Uuid,
        descriptor: &CapabilityDescriptor<C>,
        invocation: Invocation<C>,
        cache_key: Option<&str>,
    ) -> Result<ActionResult, ExecutorError> {
        let has_confirmation_token = invocation.has_confirmation_token();
        let Invocation {
            envelope,
            actor,
            context,
            confirmation_token,
            signal,
            now,
        } = invocation;
        let action_type = envelope.action_type.as_str();

        let ctx = HandlerContext {
            request_id,
            actor,
            context,
            dry_run: envelope.dry_run.unwrap_or(false),
            confirmation_token,
            signal: signal.unwrap_or_default(),
            now: now.unwrap_or_else(Timestamp::now),
        };

        let decision = self
            .policy
            .evaluate(PolicyRequest {
                action: &envelope,
                descriptor,
                actor: ctx.actor.as_ref(),
                context: ctx.context.as_ref(),
            })
            .await;

        if !decision.allow {
            let reason = decision
                .reason
                .unwrap_or_else(|| DENIED_BY_POLICY.to_string());
            tracing::debug!(reason = %reason, "Blocked by policy");
            let mut result = ActionResult::blocked(request_id, action_type, reason.clone());
            result.blocked_by_policy = true;
            self.emit(
                &ctx,
                &envelope,
                AuditStatus::Blocked,
                [("reason", json!(reason)), ("blocked_by_policy", json!(true))],
            )
            .await?;
            return Ok(result);
        }

        let requires_confirmation = envelope
            .requires_confirmation
            .or(descriptor.requires_confirmation_by_default)
            .or(decision.requires_confirmation)
            .unwrap_or(false);

        if requires_confirmation && !has_confirmation_token {
            tracing::debug!("Awaiting confirmation");
            let mut result = ActionResult::blocked(request_id, action_type, CONFIRMATION_REQUIRED);
            result.requires_confirmation = true;
            self.emit(
                &ctx,
                &envelope,
                AuditStatus::Blocked,
                [
                    ("reason", json!(CONFIRMATION_REQUIRED)),
                    ("requires_confirmation", json!(true)),
                ],
            )
            .await?;
            return Ok(result);
        }

        let args = match descriptor.validator() {
            None => envelope.args.clone(),
            Some(validator) => match validator.validate(envelope.args.clone()).await {
                Ok(args) => args,
                Err(e) => {
                    let error = format!("Invalid arguments: {}", e);
                    tracing::debug!(error = %error, "Validation failed");
                    let result = ActionResult::failed(request_id, action_type, error.clone());
                    self.emit(&ctx, &envelope, AuditStatus::Failed, [("error", json!(error))])
                        .await?;
                    return Ok(result);
                }
            },
        };

        for precondition in descriptor.preconditions() {
            if let Err(e) = precondition.check(&ctx, &envelope).await {
                let reason = format!("Precondition failed: {}", e);
                tracing::debug!(reason = %reason, "Precondition rejected");
                let result = ActionResult::blocked(request_id, action_type, reason.clone());
                self.emit(&ctx, &envelope, AuditStatus::Blocked, [("reason", json!(reason))])
                    .await?;
                return Ok(result);
            }
        }

        self.emit(
            &ctx,
            &envelope,
            AuditStatus::Started,
            [("dry_run", json!(ctx.dry_run))],
        )
        .await?;

        match descriptor.handler().handle(args, &ctx).await {
            Ok(value) => {
                let result = ActionResult::completed(request_id, action_type, value);
                if let Some(key) = cache_key {
                    if !ctx.dry_run || self.config.cache_dry_run_results {
                        self.persist(key, &result).await;
                    }
                }
                tracing::info!(dry_run = ctx.dry_run, "Action completed");
                self.emit(
                    &ctx,
                    &envelope,
                    AuditStatus::Completed,
                    [("dry_run", json!(ctx.dry_run))],
                )
                .await?;
                Ok(result)
            }
            Err(e) => {
                let error = e.to_string();
                tracing::warn!(error = %error, "Action handler failed");
                let result = ActionResult::failed(request_id, action_type, error.clone());
                self.emit(&ctx, &envelope, AuditStatus::Failed, [("error", json!(error))])
                    .await?;
                Ok(result)
            }
        }
    }

    /// Effective store key, or `None` when caching does not apply.
    fn cache_key(&self, envelope: &ActionEnvelope) -> Option<String> {
        self.idempotency.as_ref()?;
        let key = envelope.idempotency_key.as_deref()?;
        if self.config.namespace_idempotency_keys {
            Some(format!("{}:{}", envelope.action_type, key))
        } else {
            Some(key.to_string())
        }
    }

    async fn lookup(&self, key: &str) -> Option<ActionResult> {
        let store = self.idempotency.as_ref()?;
        match store.get(key).await {
            Ok(cached) => cached,
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Idempotency lookup failed, executing");
                None
            }
        }
    }

    async fn persist(&self, key: &str, result: &ActionResult) {
        if let Some(store) = &self.idempotency {
            if let Err(e) = store.set(key, result).await {
                tracing::warn!(key = %key, error = %e, "Failed to cache result");
            }
        }
    }

    async fn emit<const N: usize>(
        &self,
        ctx: &HandlerContext<C>,
        envelope: &ActionEnvelope,
        status: AuditStatus,
        details: [(&str, Value); N],
    ) -> Result<(), ExecutorError> {
        let Some(sink) = &self.audit else {
            return Ok(());
        };

        let mut map = Map::new();
        if let Some(audit_context) = &envelope.audit_context {
            map.insert("audit_context".to_string(), Value::Object(audit_context.clone()));
        }
        if let Some(target) = &envelope.target {
            map.insert("target".to_string(), json!(target));
        }
        for (key, value) in details {
            map.insert(key.to_string(), value);
        }

        let event = AuditEvent {
            request_id: ctx.request_id,
            timestamp: ctx.now,
            action_type: envelope.action_type.clone(),
            actor: ctx.actor.as_ref().map(|a| a.id.clone()),
            status,
            details: map,
        };

        match sink.record(&event).await {
            Ok(()) => Ok(()),
            Err(e) => match self.config.audit_failure {
                AuditFailureMode::Propagate => Err(e.into()),
                AuditFailureMode::Isolate => {
                    tracing::warn!(status = %status, error = %e, "Audit sink failed, continuing");
                    Ok(())
                }
            },
        }
    }
}
