//! Capability descriptors and the per-capability function contracts.
//!
//! A descriptor is a capability's static declaration: its risk metadata plus
//! an optional argument validator, ordered preconditions and exactly one
//! handler. Each function slot is a small async trait; the `*_fn` builder
//! methods accept plain closures.

use std::collections::BTreeSet;
use std::fmt;
use std::future::Future;
use std::marker::PhantomData;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::context::HandlerContext;
use crate::error::CapabilityError;
use crate::types::{ActionEnvelope, RiskLevel, SideEffectScope};

/// Turns raw envelope args into the args the handler receives.
///
/// The returned value replaces the raw args, so validators may coerce.
#[async_trait]
pub trait ArgsValidator: Send + Sync {
    async fn validate(&self, raw: Value) -> Result<Value, CapabilityError>;
}

/// A check that must pass before the handler runs.
#[async_trait]
pub trait Precondition<C>: Send + Sync {
    async fn check(
        &self,
        ctx: &HandlerContext<C>,
        envelope: &ActionEnvelope,
    ) -> Result<(), CapabilityError>;
}

/// The capability's business logic.
///
/// Implementations own dry-run and cancellation semantics: the executor only
/// forwards `ctx.dry_run` and `ctx.signal`.
#[async_trait]
pub trait CapabilityHandler<C>: Send + Sync {
    async fn handle(&self, args: Value, ctx: &HandlerContext<C>) -> Result<Value, CapabilityError>;
}

struct FnValidator<F>(F);

#[async_trait]
impl<F> ArgsValidator for FnValidator<F>
where
    F: Fn(Value) -> Result<Value, CapabilityError> + Send + Sync,
{
    async fn validate(&self, raw: Value) -> Result<Value, CapabilityError> {
        (self.0)(raw)
    }
}

struct FnPrecondition<F>(F);

#[async_trait]
impl<C, F> Precondition<C> for FnPrecondition<F>
where
    C: Send + Sync + 'static,
    F: Fn(&HandlerContext<C>, &ActionEnvelope) -> Result<(), CapabilityError> + Send + Sync,
{
    async fn check(
        &self,
        ctx: &HandlerContext<C>,
        envelope: &ActionEnvelope,
    ) -> Result<(), CapabilityError> {
        (self.0)(ctx, envelope)
    }
}

struct FnHandler<F>(F);

#[async_trait]
impl<C, F, Fut> CapabilityHandler<C> for FnHandler<F>
where
    C: Send + Sync + 'static,
    F: Fn(Value, HandlerContext<C>) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Value, CapabilityError>> + Send + 'static,
{
    async fn handle(&self, args: Value, ctx: &HandlerContext<C>) -> Result<Value, CapabilityError> {
        (self.0)(args, ctx.clone()).await
    }
}

/// Validator that round-trips args through `T` with serde.
///
/// Deserialization errors become the validation message; defaults and
/// renames declared on `T` are applied to the args the handler sees.
pub struct TypedArgs<T> {
    _marker: PhantomData<fn() -> T>,
}

impl<T> TypedArgs<T> {
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<T> Default for TypedArgs<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<T> ArgsValidator for TypedArgs<T>
where
    T: DeserializeOwned + Serialize + 'static,
{
    async fn validate(&self, raw: Value) -> Result<Value, CapabilityError> {
        let typed: T =
            serde_json::from_value(raw).map_err(|e| CapabilityError::msg(e.to_string()))?;
        Ok(serde_json::to_value(typed)?)
    }
}

/// Static declaration of one capability.
///
/// Metadata left as `None` is deliberately distinct from an explicit value:
/// the executor's precedence rules fall through unset fields, and the
/// manifest fills in display defaults.
pub struct CapabilityDescriptor<C> {
    pub action_type: String,
    pub namespace: Option<String>,
    pub summary: Option<String>,
    pub description: Option<String>,
    /// JSON Schema for the args, surfaced in the manifest.
    pub args_schema: Option<Value>,
    pub risk_level: Option<RiskLevel>,
    pub side_effect_scope: Option<SideEffectScope>,
    pub requires_confirmation_by_default: Option<bool>,
    /// Documentation only; the executor does not enforce it.
    pub supports_dry_run: Option<bool>,
    pub reversible: Option<bool>,
    pub tags: BTreeSet<String>,
    validator: Option<Box<dyn ArgsValidator>>,
    preconditions: Vec<Box<dyn Precondition<C>>>,
    handler: Box<dyn CapabilityHandler<C>>,
}

impl<C: Send + Sync + 'static> CapabilityDescriptor<C> {
    /// Declare a capability whose handler is an async closure.
    pub fn new<F, Fut>(action_type: impl Into<String>, handler: F) -> Self
    where
        F: Fn(Value, HandlerContext<C>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, CapabilityError>> + Send + 'static,
    {
        Self::from_handler(action_type, FnHandler(handler))
    }

    /// Declare a capability backed by a [`CapabilityHandler`] implementation.
    pub fn from_handler<H>(action_type: impl Into<String>, handler: H) -> Self
    where
        H: CapabilityHandler<C> + 'static,
    {
        Self {
            action_type: action_type.into(),
            namespace: None,
            summary: None,
            description: None,
            args_schema: None,
            risk_level: None,
            side_effect_scope: None,
            requires_confirmation_by_default: None,
            supports_dry_run: None,
            reversible: None,
            tags: BTreeSet::new(),
            validator: None,
            preconditions: Vec::new(),
            handler: Box::new(handler),
        }
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = Some(summary.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_args_schema(mut self, schema: Value) -> Self {
        self.args_schema = Some(schema);
        self
    }

    pub fn with_risk_level(mut self, risk_level: RiskLevel) -> Self {
        self.risk_level = Some(risk_level);
        self
    }

    pub fn with_side_effect_scope(mut self, scope: SideEffectScope) -> Self {
        self.side_effect_scope = Some(scope);
        self
    }

    pub fn with_requires_confirmation_by_default(mut self, requires: bool) -> Self {
        self.requires_confirmation_by_default = Some(requires);
        self
    }

    pub fn with_supports_dry_run(mut self, supports: bool) -> Self {
        self.supports_dry_run = Some(supports);
        self
    }

    pub fn with_reversible(mut self, reversible: bool) -> Self {
        self.reversible = Some(reversible);
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.insert(tag.into());
        self
    }

    pub fn with_validator<V>(mut self, validator: V) -> Self
    where
        V: ArgsValidator + 'static,
    {
        self.validator = Some(Box::new(validator));
        self
    }

    pub fn with_validator_fn<F>(self, validator: F) -> Self
    where
        F: Fn(Value) -> Result<Value, CapabilityError> + Send + Sync + 'static,
    {
        self.with_validator(FnValidator(validator))
    }

    /// Append a precondition; preconditions run in the order they were added.
    pub fn with_precondition<P>(mut self, precondition: P) -> Self
    where
        P: Precondition<C> + 'static,
    {
        self.preconditions.push(Box::new(precondition));
        self
    }

    pub fn with_precondition_fn<F>(self, precondition: F) -> Self
    where
        F: Fn(&HandlerContext<C>, &ActionEnvelope) -> Result<(), CapabilityError>
            + Send
            + Sync
            + 'static,
    {
        self.with_precondition(FnPrecondition(precondition))
    }
}

impl<C> CapabilityDescriptor<C> {
    pub(crate) fn validator(&self) -> Option<&dyn ArgsValidator> {
        self.validator.as_deref()
    }

    pub(crate) fn preconditions(&self) -> &[Box<dyn Precondition<C>>] {
        &self.preconditions
    }

    pub(crate) fn handler(&self) -> &dyn CapabilityHandler<C> {
        self.handler.as_ref()
    }
}

impl<C> fmt::Debug for CapabilityDescriptor<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CapabilityDescriptor")
            .field("action_type", &self.action_type)
            .field("namespace", &self.namespace)
            .field("risk_level", &self.risk_level)
            .field("side_effect_scope", &self.side_effect_scope)
            .field(
                "requires_confirmation_by_default",
                &self.requires_confirmation_by_default,
            )
            .field("has_validator", &self.validator.is_some())
            .field("preconditions", &self.preconditions.len())
            .finish_non_exhaustive()
    }
}
