//! Capability execution engine for Warden.
//!
//! Sits between a semi-autonomous caller and privileged host operations:
//! decides whether an invocation is allowed, whether it needs human
//! confirmation, whether it already ran, then executes it through the
//! capability's handler while emitting an audit trail.

pub mod audit;
pub mod context;
pub mod descriptor;
pub mod error;
pub mod executor;
pub mod handler;
pub mod manifest;
pub mod policy;
pub mod registry;
pub mod single_flight;
pub mod store;
pub mod types;

pub use audit::{AuditSink, FanoutAuditSink, JsonlAuditSink, MemoryAuditSink, TracingAuditSink};
pub use context::{CancellationSignal, HandlerContext, Invocation};
pub use descriptor::{ArgsValidator, CapabilityDescriptor, CapabilityHandler, Precondition, TypedArgs};
pub use error::{AuditError, CapabilityError, ExecutorError, RegistryError, StoreError};
pub use executor::Executor;
pub use manifest::{build_capability_manifest, ManifestEntry};
pub use policy::{DefaultPolicy, PolicyEvaluator, PolicyRequest, RolePolicy};
pub use registry::CapabilityRegistry;
pub use store::{IdempotencyStore, MemoryIdempotencyStore};
pub use types::{
    ActionEnvelope, ActionResult, ActionStatus, AuditEvent, AuditStatus, PolicyDecision,
    RiskLevel, SideEffectScope,
};
