//! Error types for the execution engine.

/// Errors from capability registration.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("Capability already registered: {0}")]
    DuplicateCapability(String),
}

/// Failure raised by a capability's validator, precondition or handler.
///
/// The executor never lets these escape: each one is converted into a
/// structured `ActionResult` whose text is the error's display string.
#[derive(Debug, thiserror::Error)]
pub enum CapabilityError {
    #[error("{0}")]
    Failed(String),
    #[error("Operation cancelled")]
    Cancelled,
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl CapabilityError {
    /// Shorthand for a plain-message failure.
    pub fn msg(message: impl Into<String>) -> Self {
        CapabilityError::Failed(message.into())
    }
}

impl From<String> for CapabilityError {
    fn from(message: String) -> Self {
        CapabilityError::Failed(message)
    }
}

impl From<&str> for CapabilityError {
    fn from(message: &str) -> Self {
        CapabilityError::Failed(message.to_string())
    }
}

/// Errors from an idempotency store backend.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Idempotency store error: {0}")]
    Backend(String),
    #[error("Idempotency store serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Errors from an audit sink.
#[derive(Debug, thiserror::Error)]
pub enum AuditError {
    #[error("Audit sink error: {0}")]
    Sink(String),
    #[error("Audit I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Audit serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Errors that escape `Executor::execute`.
///
/// Every capability-level failure becomes an `ActionResult`; only a failing
/// audit sink under `AuditFailureMode::Propagate` aborts the call.
#[derive(Debug, thiserror::Error)]
pub enum ExecutorError {
    #[error("Audit sink failed: {0}")]
    Audit(#[from] AuditError),
}
